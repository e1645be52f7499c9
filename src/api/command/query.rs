use super::{RavenCommand, TypedCommand, database_url, decode_json};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::http::HttpRequest;
use crate::core::node::ServerNode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Query text plus the execution knobs the server understands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexQuery {
    pub query: String,
    pub query_parameters: Map<String, Value>,
    pub start: Option<usize>,
    pub page_size: Option<usize>,
    pub wait_for_non_stale_results: bool,
    pub wait_for_non_stale_results_timeout: Option<Duration>,
    pub skip_duplicate_checking: bool,
}

impl IndexQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct IndexQueryPayload<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "no_parameters")]
    query_parameters: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_size: Option<usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    wait_for_non_stale_results: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_non_stale_results_timeout: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    skip_duplicate_checking: bool,
}

impl<'a> From<&'a IndexQuery> for IndexQueryPayload<'a> {
    fn from(query: &'a IndexQuery) -> Self {
        Self {
            query: &query.query,
            query_parameters: &query.query_parameters,
            start: query.start,
            page_size: query.page_size,
            wait_for_non_stale_results: query.wait_for_non_stale_results,
            wait_for_non_stale_results_timeout: query
                .wait_for_non_stale_results_timeout
                .filter(|_| query.wait_for_non_stale_results)
                .map(format_time_span),
            skip_duplicate_checking: query.skip_duplicate_checking,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResult {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub includes: Value,
    #[serde(default)]
    pub total_results: i64,
    #[serde(default)]
    pub skipped_results: i64,
    #[serde(default)]
    pub index_name: String,
    #[serde(default)]
    pub is_stale: bool,
    #[serde(default)]
    pub index_timestamp: Option<String>,
    #[serde(default)]
    pub last_query_time: Option<String>,
    #[serde(default)]
    pub result_etag: i64,
    #[serde(default)]
    pub duration_in_ms: i64,
}

#[derive(Clone, Debug)]
pub struct QueryCommand {
    index_query: IndexQuery,
    no_caching: bool,
    result: Option<QueryResult>,
}

impl QueryCommand {
    pub fn new(index_query: IndexQuery) -> Self {
        Self {
            index_query,
            no_caching: false,
            result: None,
        }
    }

    pub fn with_no_caching(mut self, no_caching: bool) -> Self {
        self.no_caching = no_caching;
        self
    }

    pub fn index_query(&self) -> &IndexQuery {
        &self.index_query
    }
}

impl RavenCommand for QueryCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        ensure_query_text(&self.index_query)?;
        let url = database_url(node, "/queries")?;
        let mut request =
            HttpRequest::post(url).with_json("query", &IndexQueryPayload::from(&self.index_query))?;
        if self.no_caching {
            request = request.with_header("Cache-Control", "no-cache");
        }
        Ok(request)
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        self.result = Some(decode_json("query", response)?);
        Ok(())
    }

    fn is_read_request(&self) -> bool {
        true
    }
}

impl TypedCommand for QueryCommand {
    type Output = QueryResult;

    fn result(&self) -> Option<&QueryResult> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<QueryResult> {
        self.result
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StreamEnvelope {
    results: Vec<Value>,
}

/// Streams query results; the whole response is buffered before decoding.
#[derive(Clone, Debug)]
pub struct StreamQueryCommand {
    index_query: IndexQuery,
    result: Option<Vec<Value>>,
}

impl StreamQueryCommand {
    pub fn new(index_query: IndexQuery) -> Self {
        Self {
            index_query,
            result: None,
        }
    }
}

impl RavenCommand for StreamQueryCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        ensure_query_text(&self.index_query)?;
        if self.index_query.wait_for_non_stale_results {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("streaming queries do not support waiting for non-stale results"));
        }
        let url = database_url(node, "/streams/queries")?;
        HttpRequest::post(url).with_json("stream query", &IndexQueryPayload::from(&self.index_query))
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        let envelope: StreamEnvelope = decode_json("stream query", response)?;
        self.result = Some(envelope.results);
        Ok(())
    }

    fn is_read_request(&self) -> bool {
        true
    }
}

impl TypedCommand for StreamQueryCommand {
    type Output = Vec<Value>;

    fn result(&self) -> Option<&Vec<Value>> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<Vec<Value>> {
        self.result
    }
}

fn no_parameters(parameters: &&Map<String, Value>) -> bool {
    parameters.is_empty()
}

fn ensure_query_text(query: &IndexQuery) -> ApiResult<()> {
    if query.query.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("query text cannot be empty"));
    }
    Ok(())
}

/// Server time span format: `[d.]hh:mm:ss[.fffffff]`.
pub(crate) fn format_time_span(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    let ticks = duration.subsec_nanos() / 100;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}."));
    }
    out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if ticks > 0 {
        out.push_str(&format!(".{ticks:07}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{IndexQuery, QueryCommand, StreamQueryCommand, format_time_span};
    use crate::api::command::{RavenCommand, TypedCommand};
    use crate::core::error::ErrorKind;
    use crate::core::node::ServerNode;
    use serde_json::{Value, json};
    use std::time::Duration;

    fn node() -> ServerNode {
        ServerNode::new("http://localhost:8080", "db1", "A")
    }

    #[test]
    fn time_span_formatting() {
        assert_eq!(format_time_span(Duration::from_secs(15)), "00:00:15");
        assert_eq!(format_time_span(Duration::from_secs(3_725)), "01:02:05");
        assert_eq!(format_time_span(Duration::from_secs(90_061)), "1.01:01:01");
        assert_eq!(format_time_span(Duration::from_millis(1_500)), "00:00:01.5000000");
    }

    #[test]
    fn query_payload_includes_wait_settings() {
        let mut query = IndexQuery::new("from Users");
        query.wait_for_non_stale_results = true;
        query.wait_for_non_stale_results_timeout = Some(Duration::from_secs(15));
        query
            .query_parameters
            .insert("p0".to_string(), json!("John"));
        let command = QueryCommand::new(query).with_no_caching(true);
        let request = command.create_request(&node()).expect("request");
        assert_eq!(request.url, "http://localhost:8080/databases/db1/queries");
        assert_eq!(request.header("Cache-Control"), Some("no-cache"));
        let body: Value = serde_json::from_slice(request.body.as_deref().expect("body")).expect("json");
        assert_eq!(body["Query"], "from Users");
        assert_eq!(body["WaitForNonStaleResults"], true);
        assert_eq!(body["WaitForNonStaleResultsTimeout"], "00:00:15");
        assert_eq!(body["QueryParameters"]["p0"], "John");
    }

    #[test]
    fn timeout_is_dropped_without_wait_flag() {
        let mut query = IndexQuery::new("from Users");
        query.wait_for_non_stale_results_timeout = Some(Duration::from_secs(15));
        let request = QueryCommand::new(query)
            .create_request(&node())
            .expect("request");
        let body: Value = serde_json::from_slice(request.body.as_deref().expect("body")).expect("json");
        assert!(body.get("WaitForNonStaleResultsTimeout").is_none());
        assert!(body.get("WaitForNonStaleResults").is_none());
    }

    #[test]
    fn query_result_decodes() {
        let mut command = QueryCommand::new(IndexQuery::new("from Users"));
        command
            .set_response(
                br#"{"Results":[{"Name":"John"}],"TotalResults":1,"IndexName":"Auto/Users/ByName","IsStale":false}"#,
                false,
            )
            .expect("decode");
        let result = command.into_result().expect("result");
        assert_eq!(result.total_results, 1);
        assert_eq!(result.results[0]["Name"], "John");
    }

    #[test]
    fn stream_rejects_non_stale_wait() {
        let mut query = IndexQuery::new("from Users");
        query.wait_for_non_stale_results = true;
        let err = StreamQueryCommand::new(query)
            .create_request(&node())
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn empty_query_text_is_rejected() {
        let err = QueryCommand::new(IndexQuery::new("  "))
            .create_request(&node())
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
