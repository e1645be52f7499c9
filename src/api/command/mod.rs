//! Purpose: Define the unit of work exchanged with one server node.
//! Exports: `RavenCommand`, `TypedCommand`, `NotFoundPolicy`, and every concrete command.
//! Role: Commands build requests and decode 2xx bodies; executors own routing and classification.
//! Invariants: `set_response` only ever sees 2xx bodies and never depends on `from_cache`.
//! Invariants: Missing required inputs fail in `create_request` with `ErrorKind::Usage`.
//! Invariants: A command is used for one exchange; its result is `None` until decoded.

mod cluster;
mod database;
mod document;
mod indexes;
mod indexing;
mod query;
mod raw;
mod statistics;

pub use cluster::{
    ClusterTopology, ClusterTopologyResponse, GetClusterTopologyCommand, GetTopologyCommand,
    RemoveNodeCommand, Topology,
};
pub use database::{
    CreateDatabaseCommand, DatabaseNames, DatabasePutResult, DatabaseRecord, DatabaseTopology,
    DeleteDatabaseCommand, DeleteDatabaseResult, GetDatabaseNamesCommand,
};
pub use document::{PutDocumentCommand, PutResult};
pub use indexes::{PutIndexResult, PutIndexesCommand};
pub use indexing::{StartIndexingCommand, StopIndexingCommand};
pub use query::{IndexQuery, QueryCommand, QueryResult, StreamQueryCommand};
pub use raw::RawCommand;
pub use statistics::{DatabaseStatistics, GetStatisticsCommand, IndexInformation, SizeOnDisk};

use crate::core::error::{ApiResult, Error, ErrorKind, decode_error};
use crate::core::http::HttpRequest;
use crate::core::node::ServerNode;
use serde::de::DeserializeOwned;
use url::Url;

/// How an executor treats a 404 for a given command.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NotFoundPolicy {
    /// 404 is classified like any other failure.
    #[default]
    Error,
    /// 404 means "absent": the exchange succeeds and the result stays `None`.
    Absent,
}

pub trait RavenCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest>;

    fn set_response(&mut self, response: &[u8], from_cache: bool) -> ApiResult<()>;

    fn not_found_policy(&self) -> NotFoundPolicy {
        NotFoundPolicy::Error
    }

    fn is_read_request(&self) -> bool {
        false
    }
}

/// A command whose decoded body is handed back to the caller.
pub trait TypedCommand: RavenCommand {
    type Output;

    fn result(&self) -> Option<&Self::Output>;

    fn into_result(self) -> Option<Self::Output>;
}

/// `{node}/databases/{database}{suffix}` with the database name encoded as one path segment.
pub(crate) fn database_url(node: &ServerNode, suffix: &str) -> ApiResult<String> {
    let database = require_database(node)?;
    let invalid_url = || {
        Error::new(ErrorKind::Usage)
            .with_message("server url cannot carry a database path")
            .with_url(node.url())
    };
    let mut url = Url::parse(node.url()).map_err(|_| invalid_url())?;
    url.path_segments_mut()
        .map_err(|_| invalid_url())?
        .pop_if_empty()
        .push("databases")
        .push(database);
    Ok(format!("{}{}", url.as_str(), suffix))
}

pub(crate) fn require_database(node: &ServerNode) -> ApiResult<&str> {
    if node.database().is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("database name is required for this command")
            .with_url(node.url()));
    }
    Ok(node.database())
}

pub(crate) fn require_non_empty<'a>(value: &'a str, what: &str) -> ApiResult<&'a str> {
    if value.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{what} cannot be empty")));
    }
    Ok(value)
}

pub(crate) fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub(crate) fn decode_json<T: DeserializeOwned>(what: &str, response: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(response).map_err(|err| decode_error(what, err))
}

/// Accepts only an empty (or whitespace) body.
pub(crate) fn ensure_empty(what: &str, response: &[u8]) -> ApiResult<()> {
    if response.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    Err(Error::new(ErrorKind::Decode)
        .with_message(format!("{what} expected an empty response body"))
        .with_body(String::from_utf8_lossy(response).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::{
        GetDatabaseNamesCommand, GetStatisticsCommand, PutDocumentCommand, RavenCommand,
        StopIndexingCommand, database_url, encode_query_value, ensure_empty,
    };
    use crate::core::error::ErrorKind;
    use crate::core::node::ServerNode;

    #[test]
    fn database_url_requires_database() {
        let node = ServerNode::new("http://localhost:8080", "", "A");
        let err = database_url(&node, "/stats").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let node = node.for_database("orders");
        assert_eq!(
            database_url(&node, "/stats").expect("url"),
            "http://localhost:8080/databases/orders/stats"
        );
    }

    #[test]
    fn database_name_is_one_path_segment() {
        let node = ServerNode::new("http://localhost:8080/", "my db/x", "A");
        assert_eq!(
            database_url(&node, "/stats").expect("url"),
            "http://localhost:8080/databases/my%20db%2Fx/stats"
        );
    }

    #[test]
    fn read_requests_are_flagged() {
        assert!(GetDatabaseNamesCommand::new(0, 10).is_read_request());
        assert!(GetStatisticsCommand::new(None).is_read_request());
        assert!(!StopIndexingCommand::new().is_read_request());
        assert!(!PutDocumentCommand::new("users/1", serde_json::json!({}), None).is_read_request());
    }

    #[test]
    fn query_values_are_form_encoded() {
        assert_eq!(encode_query_value("users/1 a&b"), "users%2F1+a%26b");
    }

    #[test]
    fn empty_body_check_allows_whitespace() {
        ensure_empty("stop indexing", b"").expect("empty");
        ensure_empty("stop indexing", b" \r\n").expect("whitespace");
        let err = ensure_empty("stop indexing", b"{}").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
