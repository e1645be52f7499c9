use super::{NotFoundPolicy, RavenCommand, TypedCommand, database_url, decode_json};
use crate::core::error::ApiResult;
use crate::core::http::HttpRequest;
use crate::core::node::ServerNode;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SizeOnDisk {
    #[serde(default)]
    pub humane_size: String,
    #[serde(default)]
    pub size_in_bytes: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexInformation {
    pub name: String,
    #[serde(default)]
    pub is_stale: bool,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub lock_mode: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, rename = "Type")]
    pub index_type: Option<String>,
    #[serde(default)]
    pub last_indexing_time: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseStatistics {
    #[serde(default)]
    pub last_doc_etag: Option<i64>,
    #[serde(default)]
    pub count_of_indexes: i64,
    #[serde(default)]
    pub count_of_documents: i64,
    #[serde(default)]
    pub count_of_revision_documents: i64,
    #[serde(default)]
    pub count_of_conflicts: i64,
    #[serde(default)]
    pub count_of_attachments: i64,
    #[serde(default)]
    pub database_change_vector: Option<String>,
    #[serde(default)]
    pub database_id: String,
    #[serde(default, rename = "Is64Bit")]
    pub is_64_bit: bool,
    #[serde(default)]
    pub pager: String,
    #[serde(default)]
    pub last_indexing_time: Option<String>,
    #[serde(default)]
    pub size_on_disk: Option<SizeOnDisk>,
    #[serde(default)]
    pub indexes: Vec<IndexInformation>,
}

/// Reads database statistics. A 404 leaves the result empty instead of failing.
#[derive(Clone, Debug, Default)]
pub struct GetStatisticsCommand {
    debug_tag: Option<String>,
    result: Option<DatabaseStatistics>,
}

impl GetStatisticsCommand {
    pub fn new(debug_tag: Option<String>) -> Self {
        Self {
            debug_tag: debug_tag.filter(|tag| !tag.is_empty()),
            result: None,
        }
    }
}

impl RavenCommand for GetStatisticsCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        let mut url = database_url(node, "/stats")?;
        if let Some(tag) = &self.debug_tag {
            url.push('?');
            url.push_str(tag);
        }
        Ok(HttpRequest::get(url))
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        self.result = Some(decode_json("statistics", response)?);
        Ok(())
    }

    fn not_found_policy(&self) -> NotFoundPolicy {
        NotFoundPolicy::Absent
    }

    fn is_read_request(&self) -> bool {
        true
    }
}

impl TypedCommand for GetStatisticsCommand {
    type Output = DatabaseStatistics;

    fn result(&self) -> Option<&DatabaseStatistics> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<DatabaseStatistics> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::GetStatisticsCommand;
    use crate::api::command::{NotFoundPolicy, RavenCommand, TypedCommand};
    use crate::core::node::ServerNode;

    #[test]
    fn stats_url_carries_debug_tag() {
        let node = ServerNode::new("http://localhost:8080", "db1", "A");
        let request = GetStatisticsCommand::new(Some("tag".into()))
            .create_request(&node)
            .expect("request");
        assert_eq!(request.url, "http://localhost:8080/databases/db1/stats?tag");
    }

    #[test]
    fn stats_treat_missing_as_absent() {
        assert_eq!(
            GetStatisticsCommand::new(None).not_found_policy(),
            NotFoundPolicy::Absent
        );
    }

    #[test]
    fn stats_decode_partial_payload() {
        let mut command = GetStatisticsCommand::new(None);
        let body = br#"{"CountOfIndexes":2,"CountOfDocuments":1059,"DatabaseId":"abc","Is64Bit":true,"Indexes":[{"Name":"Orders/Totals","IsStale":false,"Type":"Map"}]}"#;
        command.set_response(body, false).expect("decode");
        let stats = command.into_result().expect("stats");
        assert_eq!(stats.count_of_documents, 1059);
        assert!(stats.is_64_bit);
        assert_eq!(stats.indexes[0].index_type.as_deref(), Some("Map"));
    }
}
