use super::{RavenCommand, TypedCommand, database_url, decode_json};
use crate::api::index::IndexDefinition;
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::http::HttpRequest;
use crate::core::node::ServerNode;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutIndexResult {
    pub index: String,
    #[serde(default)]
    pub raft_command_index: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutIndexesPayload<'a> {
    indexes: &'a [IndexDefinition],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutIndexesResponse {
    results: Vec<PutIndexResult>,
}

#[derive(Clone, Debug)]
pub struct PutIndexesCommand {
    indexes: Vec<IndexDefinition>,
    result: Option<Vec<PutIndexResult>>,
}

impl PutIndexesCommand {
    pub fn new(indexes: Vec<IndexDefinition>) -> Self {
        Self {
            indexes,
            result: None,
        }
    }
}

impl RavenCommand for PutIndexesCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        if self.indexes.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("no index definitions to put"));
        }
        if let Some(unnamed) = self.indexes.iter().find(|index| index.name.is_empty()) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("index definition has no name (maps: {})", unnamed.maps.len())));
        }
        let url = database_url(node, "/admin/indexes")?;
        HttpRequest::put(url).with_json(
            "put indexes",
            &PutIndexesPayload {
                indexes: &self.indexes,
            },
        )
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        let decoded: PutIndexesResponse = decode_json("put indexes", response)?;
        self.result = Some(decoded.results);
        Ok(())
    }
}

impl TypedCommand for PutIndexesCommand {
    type Output = Vec<PutIndexResult>;

    fn result(&self) -> Option<&Vec<PutIndexResult>> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<Vec<PutIndexResult>> {
        self.result
    }
}
