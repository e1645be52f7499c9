use super::{RavenCommand, TypedCommand, database_url, decode_json, encode_query_value};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::http::HttpRequest;
use crate::core::node::ServerNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutResult {
    pub id: String,
    #[serde(default)]
    pub change_vector: Option<String>,
}

/// Stores a raw JSON document. A change vector turns the put into an
/// optimistic-concurrency write (`If-Match`).
#[derive(Clone, Debug)]
pub struct PutDocumentCommand {
    id: String,
    document: Value,
    change_vector: Option<String>,
    result: Option<PutResult>,
}

impl PutDocumentCommand {
    pub fn new(id: impl Into<String>, document: Value, change_vector: Option<String>) -> Self {
        Self {
            id: id.into(),
            document,
            change_vector: change_vector.filter(|cv| !cv.is_empty()),
            result: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document(&self) -> &Value {
        &self.document
    }
}

impl RavenCommand for PutDocumentCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        if self.id.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("document id cannot be empty"));
        }
        if !self.document.is_object() {
            return Err(
                Error::new(ErrorKind::Usage).with_message("document must be a JSON object")
            );
        }
        let url = database_url(node, &format!("/docs?id={}", encode_query_value(&self.id)))?;
        let mut request = HttpRequest::put(url).with_json("put document", &self.document)?;
        if let Some(change_vector) = &self.change_vector {
            request = request.with_header("If-Match", format!("\"{change_vector}\""));
        }
        Ok(request)
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        self.result = Some(decode_json("put document", response)?);
        Ok(())
    }
}

impl TypedCommand for PutDocumentCommand {
    type Output = PutResult;

    fn result(&self) -> Option<&PutResult> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<PutResult> {
        self.result
    }
}
