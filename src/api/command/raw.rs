use super::{RavenCommand, TypedCommand, decode_json, require_database};
use crate::core::error::ApiResult;
use crate::core::http::{HttpRequest, Method};
use crate::core::node::ServerNode;
use serde_json::Value;

/// Arbitrary request against a url template. `{url}` expands to the node url
/// and `{db}` to the node database; the body is decoded as untyped JSON.
#[derive(Clone, Debug)]
pub struct RawCommand {
    method: Method,
    url_template: String,
    body: Option<Value>,
    result: Option<Value>,
}

impl RawCommand {
    pub fn new(method: Method, url_template: impl Into<String>) -> Self {
        Self {
            method,
            url_template: url_template.into(),
            body: None,
            result: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn expand(&self, node: &ServerNode) -> ApiResult<String> {
        let mut url = self.url_template.replace("{url}", node.url());
        if url.contains("{db}") {
            url = url.replace("{db}", require_database(node)?);
        }
        Ok(url)
    }
}

impl RavenCommand for RawCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        let request = HttpRequest::new(self.method, self.expand(node)?);
        match &self.body {
            Some(body) => request.with_json("raw", body),
            None => Ok(request),
        }
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        if response.iter().all(u8::is_ascii_whitespace) {
            self.result = Some(Value::Null);
            return Ok(());
        }
        self.result = Some(decode_json("raw", response)?);
        Ok(())
    }

    fn is_read_request(&self) -> bool {
        self.method == Method::Get
    }
}

impl TypedCommand for RawCommand {
    type Output = Value;

    fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<Value> {
        self.result
    }
}
