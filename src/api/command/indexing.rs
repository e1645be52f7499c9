use super::{RavenCommand, database_url, ensure_empty};
use crate::core::error::ApiResult;
use crate::core::http::HttpRequest;
use crate::core::node::ServerNode;

/// Pauses indexing for the node's database. The server answers 204.
#[derive(Clone, Debug, Default)]
pub struct StopIndexingCommand;

impl StopIndexingCommand {
    pub fn new() -> Self {
        Self
    }
}

impl RavenCommand for StopIndexingCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        let url = database_url(node, "/admin/indexes/stop")?;
        Ok(HttpRequest::post(url))
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        ensure_empty("stop indexing", response)
    }
}

#[derive(Clone, Debug, Default)]
pub struct StartIndexingCommand;

impl StartIndexingCommand {
    pub fn new() -> Self {
        Self
    }
}

impl RavenCommand for StartIndexingCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        let url = database_url(node, "/admin/indexes/start")?;
        Ok(HttpRequest::post(url))
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        ensure_empty("start indexing", response)
    }
}
