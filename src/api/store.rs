//! Purpose: Entry point binding a server url, a default database, and an executor.
//! Exports: `DocumentStore`.
//! Role: Hands out operation executors and query builders that share one executor.
//! Invariants: The base url is http(s), has no path, and carries no trailing slash.
//! Invariants: A store talks to exactly one node; there is no topology-driven failover.
#![allow(clippy::result_large_err)]

use super::command::RavenCommand;
use super::executor::{Executor, HttpExecutor};
use super::operation::OperationExecutor;
use super::query::DocumentQuery;
use crate::core::conventions::DocumentConventions;
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::node::ServerNode;
use std::fmt;
use std::sync::Arc;
use url::Url;

#[derive(Clone)]
pub struct DocumentStore {
    node: ServerNode,
    conventions: DocumentConventions,
    executor: Arc<dyn Executor>,
}

impl DocumentStore {
    /// `database` may be empty for server-scoped work.
    pub fn new(url: &str, database: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(url)?;
        Ok(Self {
            node: ServerNode::new(base_url, database, ""),
            conventions: DocumentConventions::default(),
            executor: Arc::new(HttpExecutor::new()),
        })
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_conventions(mut self, conventions: DocumentConventions) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn with_cluster_tag(mut self, tag: impl Into<String>) -> Self {
        self.node = ServerNode::new(self.node.url(), self.node.database(), tag);
        self
    }

    pub fn url(&self) -> &str {
        self.node.url()
    }

    pub fn database(&self) -> &str {
        self.node.database()
    }

    pub fn conventions(&self) -> &DocumentConventions {
        &self.conventions
    }

    pub fn node(&self) -> &ServerNode {
        &self.node
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn maintenance(&self) -> OperationExecutor {
        OperationExecutor::new(Arc::clone(&self.executor), self.node.clone())
            .with_conventions(self.conventions.clone())
    }

    /// Runs a command directly against the store's node.
    pub fn execute(&self, command: &mut dyn RavenCommand) -> ApiResult<()> {
        self.executor.execute(command, &self.node)
    }

    pub fn query(&self, rql: impl Into<String>) -> DocumentQuery {
        DocumentQuery::new(rql, self.conventions.clone())
    }
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("node", &self.node)
            .field("conventions", &self.conventions)
            .finish_non_exhaustive()
    }
}

fn normalize_base_url(raw: &str) -> ApiResult<String> {
    let mut url = Url::parse(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid server url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("server url must use http or https scheme")
        );
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("server url must not include a path"));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.as_str().trim_end_matches('/').to_string())
}
