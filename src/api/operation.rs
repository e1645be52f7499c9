//! Purpose: Turn high-level requests into commands and run them against a database.
//! Exports: `VoidOperation`, `ResultOperation`, `OperationExecutor`, `resolve_database`.
//! Role: Binds conventions and the target database before handing a command to an executor.
//! Invariants: Operations never perform I/O themselves; `get_command` is pure.
//! Invariants: Database resolution is explicit > operation > default, first non-empty wins.
#![allow(clippy::result_large_err)]

use super::command::{RavenCommand, TypedCommand};
use super::executor::Executor;
use crate::core::conventions::DocumentConventions;
use crate::core::error::ApiResult;
use crate::core::node::ServerNode;
use std::sync::Arc;
use tracing::debug;

/// An operation whose command carries no typed result.
pub trait VoidOperation {
    fn get_command(&self, conventions: &DocumentConventions) -> ApiResult<Box<dyn RavenCommand>>;

    /// Database this operation was bound to, if any.
    fn database(&self) -> Option<&str> {
        None
    }
}

pub trait ResultOperation {
    type Command: TypedCommand;

    fn get_command(&self, conventions: &DocumentConventions) -> ApiResult<Self::Command>;

    fn database(&self) -> Option<&str> {
        None
    }
}

pub type OperationOutput<O> = <<O as ResultOperation>::Command as TypedCommand>::Output;

pub fn resolve_database(
    explicit: Option<&str>,
    operation: Option<&str>,
    default: Option<&str>,
) -> Option<String> {
    [explicit, operation, default]
        .into_iter()
        .flatten()
        .find(|name| !name.is_empty())
        .map(str::to_string)
}

/// Runs operations on one node. Cheap to clone; the executor is shared.
#[derive(Clone)]
pub struct OperationExecutor {
    executor: Arc<dyn Executor>,
    node: ServerNode,
    conventions: DocumentConventions,
    database: Option<String>,
}

impl OperationExecutor {
    pub fn new(executor: Arc<dyn Executor>, node: ServerNode) -> Self {
        Self {
            executor,
            node,
            conventions: DocumentConventions::default(),
            database: None,
        }
    }

    pub fn with_conventions(mut self, conventions: DocumentConventions) -> Self {
        self.conventions = conventions;
        self
    }

    /// Same executor, pinned to `database` ahead of any operation default.
    pub fn for_database(&self, database: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.database = Some(database.into());
        next
    }

    pub fn conventions(&self) -> &DocumentConventions {
        &self.conventions
    }

    pub fn send_void<O: VoidOperation + ?Sized>(&self, operation: &O) -> ApiResult<()> {
        let node = self.target(operation.database());
        let mut command = operation.get_command(&self.conventions)?;
        self.executor.execute(command.as_mut(), &node)
    }

    pub fn send<O: ResultOperation + ?Sized>(
        &self,
        operation: &O,
    ) -> ApiResult<Option<OperationOutput<O>>> {
        let node = self.target(operation.database());
        let mut command = operation.get_command(&self.conventions)?;
        self.executor.execute(&mut command, &node)?;
        Ok(command.into_result())
    }

    fn target(&self, operation_database: Option<&str>) -> ServerNode {
        let database = resolve_database(
            self.database.as_deref(),
            operation_database,
            Some(self.node.database()),
        )
        .unwrap_or_default();
        debug!(database = %database, url = self.node.url(), "resolved operation target");
        self.node.for_database(database)
    }
}
