//! Purpose: Define the public client API for talking to a document database server.
//! Exports: Commands, executors, operations, the document store, index and query builders.
//! Role: Public surface used by the `ravendb` CLI and by library callers.
//! Invariants: Every server interaction flows through `Executor::execute`.
//! Invariants: Errors are always `crate::core::error::Error` tagged with an `ErrorKind`.

pub mod command;
mod executor;
mod index;
mod operation;
mod operations;
mod query;
mod store;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::conventions::DocumentConventions;
pub use crate::core::error::{ApiResult, Error, ErrorKind};
pub use crate::core::http::{HttpRequest, HttpResponse, Method};
pub use crate::core::listeners::{ListenerHandle, ListenerRegistry};
pub use crate::core::node::ServerNode;
pub use command::{NotFoundPolicy, RavenCommand, TypedCommand};
pub use executor::{CancelToken, Executor, HttpExecutor, Transport, UreqTransport};
pub use index::{
    ALL_FIELDS, FieldIndexing, FieldStorage, FieldTermVector, IndexCreationTask,
    IndexDefinition, IndexDefinitionBuilder, IndexFieldOptions, IndexLockMode, IndexPriority,
    IndexType, SpatialFieldType, SpatialOptions, SpatialSearchStrategy, SpatialUnits,
};
pub use operation::{
    OperationExecutor, OperationOutput, ResultOperation, VoidOperation, resolve_database,
};
pub use operations::{
    CreateDatabaseOperation, DeleteDatabaseOperation, GetDatabaseNamesOperation,
    GetStatisticsOperation, PutDocumentOperation, PutIndexesOperation, RemoveClusterNode,
    StartIndexingOperation, StopIndexingOperation,
};
pub use query::{
    AfterQueryExecuted, AfterStreamExecuted, BeforeQueryExecuted, DocumentQuery,
    DocumentQueryCustomization, QueryOperation,
};
pub use store::DocumentStore;
