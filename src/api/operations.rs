//! Purpose: Concrete maintenance and document operations.
//! Exports: Indexing, cluster, database, statistics, index and document operations.
//! Role: Each operation owns its inputs and builds exactly one command per send.
//! Invariants: Conventions are read, never mutated.
#![allow(clippy::result_large_err)]

use super::command::{
    CreateDatabaseCommand, DatabaseRecord, DeleteDatabaseCommand, GetDatabaseNamesCommand,
    GetStatisticsCommand, PutDocumentCommand, PutIndexesCommand, RavenCommand, RemoveNodeCommand,
    StartIndexingCommand, StopIndexingCommand,
};
use super::index::IndexDefinition;
use super::operation::{ResultOperation, VoidOperation};
use crate::core::conventions::DocumentConventions;
use crate::core::error::{ApiResult, Error, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Pauses indexing on a database.
#[derive(Clone, Debug, Default)]
pub struct StopIndexingOperation {
    database: Option<String>,
}

impl StopIndexingOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
        }
    }
}

impl VoidOperation for StopIndexingOperation {
    fn get_command(&self, _conventions: &DocumentConventions) -> ApiResult<Box<dyn RavenCommand>> {
        Ok(Box::new(StopIndexingCommand::new()))
    }

    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

#[derive(Clone, Debug, Default)]
pub struct StartIndexingOperation {
    database: Option<String>,
}

impl StartIndexingOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
        }
    }
}

impl VoidOperation for StartIndexingOperation {
    fn get_command(&self, _conventions: &DocumentConventions) -> ApiResult<Box<dyn RavenCommand>> {
        Ok(Box::new(StartIndexingCommand::new()))
    }

    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

/// Node removal request, echoed back by the server on success.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoveClusterNode {
    pub node: String,
    pub tag: String,
}

impl RemoveClusterNode {
    /// The tag defaults to the node name.
    pub fn new(node: impl Into<String>) -> Self {
        let node = node.into();
        Self {
            tag: node.clone(),
            node,
        }
    }
}

impl ResultOperation for RemoveClusterNode {
    type Command = RemoveNodeCommand;

    fn get_command(&self, _conventions: &DocumentConventions) -> ApiResult<Self::Command> {
        Ok(RemoveNodeCommand::new(self.clone()))
    }
}

#[derive(Clone, Debug)]
pub struct CreateDatabaseOperation {
    record: DatabaseRecord,
    replication_factor: u32,
}

impl CreateDatabaseOperation {
    pub fn new(record: DatabaseRecord) -> Self {
        Self {
            record,
            replication_factor: 1,
        }
    }

    pub fn with_replication_factor(mut self, replication_factor: u32) -> Self {
        self.replication_factor = replication_factor;
        self
    }
}

impl ResultOperation for CreateDatabaseOperation {
    type Command = CreateDatabaseCommand;

    fn get_command(&self, _conventions: &DocumentConventions) -> ApiResult<Self::Command> {
        Ok(CreateDatabaseCommand::new(
            self.record.clone(),
            self.replication_factor,
        ))
    }
}

#[derive(Clone, Debug)]
pub struct DeleteDatabaseOperation {
    database_name: String,
    hard_delete: bool,
    from_node: Option<String>,
    time_to_wait_for_confirmation: Option<Duration>,
}

impl DeleteDatabaseOperation {
    pub fn new(database_name: impl Into<String>, hard_delete: bool) -> Self {
        Self {
            database_name: database_name.into(),
            hard_delete,
            from_node: None,
            time_to_wait_for_confirmation: None,
        }
    }

    pub fn from_node(mut self, node_tag: impl Into<String>) -> Self {
        self.from_node = Some(node_tag.into());
        self
    }

    pub fn with_time_to_wait_for_confirmation(mut self, wait: Duration) -> Self {
        self.time_to_wait_for_confirmation = Some(wait);
        self
    }
}

impl ResultOperation for DeleteDatabaseOperation {
    type Command = DeleteDatabaseCommand;

    fn get_command(&self, _conventions: &DocumentConventions) -> ApiResult<Self::Command> {
        let command = DeleteDatabaseCommand::new(
            self.database_name.clone(),
            self.hard_delete,
            self.from_node.clone(),
        );
        Ok(match self.time_to_wait_for_confirmation {
            Some(wait) => command.with_time_to_wait_for_confirmation(wait),
            None => command,
        })
    }
}

/// Lists database names. Without an explicit page size the conventions decide.
#[derive(Clone, Debug, Default)]
pub struct GetDatabaseNamesOperation {
    start: usize,
    page_size: Option<usize>,
}

impl GetDatabaseNamesOperation {
    pub fn new(start: usize, page_size: Option<usize>) -> Self {
        Self { start, page_size }
    }
}

impl ResultOperation for GetDatabaseNamesOperation {
    type Command = GetDatabaseNamesCommand;

    fn get_command(&self, conventions: &DocumentConventions) -> ApiResult<Self::Command> {
        let page_size = self
            .page_size
            .unwrap_or_else(|| conventions.database_names_page_size());
        if page_size == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("page size must be positive"));
        }
        Ok(GetDatabaseNamesCommand::new(self.start, page_size))
    }
}

#[derive(Clone, Debug, Default)]
pub struct GetStatisticsOperation {
    debug_tag: Option<String>,
    database: Option<String>,
}

impl GetStatisticsOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug_tag(mut self, tag: impl Into<String>) -> Self {
        self.debug_tag = Some(tag.into());
        self
    }

    pub fn for_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

impl ResultOperation for GetStatisticsOperation {
    type Command = GetStatisticsCommand;

    fn get_command(&self, _conventions: &DocumentConventions) -> ApiResult<Self::Command> {
        Ok(GetStatisticsCommand::new(self.debug_tag.clone()))
    }

    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

#[derive(Clone, Debug)]
pub struct PutIndexesOperation {
    indexes: Vec<IndexDefinition>,
    database: Option<String>,
}

impl PutIndexesOperation {
    pub fn new(indexes: Vec<IndexDefinition>) -> Self {
        Self {
            indexes,
            database: None,
        }
    }

    pub fn for_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

impl ResultOperation for PutIndexesOperation {
    type Command = PutIndexesCommand;

    fn get_command(&self, _conventions: &DocumentConventions) -> ApiResult<Self::Command> {
        Ok(PutIndexesCommand::new(self.indexes.clone()))
    }

    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

/// Stores a JSON document, optionally tagging it with the collection derived
/// from a type name. With a type and no id, the id becomes the collection
/// prefix (`users/`) and the server assigns the rest.
#[derive(Clone, Debug)]
pub struct PutDocumentOperation {
    id: String,
    document: Value,
    collection_type: Option<String>,
    change_vector: Option<String>,
    database: Option<String>,
}

impl PutDocumentOperation {
    pub fn new(id: impl Into<String>, document: Value) -> Self {
        Self {
            id: id.into(),
            document,
            collection_type: None,
            change_vector: None,
            database: None,
        }
    }

    pub fn with_collection_type(mut self, type_name: impl Into<String>) -> Self {
        self.collection_type = Some(type_name.into());
        self
    }

    pub fn with_change_vector(mut self, change_vector: impl Into<String>) -> Self {
        self.change_vector = Some(change_vector.into());
        self
    }

    pub fn for_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

impl ResultOperation for PutDocumentOperation {
    type Command = PutDocumentCommand;

    fn get_command(&self, conventions: &DocumentConventions) -> ApiResult<Self::Command> {
        let mut document = self.document.clone();
        let mut id = self.id.clone();
        if let Some(type_name) = &self.collection_type {
            let collection = conventions.find_collection_name(type_name);
            let fields = document.as_object_mut().ok_or_else(|| {
                Error::new(ErrorKind::Usage).with_message("document must be a JSON object")
            })?;
            let metadata = fields
                .entry("@metadata")
                .or_insert_with(|| Value::Object(Map::new()));
            let metadata = metadata.as_object_mut().ok_or_else(|| {
                Error::new(ErrorKind::Usage).with_message("@metadata must be a JSON object")
            })?;
            metadata.insert("@collection".to_string(), Value::String(collection));
            if id.is_empty() {
                id = conventions.document_id_prefix(type_name);
            }
        }
        Ok(PutDocumentCommand::new(
            id,
            document,
            self.change_vector.clone(),
        ))
    }

    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}
