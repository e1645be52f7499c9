use super::{RavenCommand, TypedCommand, decode_json, encode_query_value, require_non_empty};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::http::HttpRequest;
use crate::core::node::ServerNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseRecord {
    pub database_name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
}

impl DatabaseRecord {
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseTopology {
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub promotables: Vec<String>,
    #[serde(default)]
    pub rehabs: Vec<String>,
    #[serde(default)]
    pub replication_factor: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabasePutResult {
    pub raft_command_index: u64,
    pub name: String,
    #[serde(default)]
    pub nodes_added_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<DatabaseTopology>,
}

#[derive(Clone, Debug)]
pub struct CreateDatabaseCommand {
    record: DatabaseRecord,
    replication_factor: u32,
    result: Option<DatabasePutResult>,
}

impl CreateDatabaseCommand {
    pub fn new(record: DatabaseRecord, replication_factor: u32) -> Self {
        Self {
            record,
            replication_factor,
            result: None,
        }
    }
}

impl RavenCommand for CreateDatabaseCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        let name = require_non_empty(&self.record.database_name, "database name")?;
        validate_database_name(name)?;
        if self.replication_factor == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("replication factor must be at least 1"));
        }
        let url = format!(
            "{}/admin/databases?name={}&replicationFactor={}",
            node.url(),
            encode_query_value(name),
            self.replication_factor
        );
        HttpRequest::put(url).with_json("create database", &self.record)
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        self.result = Some(decode_json("create database", response)?);
        Ok(())
    }
}

impl TypedCommand for CreateDatabaseCommand {
    type Output = DatabasePutResult;

    fn result(&self) -> Option<&DatabasePutResult> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<DatabasePutResult> {
        self.result
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteDatabaseResult {
    pub raft_command_index: u64,
    #[serde(default)]
    pub pending_deletes: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteDatabaseParameters<'a> {
    database_names: [&'a str; 1],
    hard_delete: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    from_nodes: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_to_wait_for_confirmation: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DeleteDatabaseCommand {
    database_name: String,
    hard_delete: bool,
    from_node: Option<String>,
    time_to_wait_for_confirmation: Option<Duration>,
    result: Option<DeleteDatabaseResult>,
}

impl DeleteDatabaseCommand {
    pub fn new(
        database_name: impl Into<String>,
        hard_delete: bool,
        from_node: Option<String>,
    ) -> Self {
        Self {
            database_name: database_name.into(),
            hard_delete,
            from_node: from_node.filter(|tag| !tag.is_empty()),
            time_to_wait_for_confirmation: None,
            result: None,
        }
    }

    pub fn with_time_to_wait_for_confirmation(mut self, wait: Duration) -> Self {
        self.time_to_wait_for_confirmation = Some(wait);
        self
    }
}

impl RavenCommand for DeleteDatabaseCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        let name = require_non_empty(&self.database_name, "database name")?;
        let parameters = DeleteDatabaseParameters {
            database_names: [name],
            hard_delete: self.hard_delete,
            from_nodes: self.from_node.iter().map(String::as_str).collect(),
            time_to_wait_for_confirmation: self
                .time_to_wait_for_confirmation
                .map(super::query::format_time_span),
        };
        HttpRequest::delete(format!("{}/admin/databases", node.url()))
            .with_json("delete database", &parameters)
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        self.result = Some(decode_json("delete database", response)?);
        Ok(())
    }
}

impl TypedCommand for DeleteDatabaseCommand {
    type Output = DeleteDatabaseResult;

    fn result(&self) -> Option<&DeleteDatabaseResult> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<DeleteDatabaseResult> {
        self.result
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseNames {
    pub databases: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct GetDatabaseNamesCommand {
    start: usize,
    page_size: usize,
    result: Option<DatabaseNames>,
}

impl GetDatabaseNamesCommand {
    pub fn new(start: usize, page_size: usize) -> Self {
        Self {
            start,
            page_size,
            result: None,
        }
    }
}

impl RavenCommand for GetDatabaseNamesCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        Ok(HttpRequest::get(format!(
            "{}/databases?start={}&pageSize={}&namesOnly=true",
            node.url(),
            self.start,
            self.page_size
        )))
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        self.result = Some(decode_json("database names", response)?);
        Ok(())
    }

    fn is_read_request(&self) -> bool {
        true
    }
}

impl TypedCommand for GetDatabaseNamesCommand {
    type Output = DatabaseNames;

    fn result(&self) -> Option<&DatabaseNames> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<DatabaseNames> {
        self.result
    }
}

fn validate_database_name(name: &str) -> ApiResult<()> {
    let valid = name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("invalid database name '{name}'"))
            .with_hint("Database names may only contain letters, digits, '_', '-', and '.'."));
    }
    Ok(())
}
