use super::{
    RavenCommand, TypedCommand, decode_json, encode_query_value, require_database,
    require_non_empty,
};
use crate::api::operations::RemoveClusterNode;
use crate::core::error::ApiResult;
use crate::core::http::HttpRequest;
use crate::core::node::ServerNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Removes a node from the cluster. The record is sent as the payload and
/// decoded back field-for-field from the server answer.
#[derive(Clone, Debug)]
pub struct RemoveNodeCommand {
    request: RemoveClusterNode,
    result: Option<RemoveClusterNode>,
}

impl RemoveNodeCommand {
    pub fn new(request: RemoveClusterNode) -> Self {
        Self {
            request,
            result: None,
        }
    }
}

impl RavenCommand for RemoveNodeCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        let tag = require_non_empty(&self.request.node, "node tag")?;
        let url = format!(
            "{}/admin/cluster/node?nodeTag={}",
            node.url(),
            encode_query_value(tag)
        );
        HttpRequest::delete(url).with_json("remove cluster node", &self.request)
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        self.result = Some(decode_json("remove cluster node", response)?);
        Ok(())
    }
}

impl TypedCommand for RemoveNodeCommand {
    type Output = RemoveClusterNode;

    fn result(&self) -> Option<&RemoveClusterNode> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<RemoveClusterNode> {
        self.result
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterTopology {
    #[serde(default)]
    pub topology_id: String,
    #[serde(default)]
    pub all_nodes: BTreeMap<String, String>,
    #[serde(default)]
    pub members: BTreeMap<String, String>,
    #[serde(default)]
    pub promotables: BTreeMap<String, String>,
    #[serde(default)]
    pub watchers: BTreeMap<String, String>,
    #[serde(default)]
    pub last_node_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterTopologyResponse {
    #[serde(default)]
    pub leader: String,
    #[serde(default)]
    pub node_tag: String,
    pub topology: ClusterTopology,
}

#[derive(Clone, Debug, Default)]
pub struct GetClusterTopologyCommand {
    result: Option<ClusterTopologyResponse>,
}

impl GetClusterTopologyCommand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RavenCommand for GetClusterTopologyCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        Ok(HttpRequest::get(format!("{}/cluster/topology", node.url())))
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        self.result = Some(decode_json("cluster topology", response)?);
        Ok(())
    }

    fn is_read_request(&self) -> bool {
        true
    }
}

impl TypedCommand for GetClusterTopologyCommand {
    type Output = ClusterTopologyResponse;

    fn result(&self) -> Option<&ClusterTopologyResponse> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<ClusterTopologyResponse> {
        self.result
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Topology {
    #[serde(default)]
    pub etag: i64,
    #[serde(default)]
    pub nodes: Vec<ServerNode>,
}

/// Reads the database topology. Unknown databases answer 503.
#[derive(Clone, Debug, Default)]
pub struct GetTopologyCommand {
    force_url: Option<String>,
    result: Option<Topology>,
}

impl GetTopologyCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the server to describe itself under this url.
    pub fn with_force_url(mut self, url: impl Into<String>) -> Self {
        self.force_url = Some(url.into());
        self
    }
}

impl RavenCommand for GetTopologyCommand {
    fn create_request(&self, node: &ServerNode) -> ApiResult<HttpRequest> {
        let database = require_database(node)?;
        let mut url = format!(
            "{}/topology?name={}",
            node.url(),
            encode_query_value(database)
        );
        if let Some(force_url) = &self.force_url {
            url.push_str("&url=");
            url.push_str(&encode_query_value(force_url));
        }
        Ok(HttpRequest::get(url))
    }

    fn set_response(&mut self, response: &[u8], _from_cache: bool) -> ApiResult<()> {
        self.result = Some(decode_json("topology", response)?);
        Ok(())
    }

    fn is_read_request(&self) -> bool {
        true
    }
}

impl TypedCommand for GetTopologyCommand {
    type Output = Topology;

    fn result(&self) -> Option<&Topology> {
        self.result.as_ref()
    }

    fn into_result(self) -> Option<Topology> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::{GetClusterTopologyCommand, GetTopologyCommand, RemoveNodeCommand};
    use crate::api::command::{RavenCommand, TypedCommand};
    use crate::api::operations::RemoveClusterNode;
    use crate::core::error::ErrorKind;
    use crate::core::http::Method;
    use crate::core::node::ServerNode;

    fn node() -> ServerNode {
        ServerNode::new("http://localhost:8080", "", "A")
    }

    #[test]
    fn remove_node_round_trips_record() {
        let mut command = RemoveNodeCommand::new(RemoveClusterNode::new("B"));
        let request = command.create_request(&node()).expect("request");
        assert_eq!(request.method, Method::Delete);
        assert_eq!(
            request.url,
            "http://localhost:8080/admin/cluster/node?nodeTag=B"
        );
        let sent: serde_json::Value =
            serde_json::from_slice(request.body.as_deref().expect("body")).expect("json");
        assert_eq!(sent["Node"], "B");

        command
            .set_response(br#"{"Node":"B","Tag":"B"}"#, false)
            .expect("decode");
        let result = command.into_result().expect("result");
        assert_eq!(result.node, "B");
        assert_eq!(result.tag, "B");
    }

    #[test]
    fn remove_node_requires_tag() {
        let command = RemoveNodeCommand::new(RemoveClusterNode::new(""));
        let err = command.create_request(&node()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn cluster_topology_decodes_members() {
        let mut command = GetClusterTopologyCommand::new();
        let request = command.create_request(&node()).expect("request");
        assert_eq!(request.url, "http://localhost:8080/cluster/topology");

        let body = br#"{"Leader":"A","NodeTag":"A","Topology":{"TopologyId":"t-1","AllNodes":{"A":"http://localhost:8080"},"Members":{"A":"http://localhost:8080"},"Promotables":{},"Watchers":{},"LastNodeId":"A"},"Etag":3}"#;
        command.set_response(body, false).expect("decode");
        let result = command.result().expect("result");
        assert_eq!(result.leader, "A");
        assert_eq!(result.topology.members.len(), 1);
    }

    #[test]
    fn topology_encodes_database_and_force_url() {
        let command = GetTopologyCommand::new().with_force_url("http://10.0.0.2:8080");
        let request = command
            .create_request(&node().for_database("orders"))
            .expect("request");
        assert_eq!(
            request.url,
            "http://localhost:8080/topology?name=orders&url=http%3A%2F%2F10.0.0.2%3A8080"
        );
    }

    #[test]
    fn topology_rejects_missing_fields() {
        let mut command = GetTopologyCommand::new();
        let err = command.set_response(b"not json", false).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(command.result().is_none());
    }
}
