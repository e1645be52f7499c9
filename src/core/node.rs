//! Purpose: Identify one addressable server endpoint.
//! Exports: `ServerNode`.
//! Role: Passed by reference into every executor call; decoded from topology responses.
//! Invariants: Immutable once built; `url` carries no trailing slash.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerNode {
    pub url: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub cluster_tag: String,
}

impl ServerNode {
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        cluster_tag: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            database: database.into(),
            cluster_tag: cluster_tag.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn cluster_tag(&self) -> &str {
        &self.cluster_tag
    }

    /// Same endpoint, different database.
    pub fn for_database(&self, database: impl Into<String>) -> Self {
        Self {
            url: self.url.clone(),
            database: database.into(),
            cluster_tag: self.cluster_tag.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ServerNode;

    #[test]
    fn trailing_slash_is_trimmed() {
        let node = ServerNode::new("http://localhost:8080/", "db", "A");
        assert_eq!(node.url(), "http://localhost:8080");
    }

    #[test]
    fn decodes_topology_shape() {
        let node: ServerNode = serde_json::from_str(
            r#"{"Url":"http://10.0.0.1:8080","Database":"orders","ClusterTag":"B","ServerRole":"Member"}"#,
        )
        .expect("node");
        assert_eq!(node.cluster_tag(), "B");
        assert_eq!(node.database(), "orders");
    }
}
