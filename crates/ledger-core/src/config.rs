//! Static process topology.
//!
//! The original system hard-codes a module-level table of node name to
//! `(host, port)`; per the re-architecture guidance this becomes a
//! configuration value built once at process startup and threaded through
//! constructors rather than a global.

use crate::error::{LedgerError, LedgerResult};
use crate::ids::{ClusterTag, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Host and port a node listens on for the single-document TCP RPC
/// protocol described in §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Listen address.
    pub host: IpAddr,
    /// Listen port.
    pub port: u16,
}

impl Endpoint {
    /// Build an endpoint bound to `127.0.0.1:port`, the default used by
    /// the static node table.
    #[must_use]
    pub fn localhost(port: u16) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(value: Endpoint) -> Self {
        SocketAddr::new(value.host, value.port)
    }
}

/// One entry in the static node table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Process identity.
    pub node_id: NodeId,
    /// Which cluster (or the coordinator) this node belongs to.
    pub cluster: ClusterTag,
    /// Where to reach it.
    pub endpoint: Endpoint,
}

/// The full static mapping of `NodeId -> (cluster, endpoint)` for every
/// process in the system, loaded once at startup.
///
/// A module-level global in the source; here it is a plain value built by
/// [`NodeTable::default_topology`] (or loaded from a config file) and
/// passed into every constructor that needs to address a peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTable {
    nodes: HashMap<NodeId, NodeEntry>,
}

impl NodeTable {
    /// Build a table from an explicit list of entries, e.g. one loaded
    /// from a deployment's configuration file, or a test harness that
    /// needs ephemeral ports. Later entries with a duplicate node id
    /// overwrite earlier ones.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = NodeEntry>) -> Self {
        let nodes = entries
            .into_iter()
            .map(|entry| (entry.node_id.clone(), entry))
            .collect();
        Self { nodes }
    }

    /// The canonical three-cluster topology used throughout this
    /// specification: coordinator on port 5001, cluster A on
    /// `{5002, 5004, 5005}`, cluster B on `{5003, 5006, 5007}`.
    #[must_use]
    pub fn default_topology() -> Self {
        let entries = [
            ("Coordinator", ClusterTag::Coordinator, 5001),
            ("A1", ClusterTag::A, 5002),
            ("B1", ClusterTag::B, 5003),
            ("A2", ClusterTag::A, 5004),
            ("A3", ClusterTag::A, 5005),
            ("B2", ClusterTag::B, 5006),
            ("B3", ClusterTag::B, 5007),
        ];

        let nodes = entries
            .into_iter()
            .map(|(name, cluster, port)| {
                (
                    name.to_string(),
                    NodeEntry {
                        node_id: name.to_string(),
                        cluster,
                        endpoint: Endpoint::localhost(port),
                    },
                )
            })
            .collect();

        Self { nodes }
    }

    /// Look up a node's full entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownNode`] if `node_id` is not present.
    pub fn entry(&self, node_id: &str) -> LedgerResult<&NodeEntry> {
        self.nodes
            .get(node_id)
            .ok_or_else(|| LedgerError::UnknownNode(node_id.to_string()))
    }

    /// Endpoint for a node.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownNode`] if `node_id` is not present.
    pub fn endpoint(&self, node_id: &str) -> LedgerResult<Endpoint> {
        Ok(self.entry(node_id)?.endpoint)
    }

    /// All node ids belonging to a given cluster, in table order.
    #[must_use]
    pub fn members_of(&self, cluster: ClusterTag) -> Vec<NodeId> {
        let mut members: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|entry| entry.cluster == cluster)
            .map(|entry| entry.node_id.clone())
            .collect();
        members.sort();
        members
    }

    /// All peer node ids in the same cluster as `node_id`, excluding itself.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownNode`] if `node_id` is not present.
    pub fn peers_of(&self, node_id: &str) -> LedgerResult<Vec<NodeId>> {
        let cluster = self.entry(node_id)?.cluster;
        Ok(self
            .members_of(cluster)
            .into_iter()
            .filter(|id| id != node_id)
            .collect())
    }

    /// Iterate over every entry in the table.
    pub fn iter(&self) -> impl Iterator<Item = &NodeEntry> {
        self.nodes.values()
    }
}
