//! Cluster view.
//!
//! A single-node deployment: this node heads every replica chain and owns
//! every partition it knows about. The interface is what the dispatcher
//! needs; a chain-replication implementation would answer the same
//! questions from distributed state.

use crate::message::TopicPartition;
use crate::service::Node;

#[derive(Debug)]
pub struct ClusterManager {
    node: Node,
    default_partitions: i32,
}

impl ClusterManager {
    pub fn new_local(node: Node, default_partitions: i32) -> Self {
        Self {
            node,
            default_partitions: default_partitions.max(1),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Partitions created when ensure_topic brings a topic into existence.
    pub fn default_partitions(&self) -> i32 {
        self.default_partitions
    }

    /// Whether this node services writes for the partition.
    pub fn is_leader(&self, _topic_partition: &TopicPartition) -> bool {
        true
    }

    /// The replica chain for a topic, head first.
    pub fn chain(&self, _topic: &str) -> Vec<Node> {
        vec![self.node.clone()]
    }
}
