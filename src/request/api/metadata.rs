use tracing::warn;

use crate::message::TopicPartition;
use crate::protocol::{
    BrokerMetadata, ErrorCode, MetadataRequest, MetadataResponse, PartitionMetadata, TopicMetadata,
};
use crate::request::RequestContext;

pub struct MetadataRequestHandler;

impl MetadataRequestHandler {
    /// Answers the cluster layout. Naming a topic creates it: the partition
    /// directories are made and their writers spawned before the reply.
    pub async fn handle_request(
        &self,
        request: MetadataRequest,
        context: &RequestContext,
    ) -> MetadataResponse {
        let topics = if request.topics.is_empty() {
            context.log_manager.topics()
        } else {
            for topic in &request.topics {
                Self::ensure_topic(topic, context);
            }
            request.topics
        };

        let node = context.cluster.node();
        let brokers = vec![BrokerMetadata {
            node_id: node.node_id,
            host: node.host.clone(),
            port: node.port,
        }];

        let topics = topics
            .into_iter()
            .map(|topic| {
                let partitions = context.log_manager.partitions_of(&topic);
                if partitions.is_empty() {
                    return TopicMetadata {
                        error_code: ErrorCode::UnknownTopicOrPartition,
                        topic,
                        partitions: Vec::new(),
                    };
                }
                let partitions = partitions
                    .into_iter()
                    .map(|partition| PartitionMetadata {
                        error_code: ErrorCode::None,
                        partition,
                        leader: node.node_id,
                        replicas: vec![node.node_id],
                        isr: vec![node.node_id],
                    })
                    .collect();
                TopicMetadata {
                    error_code: ErrorCode::None,
                    topic,
                    partitions,
                }
            })
            .collect();

        MetadataResponse { brokers, topics }
    }

    fn ensure_topic(topic: &str, context: &RequestContext) {
        if context.log_manager.has_topic(topic) {
            return;
        }
        for partition in 0..context.cluster.default_partitions() {
            let tp = TopicPartition::new(topic, partition);
            if let Err(e) = context.log_manager.ensure_topic_partition(&tp) {
                warn!("creating {} failed: {}", tp, e);
            }
        }
    }
}
