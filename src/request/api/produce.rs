use tracing::debug;

use crate::message::TopicPartition;
use crate::protocol::{
    ErrorCode, PartitionProduceResponse, ProduceRequest, ProduceResponse, TopicProduceResponse,
};
use crate::request::RequestContext;
use crate::{AppError, AppResult};

pub struct ProduceRequestHandler;

impl ProduceRequestHandler {
    /// Routes each partition's batch to its single writer and assembles
    /// per-partition outcomes in request order. A failing partition never
    /// fails the whole request; its slot carries the error code.
    pub async fn handle_request(
        &self,
        request: ProduceRequest,
        context: &RequestContext,
    ) -> ProduceResponse {
        let mut topic_data = Vec::with_capacity(request.topic_data.len());
        for topic in request.topic_data {
            let mut partition_data = Vec::with_capacity(topic.partition_data.len());
            for partition in topic.partition_data {
                let topic_partition = TopicPartition::new(topic.topic.clone(), partition.partition);
                let result = Self::append_one(&topic_partition, partition.records, context).await;
                partition_data.push(match result {
                    Ok(offset) => PartitionProduceResponse {
                        partition: partition.partition,
                        error_code: ErrorCode::None,
                        offset,
                    },
                    Err(e) => {
                        debug!("produce to {} failed: {}", topic_partition, e);
                        PartitionProduceResponse {
                            partition: partition.partition,
                            error_code: ErrorCode::from_error(&e),
                            offset: -1,
                        }
                    }
                });
            }
            topic_data.push(TopicProduceResponse {
                topic: topic.topic,
                partition_data,
            });
        }
        ProduceResponse { topic_data }
    }

    async fn append_one(
        topic_partition: &TopicPartition,
        records: crate::message::MemoryRecords,
        context: &RequestContext,
    ) -> AppResult<i64> {
        if !context.cluster.is_leader(topic_partition) {
            return Err(AppError::NotLeaderForPartition(topic_partition.to_string()));
        }
        let info = context
            .log_manager
            .append_records(topic_partition, records)
            .await?;
        Ok(info.first_offset)
    }
}
