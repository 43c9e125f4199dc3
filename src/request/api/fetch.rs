use std::time::Duration;

use tracing::debug;

use crate::log::LogFetchInfo;
use crate::message::{MemoryRecords, TopicPartition};
use crate::protocol::{
    ErrorCode, FetchRequest, FetchResponse, PartitionFetchResponse, TopicFetchResponse,
};
use crate::request::RequestContext;
use crate::AppResult;

pub struct FetchRequestHandler;

impl FetchRequestHandler {
    /// Resolves each partition's fetch through the sparse index and streams
    /// whole records back. An empty result polls once more after a bounded
    /// sleep when the client asked to wait; the engine itself never blocks.
    pub async fn handle_request(
        &self,
        request: FetchRequest,
        context: &RequestContext,
    ) -> FetchResponse {
        let wait_ms = (request.max_wait_ms.max(0) as u64)
            .min(context.log_manager.config().fetch_wait_max_ms);

        let mut topic_data = Vec::with_capacity(request.topic_data.len());
        for topic in request.topic_data {
            let mut partition_data = Vec::with_capacity(topic.partition_data.len());
            for partition in topic.partition_data {
                let topic_partition = TopicPartition::new(topic.topic.clone(), partition.partition);
                let result = Self::fetch_one(
                    &topic_partition,
                    partition.fetch_offset,
                    partition.max_bytes,
                    wait_ms,
                    context,
                )
                .await;
                partition_data.push(match result {
                    Ok(info) => PartitionFetchResponse {
                        partition: partition.partition,
                        error_code: ErrorCode::None,
                        high_water_mark: info.high_water_mark,
                        records: info.records,
                    },
                    Err(e) => {
                        debug!("fetch from {} failed: {}", topic_partition, e);
                        PartitionFetchResponse {
                            partition: partition.partition,
                            error_code: ErrorCode::from_error(&e),
                            high_water_mark: context
                                .log_manager
                                .high_water_mark(&topic_partition)
                                .unwrap_or(-1),
                            records: MemoryRecords::empty(),
                        }
                    }
                });
            }
            topic_data.push(TopicFetchResponse {
                topic: topic.topic,
                partition_data,
            });
        }
        FetchResponse { topic_data }
    }

    async fn fetch_one(
        topic_partition: &TopicPartition,
        fetch_offset: i64,
        max_bytes: i32,
        wait_ms: u64,
        context: &RequestContext,
    ) -> AppResult<LogFetchInfo> {
        let info = context
            .log_manager
            .read_records(topic_partition, fetch_offset, max_bytes)
            .await?;
        if !info.records.is_empty() || wait_ms == 0 {
            return Ok(info);
        }
        // fetch at the high-water mark: one sleep-then-retry poll
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        context
            .log_manager
            .read_records(topic_partition, fetch_offset, max_bytes)
            .await
    }
}
