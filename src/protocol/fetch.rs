use bytes::{BufMut, BytesMut};

use crate::message::MemoryRecords;
use crate::protocol::primitives::{
    read_array, read_bytes32, read_i16, read_i32, read_i64, require_string16, write_array,
    write_bytes32, write_string16,
};
use crate::protocol::request_header::RequestHeader;
use crate::protocol::{frame_request, frame_response, ApiKey, ErrorCode};
use crate::{AppError, AppResult};

#[derive(Debug)]
pub struct FetchRequest {
    /// Set by replica fetchers; ignored by this engine.
    pub replica_id: i32,
    pub max_wait_ms: i32,
    pub min_bytes: i32,
    pub topic_data: Vec<TopicFetchData>,
}

#[derive(Debug)]
pub struct TopicFetchData {
    pub topic: String,
    pub partition_data: Vec<PartitionFetchData>,
}

#[derive(Debug)]
pub struct PartitionFetchData {
    pub partition: i32,
    pub fetch_offset: i64,
    pub max_bytes: i32,
}

impl FetchRequest {
    pub fn decode(buffer: &mut BytesMut) -> AppResult<Self> {
        let replica_id = read_i32(buffer)?;
        let max_wait_ms = read_i32(buffer)?;
        let min_bytes = read_i32(buffer)?;
        let topic_data = read_array(buffer, |buf| {
            let topic = require_string16(buf, "topic name")?;
            let partition_data = read_array(buf, |buf| {
                Ok(PartitionFetchData {
                    partition: read_i32(buf)?,
                    fetch_offset: read_i64(buf)?,
                    max_bytes: read_i32(buf)?,
                })
            })?;
            Ok(TopicFetchData {
                topic,
                partition_data,
            })
        })?;
        Ok(Self {
            replica_id,
            max_wait_ms,
            min_bytes,
            topic_data,
        })
    }

    pub fn encode(&self, correlation_id: i32, client_id: Option<&str>) -> BytesMut {
        let header = RequestHeader {
            api_key: ApiKey::Fetch,
            api_version: 0,
            correlation_id,
            client_id: client_id.map(str::to_string),
        };
        let mut body = BytesMut::new();
        body.put_i32(self.replica_id);
        body.put_i32(self.max_wait_ms);
        body.put_i32(self.min_bytes);
        write_array(&mut body, &self.topic_data, |buf, topic| {
            write_string16(buf, Some(&topic.topic));
            write_array(buf, &topic.partition_data, |buf, partition| {
                buf.put_i32(partition.partition);
                buf.put_i64(partition.fetch_offset);
                buf.put_i32(partition.max_bytes);
            });
        });
        frame_request(&header, body)
    }
}

#[derive(Debug)]
pub struct FetchResponse {
    pub topic_data: Vec<TopicFetchResponse>,
}

#[derive(Debug)]
pub struct TopicFetchResponse {
    pub topic: String,
    pub partition_data: Vec<PartitionFetchResponse>,
}

#[derive(Debug)]
pub struct PartitionFetchResponse {
    pub partition: i32,
    pub error_code: ErrorCode,
    /// The next offset the partition will assign.
    pub high_water_mark: i64,
    pub records: MemoryRecords,
}

impl FetchResponse {
    pub fn encode(&self, correlation_id: i32) -> BytesMut {
        let mut body = BytesMut::new();
        write_array(&mut body, &self.topic_data, |buf, topic| {
            write_string16(buf, Some(&topic.topic));
            write_array(buf, &topic.partition_data, |buf, partition| {
                buf.put_i32(partition.partition);
                buf.put_i16(partition.error_code.as_i16());
                buf.put_i64(partition.high_water_mark);
                write_bytes32(buf, Some(partition.records.as_bytes()));
            });
        });
        frame_response(correlation_id, body)
    }

    pub fn decode_body(buffer: &mut BytesMut) -> AppResult<Self> {
        let topic_data = read_array(buffer, |buf| {
            let topic = require_string16(buf, "topic name")?;
            let partition_data = read_array(buf, |buf| {
                let partition = read_i32(buf)?;
                let error_code = ErrorCode::from_i16(read_i16(buf)?);
                let high_water_mark = read_i64(buf)?;
                let records = read_bytes32(buf)?.ok_or_else(|| {
                    AppError::MalformedProtocol("null record set in fetch response".into())
                })?;
                Ok(PartitionFetchResponse {
                    partition,
                    error_code,
                    high_water_mark,
                    records: MemoryRecords::new(records),
                })
            })?;
            Ok(TopicFetchResponse {
                topic,
                partition_data,
            })
        })?;
        Ok(Self { topic_data })
    }
}
