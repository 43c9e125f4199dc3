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
pub struct ProduceRequest {
    pub acks: i16,
    pub timeout_ms: i32,
    pub topic_data: Vec<TopicProduceData>,
}

#[derive(Debug)]
pub struct TopicProduceData {
    pub topic: String,
    pub partition_data: Vec<PartitionProduceData>,
}

#[derive(Debug)]
pub struct PartitionProduceData {
    pub partition: i32,
    pub records: MemoryRecords,
}

impl ProduceRequest {
    pub fn decode(buffer: &mut BytesMut) -> AppResult<Self> {
        let acks = read_i16(buffer)?;
        let timeout_ms = read_i32(buffer)?;
        let topic_data = read_array(buffer, |buf| {
            let topic = require_string16(buf, "topic name")?;
            let partition_data = read_array(buf, |buf| {
                let partition = read_i32(buf)?;
                let records = read_bytes32(buf)?.ok_or_else(|| {
                    AppError::MalformedProtocol("null record set in produce".into())
                })?;
                Ok(PartitionProduceData {
                    partition,
                    records: MemoryRecords::new(records),
                })
            })?;
            Ok(TopicProduceData {
                topic,
                partition_data,
            })
        })?;
        Ok(Self {
            acks,
            timeout_ms,
            topic_data,
        })
    }

    pub fn encode(&self, correlation_id: i32, client_id: Option<&str>) -> BytesMut {
        let header = RequestHeader {
            api_key: ApiKey::Produce,
            api_version: 0,
            correlation_id,
            client_id: client_id.map(str::to_string),
        };
        let mut body = BytesMut::new();
        body.put_i16(self.acks);
        body.put_i32(self.timeout_ms);
        write_array(&mut body, &self.topic_data, |buf, topic| {
            write_string16(buf, Some(&topic.topic));
            write_array(buf, &topic.partition_data, |buf, partition| {
                buf.put_i32(partition.partition);
                write_bytes32(buf, Some(partition.records.as_bytes()));
            });
        });
        frame_request(&header, body)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ProduceResponse {
    pub topic_data: Vec<TopicProduceResponse>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TopicProduceResponse {
    pub topic: String,
    pub partition_data: Vec<PartitionProduceResponse>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct PartitionProduceResponse {
    pub partition: i32,
    pub error_code: ErrorCode,
    /// Offset assigned to the first record of the batch.
    pub offset: i64,
}

impl ProduceResponse {
    pub fn encode(&self, correlation_id: i32) -> BytesMut {
        let mut body = BytesMut::new();
        write_array(&mut body, &self.topic_data, |buf, topic| {
            write_string16(buf, Some(&topic.topic));
            write_array(buf, &topic.partition_data, |buf, partition| {
                buf.put_i32(partition.partition);
                buf.put_i16(partition.error_code.as_i16());
                buf.put_i64(partition.offset);
            });
        });
        frame_response(correlation_id, body)
    }

    pub fn decode_body(buffer: &mut BytesMut) -> AppResult<Self> {
        let topic_data = read_array(buffer, |buf| {
            let topic = require_string16(buf, "topic name")?;
            let partition_data = read_array(buf, |buf| {
                Ok(PartitionProduceResponse {
                    partition: read_i32(buf)?,
                    error_code: ErrorCode::from_i16(read_i16(buf)?),
                    offset: read_i64(buf)?,
                })
            })?;
            Ok(TopicProduceResponse {
                topic,
                partition_data,
            })
        })?;
        Ok(Self { topic_data })
    }
}
