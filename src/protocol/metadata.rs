use bytes::{BufMut, BytesMut};

use crate::protocol::primitives::{
    read_array, read_i16, read_i32, require_string16, write_array, write_string16,
};
use crate::protocol::request_header::RequestHeader;
use crate::protocol::{frame_request, frame_response, ApiKey, ErrorCode};
use crate::AppResult;

/// An empty topic list asks for every known topic.
#[derive(Debug)]
pub struct MetadataRequest {
    pub topics: Vec<String>,
}

impl MetadataRequest {
    pub fn decode(buffer: &mut BytesMut) -> AppResult<Self> {
        let topics = read_array(buffer, |buf| require_string16(buf, "topic name"))?;
        Ok(Self { topics })
    }

    pub fn encode(&self, correlation_id: i32, client_id: Option<&str>) -> BytesMut {
        let header = RequestHeader {
            api_key: ApiKey::Metadata,
            api_version: 0,
            correlation_id,
            client_id: client_id.map(str::to_string),
        };
        let mut body = BytesMut::new();
        write_array(&mut body, &self.topics, |buf, topic| {
            write_string16(buf, Some(topic));
        });
        frame_request(&header, body)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct MetadataResponse {
    pub brokers: Vec<BrokerMetadata>,
    pub topics: Vec<TopicMetadata>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct BrokerMetadata {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TopicMetadata {
    pub error_code: ErrorCode,
    pub topic: String,
    pub partitions: Vec<PartitionMetadata>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub error_code: ErrorCode,
    pub partition: i32,
    pub leader: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

impl MetadataResponse {
    pub fn encode(&self, correlation_id: i32) -> BytesMut {
        let mut body = BytesMut::new();
        write_array(&mut body, &self.brokers, |buf, broker| {
            buf.put_i32(broker.node_id);
            write_string16(buf, Some(&broker.host));
            buf.put_i32(broker.port);
        });
        write_array(&mut body, &self.topics, |buf, topic| {
            buf.put_i16(topic.error_code.as_i16());
            write_string16(buf, Some(&topic.topic));
            write_array(buf, &topic.partitions, |buf, partition| {
                buf.put_i16(partition.error_code.as_i16());
                buf.put_i32(partition.partition);
                buf.put_i32(partition.leader);
                write_array(buf, &partition.replicas, |buf, id| buf.put_i32(*id));
                write_array(buf, &partition.isr, |buf, id| buf.put_i32(*id));
            });
        });
        frame_response(correlation_id, body)
    }

    pub fn decode_body(buffer: &mut BytesMut) -> AppResult<Self> {
        let brokers = read_array(buffer, |buf| {
            Ok(BrokerMetadata {
                node_id: read_i32(buf)?,
                host: require_string16(buf, "broker host")?,
                port: read_i32(buf)?,
            })
        })?;
        let topics = read_array(buffer, |buf| {
            let error_code = ErrorCode::from_i16(read_i16(buf)?);
            let topic = require_string16(buf, "topic name")?;
            let partitions = read_array(buf, |buf| {
                Ok(PartitionMetadata {
                    error_code: ErrorCode::from_i16(read_i16(buf)?),
                    partition: read_i32(buf)?,
                    leader: read_i32(buf)?,
                    replicas: read_array(buf, read_i32)?,
                    isr: read_array(buf, read_i32)?,
                })
            })?;
            Ok(TopicMetadata {
                error_code,
                topic,
                partitions,
            })
        })?;
        Ok(Self { brokers, topics })
    }
}
