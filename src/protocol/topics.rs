use bytes::{BufMut, BytesMut};

use crate::protocol::primitives::{
    read_array, read_i16, read_i32, require_string16, write_array, write_string16,
};
use crate::protocol::request_header::RequestHeader;
use crate::protocol::{frame_request, frame_response, ApiKey, ErrorCode};
use crate::AppResult;

/// Asks for the replica chain of each named topic; empty means all.
#[derive(Debug)]
pub struct TopicsRequest {
    pub topics: Vec<String>,
}

impl TopicsRequest {
    pub fn decode(buffer: &mut BytesMut) -> AppResult<Self> {
        let topics = read_array(buffer, |buf| require_string16(buf, "topic name"))?;
        Ok(Self { topics })
    }

    pub fn encode(&self, correlation_id: i32, client_id: Option<&str>) -> BytesMut {
        let header = RequestHeader {
            api_key: ApiKey::Topics,
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
pub struct TopicsResponse {
    pub topics: Vec<TopicChain>,
}

/// One topic's replica chain, head first.
#[derive(Debug, PartialEq, Eq)]
pub struct TopicChain {
    pub topic: String,
    pub error_code: ErrorCode,
    pub chain: Vec<ChainNode>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ChainNode {
    pub host: String,
    pub port: i32,
}

impl TopicsResponse {
    pub fn encode(&self, correlation_id: i32) -> BytesMut {
        let mut body = BytesMut::new();
        write_array(&mut body, &self.topics, |buf, topic| {
            write_string16(buf, Some(&topic.topic));
            buf.put_i16(topic.error_code.as_i16());
            write_array(buf, &topic.chain, |buf, node| {
                write_string16(buf, Some(&node.host));
                buf.put_i32(node.port);
            });
        });
        frame_response(correlation_id, body)
    }

    pub fn decode_body(buffer: &mut BytesMut) -> AppResult<Self> {
        let topics = read_array(buffer, |buf| {
            let topic = require_string16(buf, "topic name")?;
            let error_code = ErrorCode::from_i16(read_i16(buf)?);
            let chain = read_array(buf, |buf| {
                Ok(ChainNode {
                    host: require_string16(buf, "chain host")?,
                    port: read_i32(buf)?,
                })
            })?;
            Ok(TopicChain {
                topic,
                error_code,
                chain,
            })
        })?;
        Ok(Self { topics })
    }
}
