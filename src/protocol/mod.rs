//! Kafka-style wire protocol.
//!
//! Frames are `{size: i32 BE}{payload}`. A request payload starts with the
//! request header, a response payload with the correlation id. All integers
//! are big-endian; `string16` is `{len: i16}{bytes}` and `bytes32` is
//! `{len: i32}{bytes}`, negative lengths denoting null.

mod api_key;
mod error_code;
mod fetch;
mod metadata;
mod primitives;
mod produce;
mod request_header;
mod response;
mod topics;

pub use api_key::{ApiKey, TOPICS_API_KEY};
pub use error_code::ErrorCode;
pub use fetch::{
    FetchRequest, FetchResponse, PartitionFetchData, PartitionFetchResponse, TopicFetchData,
    TopicFetchResponse,
};
pub use metadata::{
    BrokerMetadata, MetadataRequest, MetadataResponse, PartitionMetadata, TopicMetadata,
};
pub use primitives::{
    read_array, read_bytes32, read_i16, read_i32, read_i64, read_string16, require_string16,
    write_array, write_bytes32, write_string16,
};
pub use produce::{
    PartitionProduceData, PartitionProduceResponse, ProduceRequest, ProduceResponse,
    TopicProduceData, TopicProduceResponse,
};
pub use request_header::RequestHeader;
pub use response::{ApiResponse, CorrelationIdGenerator, ResponseDecoder};
pub use topics::{ChainNode, TopicChain, TopicsRequest, TopicsResponse};

use bytes::{BufMut, BytesMut};

/// Wraps an encoded response body (correlation id included) in a size frame.
pub(crate) fn frame_response(correlation_id: i32, body: BytesMut) -> BytesMut {
    let mut out = BytesMut::with_capacity(8 + body.len());
    out.put_i32(4 + body.len() as i32);
    out.put_i32(correlation_id);
    out.extend_from_slice(&body);
    out
}

/// Wraps a request header and body in a size frame.
pub(crate) fn frame_request(header: &RequestHeader, body: BytesMut) -> BytesMut {
    let mut payload = BytesMut::new();
    header.write_to(&mut payload);
    payload.extend_from_slice(&body);

    let mut out = BytesMut::with_capacity(4 + payload.len());
    out.put_i32(payload.len() as i32);
    out.extend_from_slice(&payload);
    out
}
