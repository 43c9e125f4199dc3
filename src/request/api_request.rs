use bytes::BytesMut;

use crate::protocol::{
    ApiKey, FetchRequest, MetadataRequest, ProduceRequest, RequestHeader, TopicsRequest,
};
use crate::AppResult;

#[derive(Debug)]
pub enum ApiRequest {
    Produce(ProduceRequest),
    Fetch(FetchRequest),
    Metadata(MetadataRequest),
    Topics(TopicsRequest),
}

impl ApiRequest {
    /// Decodes a frame body according to the header's api key.
    pub fn parse_from(header: &RequestHeader, body: &mut BytesMut) -> AppResult<ApiRequest> {
        match header.api_key {
            ApiKey::Produce => Ok(ApiRequest::Produce(ProduceRequest::decode(body)?)),
            ApiKey::Fetch => Ok(ApiRequest::Fetch(FetchRequest::decode(body)?)),
            ApiKey::Metadata => Ok(ApiRequest::Metadata(MetadataRequest::decode(body)?)),
            ApiKey::Topics => Ok(ApiRequest::Topics(TopicsRequest::decode(body)?)),
        }
    }
}
