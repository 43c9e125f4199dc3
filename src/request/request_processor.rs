use bytes::BytesMut;
use tracing::trace;

use crate::request::api::{
    FetchRequestHandler, MetadataRequestHandler, ProduceRequestHandler, TopicsRequestHandler,
};
use crate::request::{ApiRequest, RequestContext};

pub struct RequestProcessor;

impl RequestProcessor {
    /// Dispatches a decoded request and returns the encoded response frame.
    pub async fn process_request(request: ApiRequest, context: &RequestContext) -> BytesMut {
        trace!(
            "processing {:?} request from {} with correlation id {}",
            context.request_header.api_key,
            context.client_ip,
            context.request_header.correlation_id
        );
        let correlation_id = context.request_header.correlation_id;
        match request {
            ApiRequest::Produce(request) => ProduceRequestHandler
                .handle_request(request, context)
                .await
                .encode(correlation_id),
            ApiRequest::Fetch(request) => FetchRequestHandler
                .handle_request(request, context)
                .await
                .encode(correlation_id),
            ApiRequest::Metadata(request) => MetadataRequestHandler
                .handle_request(request, context)
                .await
                .encode(correlation_id),
            ApiRequest::Topics(request) => TopicsRequestHandler
                .handle_request(request, context)
                .await
                .encode(correlation_id),
        }
    }
}
