//! Client-side response decoding.
//!
//! A response frame does not name its api, so a client multiplexing
//! requests over one connection must remember which correlation id belongs
//! to which api to decode the body. Correlation ids increase monotonically
//! per connection, modulo 2^31.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use bytes::{Buf, BytesMut};

use crate::protocol::primitives::read_i32;
use crate::protocol::{
    ApiKey, FetchResponse, MetadataResponse, ProduceResponse, TopicsResponse,
};
use crate::{AppError, AppResult};

#[derive(Debug)]
pub enum ApiResponse {
    Produce(ProduceResponse),
    Fetch(FetchResponse),
    Metadata(MetadataResponse),
    Topics(TopicsResponse),
}

/// Allocates per-connection correlation ids, wrapping within `[0, 2^31)`.
#[derive(Debug, Default)]
pub struct CorrelationIdGenerator {
    next: AtomicI32,
}

impl CorrelationIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i32 {
        let mut prev = self.next.load(Ordering::Relaxed);
        loop {
            let id = prev;
            let following = if id == i32::MAX { 0 } else { id + 1 };
            match self.next.compare_exchange_weak(
                prev,
                following,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return id,
                Err(observed) => prev = observed,
            }
        }
    }
}

/// Incremental decoder for response frames on one connection.
#[derive(Debug, Default)]
pub struct ResponseDecoder {
    inflight: HashMap<i32, ApiKey>,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called when the request is sent; decoding a response whose
    /// correlation id was never registered is a protocol error.
    pub fn register(&mut self, correlation_id: i32, api_key: ApiKey) {
        self.inflight.insert(correlation_id, api_key);
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    /// Decodes the next response out of `buffer`.
    ///
    /// Returns `Ok(None)` when fewer bytes than a whole frame are buffered;
    /// on success the frame's bytes are consumed and any pipelined remainder
    /// stays in the buffer.
    pub fn decode(&mut self, buffer: &mut BytesMut) -> AppResult<Option<(i32, ApiResponse)>> {
        if buffer.remaining() < 4 {
            return Ok(None);
        }
        let size = i32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        if size < 4 {
            return Err(AppError::MalformedProtocol(format!(
                "response frame size {} below minimum",
                size
            )));
        }
        if buffer.remaining() < 4 + size as usize {
            buffer.reserve(4 + size as usize - buffer.remaining());
            return Ok(None);
        }

        buffer.advance(4);
        let mut body = buffer.split_to(size as usize);
        let correlation_id = read_i32(&mut body)?;
        let api_key = self.inflight.remove(&correlation_id).ok_or_else(|| {
            AppError::MalformedProtocol(format!(
                "response for unknown correlation id {}",
                correlation_id
            ))
        })?;

        let response = match api_key {
            ApiKey::Produce => ApiResponse::Produce(ProduceResponse::decode_body(&mut body)?),
            ApiKey::Fetch => ApiResponse::Fetch(FetchResponse::decode_body(&mut body)?),
            ApiKey::Metadata => ApiResponse::Metadata(MetadataResponse::decode_body(&mut body)?),
            ApiKey::Topics => ApiResponse::Topics(TopicsResponse::decode_body(&mut body)?),
        };
        Ok(Some((correlation_id, response)))
    }
}
