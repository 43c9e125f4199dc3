use bytes::{BufMut, BytesMut};

use crate::protocol::primitives::{read_i16, read_i32, read_string16, write_string16};
use crate::protocol::ApiKey;
use crate::AppResult;

/// `{api_key: i16}{api_version: i16}{correlation_id: i32}{client_id: string16}`
#[derive(Debug, Clone)]
pub struct RequestHeader {
    pub api_key: ApiKey,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

impl RequestHeader {
    pub fn new(api_key: ApiKey, correlation_id: i32, client_id: Option<String>) -> Self {
        Self {
            api_key,
            api_version: 0,
            correlation_id,
            client_id,
        }
    }

    pub fn read_from(buffer: &mut BytesMut) -> AppResult<Self> {
        let api_key = ApiKey::from_i16(read_i16(buffer)?)?;
        let api_version = read_i16(buffer)?;
        let correlation_id = read_i32(buffer)?;
        let client_id = read_string16(buffer)?;
        Ok(Self {
            api_key,
            api_version,
            correlation_id,
            client_id,
        })
    }

    pub fn write_to(&self, buffer: &mut BytesMut) {
        buffer.put_i16(self.api_key.as_i16());
        buffer.put_i16(self.api_version);
        buffer.put_i32(self.correlation_id);
        write_string16(buffer, self.client_id.as_deref());
    }
}
