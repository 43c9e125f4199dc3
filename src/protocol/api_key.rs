use crate::{AppError, AppResult};

/// Api key for the topics request; outside Kafka's assigned range so it can
/// never collide with a real Kafka api.
pub const TOPICS_API_KEY: i16 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKey {
    Produce,
    Fetch,
    Metadata,
    Topics,
}

impl ApiKey {
    pub fn as_i16(self) -> i16 {
        match self {
            ApiKey::Produce => 0,
            ApiKey::Fetch => 1,
            ApiKey::Metadata => 3,
            ApiKey::Topics => TOPICS_API_KEY,
        }
    }

    pub fn from_i16(value: i16) -> AppResult<Self> {
        match value {
            0 => Ok(ApiKey::Produce),
            1 => Ok(ApiKey::Fetch),
            3 => Ok(ApiKey::Metadata),
            TOPICS_API_KEY => Ok(ApiKey::Topics),
            other => Err(AppError::MalformedProtocol(format!(
                "unsupported api key {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_keys_round_trip() {
        for key in [ApiKey::Produce, ApiKey::Fetch, ApiKey::Metadata, ApiKey::Topics] {
            assert_eq!(ApiKey::from_i16(key.as_i16()).unwrap(), key);
        }
        assert!(ApiKey::from_i16(99).is_err());
    }
}
