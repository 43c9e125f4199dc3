extern crate config as rs_config;

use std::path::Path;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::log::{INDEX_ENTRY_SIZE, MAX_SEGMENT_BYTES};
use crate::{AppError, AppResult};

pub static GLOBAL_CONFIG: OnceCell<BrokerConfig> = OnceCell::new();

pub fn global_config() -> &'static BrokerConfig {
    GLOBAL_CONFIG.get().expect("global config is not initialized")
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeneralConfig {
    /// node id of this broker within the chain
    pub id: i32,
    /// partitions created per topic by ensure_topic
    pub default_partitions: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    pub ip: String,
    pub port: u16,
    pub max_connection: usize,
    pub max_package_size: usize,
}

/// Configuration of the per-partition log engine.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LogConfig {
    /// Ordered list of base directories; one is selected per partition.
    pub log_dirs: Vec<String>,
    /// Soft cap on a segment's `.log` file. A batch that would push the file
    /// past this cap triggers a roll before the write.
    pub segment_bytes: u64,
    /// Cap on a segment's `.index` file.
    pub index_max_bytes: u64,
    /// Log bytes written between two sparse index entries.
    pub index_interval_bytes: u64,
    /// Upper bound applied to a fetch request's max_wait_ms.
    pub fetch_wait_max_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    pub general: GeneralConfig,
    pub network: NetworkConfig,
    pub log: LogConfig,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            id: 0,
            default_partitions: 1,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: 5588,
            max_connection: 1024,
            max_package_size: 4 * 1024 * 1024,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dirs: vec!["./data".to_string()],
            segment_bytes: MAX_SEGMENT_BYTES,
            index_max_bytes: 10 * 1024,
            index_interval_bytes: 4096,
            fetch_wait_max_ms: 500,
        }
    }
}

impl BrokerConfig {
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<BrokerConfig> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or_else(|| AppError::InvalidValue("config file path".into()))?;
        let config = rs_config::Config::builder()
            .add_source(rs_config::File::with_name(path_str))
            .build()?;

        let broker_config: BrokerConfig = config.try_deserialize()?;
        broker_config.validate()?;
        Ok(broker_config)
    }

    /// Refuses to start with a configuration the on-disk format cannot honor.
    ///
    /// The sparse index stores relative offsets and file positions as 24-bit
    /// signed integers, so `segment_bytes` must not exceed 2^23 - 1.
    pub fn validate(&self) -> AppResult<()> {
        self.log.validate()
    }
}

impl LogConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.log_dirs.is_empty() {
            return Err(AppError::InvalidValue("log_dirs must not be empty".into()));
        }
        if self.segment_bytes == 0 || self.segment_bytes > MAX_SEGMENT_BYTES {
            return Err(AppError::InvalidValue(format!(
                "segment_bytes {} outside (0, {}]",
                self.segment_bytes, MAX_SEGMENT_BYTES
            )));
        }
        if self.index_max_bytes < INDEX_ENTRY_SIZE as u64 {
            return Err(AppError::InvalidValue(format!(
                "index_max_bytes {} smaller than one index entry",
                self.index_max_bytes
            )));
        }
        if self.index_interval_bytes == 0 {
            return Err(AppError::InvalidValue(
                "index_interval_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(LogConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_segment_bytes_beyond_index_width() {
        let config = LogConfig {
            segment_bytes: MAX_SEGMENT_BYTES + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_undersized_index_cap() {
        let config = LogConfig {
            index_max_bytes: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
