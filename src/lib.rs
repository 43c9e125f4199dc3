pub mod cluster;
pub mod log;
pub mod message;
pub mod network;
pub mod protocol;
pub mod request;
pub mod service;

pub use cluster::ClusterManager;
pub use log::LogManager;
pub use service::{
    global_config, setup_tracing, AppError, AppResult, Broker, BrokerConfig, GeneralConfig,
    LogConfig, NetworkConfig, Node, Shutdown, GLOBAL_CONFIG,
};
