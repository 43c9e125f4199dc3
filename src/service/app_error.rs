use std::io;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// general errors
    #[error("illegal state: {0}")]
    IllegalStateError(String),

    #[error("malformed protocol: {0}")]
    MalformedProtocol(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    DetailedIoError(String),

    #[error("io error: {0}")]
    IoError(#[from] io::Error),

    #[error("channel send error: {0}")]
    ChannelSendError(String),

    #[error("channel recv error: {0}")]
    ChannelRecvError(String),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),

    #[error("tracing setup error: {0}")]
    TracingError(#[from] tracing::dispatcher::SetGlobalDefaultError),

    /// marker error: the frame buffer does not yet hold a complete frame
    #[error("incomplete frame")]
    Incomplete,

    /// protocol-visible errors, carried per partition in response slots
    #[error("corrupt message: {0}")]
    CorruptMessage(String),

    #[error("offset out of range: {0}")]
    OffsetOutOfRange(String),

    #[error("unknown topic or partition: {0}")]
    UnknownTopicOrPartition(String),

    #[error("not leader for partition: {0}")]
    NotLeaderForPartition(String),

    #[error("request timed out: {0}")]
    RequestTimedOut(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("index file is full")]
    IndexFileFull,
}

impl AppError {
    /// Fatal errors abort the partition writer; the writer re-runs recovery
    /// before servicing the next request.
    pub fn is_fatal_to_writer(&self) -> bool {
        matches!(
            self,
            AppError::IoError(_) | AppError::DetailedIoError(_) | AppError::IndexFileFull
        )
    }
}
