use crate::AppError;

/// Kafka numeric error codes carried in per-partition response slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    None,
    OffsetOutOfRange,
    CorruptMessage,
    UnknownTopicOrPartition,
    NotLeaderForPartition,
    RequestTimedOut,
    Unknown,
}

impl ErrorCode {
    pub fn as_i16(self) -> i16 {
        match self {
            ErrorCode::None => 0,
            ErrorCode::OffsetOutOfRange => 1,
            ErrorCode::CorruptMessage => 2,
            ErrorCode::UnknownTopicOrPartition => 3,
            ErrorCode::NotLeaderForPartition => 6,
            ErrorCode::RequestTimedOut => 7,
            ErrorCode::Unknown => -1,
        }
    }

    pub fn from_i16(value: i16) -> Self {
        match value {
            0 => ErrorCode::None,
            1 => ErrorCode::OffsetOutOfRange,
            2 => ErrorCode::CorruptMessage,
            3 => ErrorCode::UnknownTopicOrPartition,
            6 => ErrorCode::NotLeaderForPartition,
            7 => ErrorCode::RequestTimedOut,
            _ => ErrorCode::Unknown,
        }
    }

    /// Maps an engine error to the code embedded in its response slot.
    pub fn from_error(error: &AppError) -> Self {
        match error {
            AppError::OffsetOutOfRange(_) => ErrorCode::OffsetOutOfRange,
            AppError::CorruptMessage(_) | AppError::InvalidRequest(_) => ErrorCode::CorruptMessage,
            AppError::UnknownTopicOrPartition(_) => ErrorCode::UnknownTopicOrPartition,
            AppError::NotLeaderForPartition(_) => ErrorCode::NotLeaderForPartition,
            AppError::RequestTimedOut(_) => ErrorCode::RequestTimedOut,
            _ => ErrorCode::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.as_i16())
    }
}
