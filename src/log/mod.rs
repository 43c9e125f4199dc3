//! The per-partition log engine.
//!
//! This module owns the on-disk representation (segment and index files),
//! the append/roll/recover state machine, and the offset-to-position fetch
//! path.

mod index_file;
mod log_manager;
mod partition_log;
mod segment;

pub use index_file::{ReadOnlyIndexFile, WritableIndexFile, INDEX_ENTRY_SIZE, MAX_SEGMENT_BYTES};
pub use log_manager::LogManager;
pub use partition_log::PartitionLog;
pub use segment::{
    index_file_name, log_file_name, parse_segment_file_name, ActiveSegment, SealedSegment,
    INDEX_FILE_SUFFIX, LOG_FILE_SUFFIX,
};

use crate::message::MemoryRecords;

/// Information about a completed log append.
#[derive(Debug, Clone, Copy)]
pub struct LogAppendInfo {
    /// Offset assigned to the first record of the batch.
    pub first_offset: i64,
    /// Number of records in the batch.
    pub records_count: u32,
}

/// Result of a fetch against one partition.
#[derive(Debug)]
pub struct LogFetchInfo {
    /// Whole records starting at the requested offset; possibly empty.
    pub records: MemoryRecords,
    /// The next offset the partition will assign.
    pub high_water_mark: i64,
}
