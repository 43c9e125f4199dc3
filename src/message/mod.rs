//! Record framing and partition identity.
//!
//! A record on the wire and on disk is a 12-byte header
//! `{offset: i64 BE, size: i32 BE}` followed by `size` payload bytes.
//! A record set is a plain concatenation of such records with no padding.

mod records;
mod topic_partition;

pub use records::{MemoryRecords, Record, RecordIter, RECORD_HEADER_SIZE};
pub use topic_partition::TopicPartition;
