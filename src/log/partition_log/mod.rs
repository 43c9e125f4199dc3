//! Partition log: the single-writer state machine owning one partition's
//! segments.
//!
//! - `write.rs`: offset assignment, the roll-before-write predicate, append
//! - `read.rs`: sparse-index resolution and record streaming
//! - `load.rs`: directory scan, crash recovery, writer restore

mod load;
mod read;
mod write;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_utils::atomic::AtomicCell;
use parking_lot::{Mutex, RwLock};

use crate::log::segment::{ActiveSegment, SealedSegment};
use crate::message::TopicPartition;
use crate::service::LogConfig;
use crate::AppResult;

/// One partition's log.
///
/// Mutation is serialized through the partition's single writer task, which
/// is the only caller of [`PartitionLog::append`] and
/// [`PartitionLog::restore`]. Fetches run concurrently against the sealed
/// segment map and positional reads of the active `.log`.
///
/// Lock order is active before sealed, everywhere.
#[derive(Debug)]
pub struct PartitionLog {
    topic_partition: TopicPartition,
    dir: PathBuf,
    config: LogConfig,
    /// Sealed segments by base offset. Rolling registers the sealed segment
    /// here, which is how readers discover it.
    sealed: RwLock<BTreeMap<i64, Arc<SealedSegment>>>,
    active: Mutex<ActiveSegment>,
    /// Next offset to assign; equivalently the high-water mark.
    next_offset: AtomicCell<i64>,
}

impl PartitionLog {
    /// Opens a partition directory, recovering whatever is on disk.
    ///
    /// An empty or absent directory bootstraps a base-0 segment pair.
    pub fn recover(
        topic_partition: TopicPartition,
        dir: PathBuf,
        config: LogConfig,
    ) -> AppResult<Self> {
        std::fs::create_dir_all(&dir)?;
        let (sealed, active, next_offset) = Self::load_state(&dir, &config)?;
        Ok(Self {
            topic_partition,
            dir,
            config,
            sealed: RwLock::new(sealed),
            active: Mutex::new(active),
            next_offset: AtomicCell::new(next_offset),
        })
    }

    pub fn topic_partition(&self) -> &TopicPartition {
        &self.topic_partition
    }

    /// The next offset that will be assigned.
    pub fn high_water_mark(&self) -> i64 {
        self.next_offset.load()
    }

    /// Base offset of the earliest retained segment.
    pub fn log_start_offset(&self) -> i64 {
        let active_base = self.active.lock().base_offset();
        self.sealed
            .read()
            .keys()
            .next()
            .copied()
            .unwrap_or(active_base)
    }

    pub fn segment_count(&self) -> usize {
        self.sealed.read().len() + 1
    }

    pub fn flush(&self) -> AppResult<()> {
        self.active.lock().flush()
    }

    /// Flushes and releases the append handles. Called once on shutdown.
    pub fn close(&self) -> AppResult<()> {
        self.flush()
    }
}
