use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::log::segment::{parse_segment_file_name, ActiveSegment, SealedSegment};
use crate::log::LOG_FILE_SUFFIX;
use crate::service::LogConfig;
use crate::{AppError, AppResult};

use super::PartitionLog;

impl PartitionLog {
    /// Scans a partition directory and rebuilds the in-memory state.
    ///
    /// The segment with the largest base offset becomes active and is
    /// tail-scanned for torn records; every earlier segment is opened
    /// sealed. An empty directory bootstraps a base-0 segment pair.
    pub(super) fn load_state(
        dir: &Path,
        config: &LogConfig,
    ) -> AppResult<(BTreeMap<i64, Arc<SealedSegment>>, ActiveSegment, i64)> {
        let bases = Self::scan_log_files(dir)?;

        let Some(active_base) = bases.last().copied() else {
            info!("no segments under {}, starting at offset 0", dir.display());
            let active = ActiveSegment::create(dir, 0, config)?;
            return Ok((BTreeMap::new(), active, 0));
        };

        let mut sealed = BTreeMap::new();
        for base in bases.iter().copied().filter(|b| *b != active_base) {
            sealed.insert(base, Arc::new(SealedSegment::open(dir, base)?));
        }

        let recovered = ActiveSegment::recover(dir, active_base, config)?;
        info!(
            "recovered {} with {} sealed segments, active base {}, next offset {}",
            dir.display(),
            sealed.len(),
            active_base,
            recovered.next_offset
        );
        Ok((sealed, recovered.segment, recovered.next_offset))
    }

    fn scan_log_files(dir: &Path) -> AppResult<BTreeSet<i64>> {
        let mut bases = BTreeSet::new();
        for entry in std::fs::read_dir(dir).map_err(|e| {
            AppError::DetailedIoError(format!("read partition dir {}: {}", dir.display(), e))
        })? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match parse_segment_file_name(&name) {
                Some((base_offset, LOG_FILE_SUFFIX)) => {
                    bases.insert(base_offset);
                }
                Some(_) => {}
                None => warn!("ignoring unrecognized file {} in {}", name, dir.display()),
            }
        }
        Ok(bases)
    }

    /// Drops the writer state and re-runs recovery in place.
    ///
    /// Called by the partition writer after a fatal append error; readers
    /// keep working against the swapped-in state.
    pub fn restore(&self) -> AppResult<()> {
        let mut active = self.active.lock();
        let (sealed, new_active, next_offset) = Self::load_state(&self.dir, &self.config)?;
        *active = new_active;
        *self.sealed.write() = sealed;
        self.next_offset.store(next_offset);
        warn!(
            "partition {} restored, next offset {}",
            self.topic_partition, next_offset
        );
        Ok(())
    }
}
