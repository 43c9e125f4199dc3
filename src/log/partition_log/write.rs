use std::sync::Arc;

use parking_lot::MutexGuard;
use tracing::{debug, trace};

use crate::log::segment::ActiveSegment;
use crate::log::LogAppendInfo;
use crate::message::MemoryRecords;
use crate::{AppError, AppResult};

use super::PartitionLog;

impl PartitionLog {
    /// Appends a batch, assigning offsets `next, next+1, ...` to its records.
    ///
    /// Client-supplied offsets in the batch are overwritten; the engine's
    /// assignment always wins. Rolling happens before the write, so a batch
    /// is never split across segments.
    pub fn append(&self, mut records: MemoryRecords) -> AppResult<LogAppendInfo> {
        let records_count = records.validate()?;
        if records_count == 0 {
            return Err(AppError::InvalidRequest(format!(
                "empty record batch for {}",
                self.topic_partition
            )));
        }

        let first_offset = self.next_offset.load();
        records.assign_offsets(first_offset);
        let batch_size = records.size() as u64;

        let mut active = self.active.lock();
        if active.needs_roll(batch_size) {
            self.roll(&mut active, first_offset)?;
        }
        active.append(first_offset, &records)?;
        drop(active);

        self.next_offset.store(first_offset + records_count as i64);
        trace!(
            "appended {} records to {} at offset {}",
            records_count,
            self.topic_partition,
            first_offset
        );

        Ok(LogAppendInfo {
            first_offset,
            records_count,
        })
    }

    /// Seals the active segment and replaces it with a fresh one whose base
    /// offset is the offset about to be assigned.
    fn roll(&self, active: &mut MutexGuard<'_, ActiveSegment>, new_base: i64) -> AppResult<()> {
        let new_segment = ActiveSegment::create(&self.dir, new_base, &self.config)?;
        let old_segment = std::mem::replace(&mut **active, new_segment);
        let sealed = old_segment.seal()?;
        debug!(
            "rolled {} segment {} -> {}",
            self.topic_partition,
            sealed.base_offset(),
            new_base
        );
        self.sealed.write().insert(sealed.base_offset(), Arc::new(sealed));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::log::log_file_name;
    use crate::message::{MemoryRecords, TopicPartition};
    use crate::service::LogConfig;

    use super::*;
    use tempfile::tempdir;

    fn open_log(dir: &std::path::Path, config: LogConfig) -> PartitionLog {
        PartitionLog::recover(
            TopicPartition::new("topic", 0),
            dir.to_path_buf(),
            config,
        )
        .unwrap()
    }

    fn payloads(n: usize, size: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![b'a' + (i % 26) as u8; size]).collect()
    }

    #[test]
    fn offsets_are_dense_across_batches() {
        let dir = tempdir().unwrap();
        let log = open_log(dir.path(), LogConfig::default());

        let first = log
            .append(MemoryRecords::from_payloads(["a", "b", "c"]))
            .unwrap();
        let second = log.append(MemoryRecords::from_payloads(["d"])).unwrap();

        assert_eq!(first.first_offset, 0);
        assert_eq!(first.records_count, 3);
        assert_eq!(second.first_offset, 3);
        assert_eq!(log.high_water_mark(), 4);
    }

    #[test]
    fn rejects_empty_batch() {
        let dir = tempdir().unwrap();
        let log = open_log(dir.path(), LogConfig::default());
        assert!(matches!(
            log.append(MemoryRecords::empty()),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn rolls_before_write_when_segment_cap_reached() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            segment_bytes: 40,
            index_interval_bytes: 20,
            index_max_bytes: 1024,
            ..Default::default()
        };
        let log = open_log(dir.path(), config);

        // each record is 22 bytes on disk; a second record would push a
        // segment past the 40-byte cap, so every append after the first rolls
        for payload in payloads(4, 10) {
            log.append(MemoryRecords::from_payloads([payload])).unwrap();
        }

        let sealed = log.sealed.read();
        assert_eq!(sealed.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        drop(sealed);
        assert_eq!(log.active.lock().base_offset(), 3);
        assert_eq!(log.active.lock().size(), 22);
        assert_eq!(log.high_water_mark(), 4);
    }

    #[test]
    fn oversized_first_batch_lands_in_fresh_segment() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            segment_bytes: 40,
            index_interval_bytes: 1024,
            index_max_bytes: 1024,
            ..Default::default()
        };
        let log = open_log(dir.path(), config);

        // 110 bytes in one batch: written whole, pos after write equals s
        log.append(MemoryRecords::from_payloads(payloads(5, 10)))
            .unwrap();
        assert_eq!(log.segment_count(), 1);
        assert_eq!(log.active.lock().size(), 110);

        // the next batch rolls before the write
        log.append(MemoryRecords::from_payloads(payloads(1, 10)))
            .unwrap();
        assert_eq!(log.active.lock().base_offset(), 5);
        assert_eq!(log.active.lock().size(), 22);
    }

    #[test]
    fn rolls_when_index_cap_would_be_exceeded() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            segment_bytes: 8000,
            index_interval_bytes: 20,
            index_max_bytes: 12,
            ..Default::default()
        };
        let log = open_log(dir.path(), config);

        for payload in payloads(10, 10) {
            log.append(MemoryRecords::from_payloads([payload])).unwrap();
        }

        // every 22-byte batch writes an entry; the 12-byte cap holds two, so
        // the third forces a roll
        for base in log.sealed.read().keys() {
            let index = std::fs::metadata(
                crate::log::index_file_name(dir.path(), *base),
            )
            .unwrap();
            assert!(index.len() <= 12);
        }
        assert!(log.segment_count() > 1);
        assert_eq!(log.high_water_mark(), 10);
    }

    #[test]
    fn batch_straddling_cap_stays_whole() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            segment_bytes: 100,
            index_interval_bytes: 1024,
            index_max_bytes: 1024,
            ..Default::default()
        };
        let log = open_log(dir.path(), config);

        log.append(MemoryRecords::from_payloads(payloads(4, 10)))
            .unwrap();
        // 88 bytes in segment 0; the next 88-byte batch rolls first
        log.append(MemoryRecords::from_payloads(payloads(4, 10)))
            .unwrap();

        assert_eq!(log.active.lock().base_offset(), 4);
        assert_eq!(log.active.lock().size(), 88);
        let sealed_len =
            std::fs::metadata(log_file_name(dir.path(), 0)).unwrap().len();
        assert_eq!(sealed_len, 88);
    }
}
