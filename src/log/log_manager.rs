//! Process-wide registry of partition logs.
//!
//! Each partition is owned by exactly one writer task consuming a bounded
//! queue of append requests; appends are serviced strictly in FIFO order.
//! Fetches bypass the queue and read concurrently.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::log::{LogAppendInfo, LogFetchInfo, PartitionLog};
use crate::message::{MemoryRecords, TopicPartition};
use crate::service::LogConfig;
use crate::{AppError, AppResult};

const APPEND_QUEUE_CAPACITY: usize = 128;

struct AppendTask {
    records: MemoryRecords,
    reply: oneshot::Sender<AppResult<LogAppendInfo>>,
}

struct PartitionHandle {
    log: Arc<PartitionLog>,
    append_tx: mpsc::Sender<AppendTask>,
}

#[derive(Debug)]
pub struct LogManager {
    config: LogConfig,
    partitions: DashMap<TopicPartition, PartitionHandle>,
}

impl std::fmt::Debug for PartitionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionHandle")
            .field("partition", self.log.topic_partition())
            .finish()
    }
}

impl LogManager {
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            partitions: DashMap::new(),
        }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Builds the manager and recovers every partition directory found under
    /// the configured log dirs, so a restarted broker serves its existing
    /// data without waiting for metadata traffic.
    pub fn startup(config: LogConfig) -> AppResult<Self> {
        config.validate()?;
        let manager = Self::new(config);
        for base_dir in manager.config.log_dirs.clone() {
            let base = PathBuf::from(&base_dir);
            if !base.exists() {
                std::fs::create_dir_all(&base)?;
                continue;
            }
            for entry in std::fs::read_dir(&base)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                match TopicPartition::from_dir_name(&name) {
                    // recover in place: the dir a partition was found in wins
                    // over the one the hash would pick today
                    Some(tp) => {
                        manager.open_partition_at(tp, entry.path())?;
                    }
                    None => warn!("ignoring directory {} under {}", name, base_dir),
                }
            }
        }
        info!(
            "log manager started with {} partitions",
            manager.partitions.len()
        );
        Ok(manager)
    }

    /// Directory assigned to a partition: stable hash over the configured
    /// log dirs.
    pub fn partition_dir(&self, topic_partition: &TopicPartition) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        topic_partition.hash(&mut hasher);
        let index = (hasher.finish() % self.config.log_dirs.len() as u64) as usize;
        topic_partition.partition_dir(&self.config.log_dirs[index])
    }

    fn open_partition(&self, topic_partition: TopicPartition) -> AppResult<()> {
        let dir = self.partition_dir(&topic_partition);
        self.open_partition_at(topic_partition, dir)
    }

    fn open_partition_at(&self, topic_partition: TopicPartition, dir: PathBuf) -> AppResult<()> {
        if self.partitions.contains_key(&topic_partition) {
            return Ok(());
        }
        let log = Arc::new(PartitionLog::recover(
            topic_partition.clone(),
            dir,
            self.config.clone(),
        )?);
        let append_tx = Self::spawn_writer(log.clone());
        self.partitions
            .insert(topic_partition, PartitionHandle { log, append_tx });
        Ok(())
    }

    /// The partition's single writer. Services appends in arrival order; a
    /// fatal error drops the writer state and re-runs recovery before the
    /// next request, mirroring a supervisor restart.
    fn spawn_writer(log: Arc<PartitionLog>) -> mpsc::Sender<AppendTask> {
        let (tx, mut rx) = mpsc::channel::<AppendTask>(APPEND_QUEUE_CAPACITY);
        tokio::spawn(async move {
            let partition = log.topic_partition().clone();
            while let Some(task) = rx.recv().await {
                let result = log.append(task.records);
                let fatal = result
                    .as_ref()
                    .err()
                    .map(AppError::is_fatal_to_writer)
                    .unwrap_or(false);
                if task.reply.send(result).is_err() {
                    warn!("append reply for {} dropped by caller", partition);
                }
                if fatal {
                    error!("partition {} writer hit a fatal error, recovering", partition);
                    if let Err(e) = log.restore() {
                        error!("recovery of {} failed: {}, writer exits", partition, e);
                        break;
                    }
                }
            }
            debug!("partition {} writer exited", partition);
        });
        tx
    }

    /// Creates the partition directory and spawns its writer if absent.
    pub fn ensure_topic_partition(&self, topic_partition: &TopicPartition) -> AppResult<bool> {
        if self.partitions.contains_key(topic_partition) {
            return Ok(false);
        }
        self.open_partition(topic_partition.clone())?;
        info!("created partition {}", topic_partition);
        Ok(true)
    }

    pub fn has_partition(&self, topic_partition: &TopicPartition) -> bool {
        self.partitions.contains_key(topic_partition)
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.partitions.iter().any(|e| e.key().topic() == topic)
    }

    /// All known topics, sorted and deduplicated.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .partitions
            .iter()
            .map(|e| e.key().topic().to_string())
            .collect();
        topics.sort();
        topics.dedup();
        topics
    }

    pub fn partitions_of(&self, topic: &str) -> Vec<i32> {
        let mut partitions: Vec<i32> = self
            .partitions
            .iter()
            .filter(|e| e.key().topic() == topic)
            .map(|e| e.key().partition())
            .collect();
        partitions.sort_unstable();
        partitions
    }

    /// Enqueues a batch on the partition's writer and awaits the assigned
    /// first offset.
    pub async fn append_records(
        &self,
        topic_partition: &TopicPartition,
        records: MemoryRecords,
    ) -> AppResult<LogAppendInfo> {
        let append_tx = {
            let handle = self.partitions.get(topic_partition).ok_or_else(|| {
                AppError::UnknownTopicOrPartition(topic_partition.to_string())
            })?;
            handle.append_tx.clone()
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        append_tx
            .send(AppendTask {
                records,
                reply: reply_tx,
            })
            .await
            .map_err(|e| AppError::ChannelSendError(format!("partition writer queue: {}", e)))?;
        reply_rx
            .await
            .map_err(|e| AppError::ChannelRecvError(format!("partition writer reply: {}", e)))?
    }

    pub async fn read_records(
        &self,
        topic_partition: &TopicPartition,
        start_offset: i64,
        max_bytes: i32,
    ) -> AppResult<LogFetchInfo> {
        let log = {
            let handle = self.partitions.get(topic_partition).ok_or_else(|| {
                AppError::UnknownTopicOrPartition(topic_partition.to_string())
            })?;
            handle.log.clone()
        };
        log.read_records(start_offset, max_bytes).await
    }

    pub fn high_water_mark(&self, topic_partition: &TopicPartition) -> Option<i64> {
        self.partitions
            .get(topic_partition)
            .map(|h| h.log.high_water_mark())
    }

    /// Flushes and closes every partition. The registry is drained so writer
    /// tasks finish once their queues empty.
    pub fn close_all(&self) -> AppResult<()> {
        let mut first_error = None;
        for entry in self.partitions.iter() {
            if let Err(e) = entry.log.close() {
                error!("closing {} failed: {}", entry.log.topic_partition(), e);
                first_error.get_or_insert(e);
            }
        }
        self.partitions.clear();
        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> LogConfig {
        LogConfig {
            log_dirs: vec![dir.to_string_lossy().to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ensure_then_append_and_fetch() {
        let dir = tempdir().unwrap();
        let manager = LogManager::startup(test_config(dir.path())).unwrap();
        let tp = TopicPartition::new("events", 0);

        assert!(manager.ensure_topic_partition(&tp).unwrap());
        assert!(!manager.ensure_topic_partition(&tp).unwrap());

        let info = manager
            .append_records(&tp, MemoryRecords::from_payloads(["x", "y"]))
            .await
            .unwrap();
        assert_eq!(info.first_offset, 0);

        let fetched = manager.read_records(&tp, 0, 0).await.unwrap();
        assert_eq!(fetched.records.records().count(), 2);
        assert_eq!(manager.high_water_mark(&tp), Some(2));
    }

    #[tokio::test]
    async fn unknown_partition_is_not_auto_created() {
        let dir = tempdir().unwrap();
        let manager = LogManager::startup(test_config(dir.path())).unwrap();
        let tp = TopicPartition::new("ghost", 1);

        let result = manager
            .append_records(&tp, MemoryRecords::from_payloads(["x"]))
            .await;
        assert!(matches!(
            result,
            Err(AppError::UnknownTopicOrPartition(_))
        ));
        assert!(!manager.has_partition(&tp));
    }

    #[tokio::test]
    async fn startup_discovers_existing_partitions() {
        let dir = tempdir().unwrap();
        let tp = TopicPartition::new("events", 0);
        {
            let manager = LogManager::startup(test_config(dir.path())).unwrap();
            manager.ensure_topic_partition(&tp).unwrap();
            manager
                .append_records(&tp, MemoryRecords::from_payloads(["a", "b", "c"]))
                .await
                .unwrap();
            manager.close_all().unwrap();
        }

        let manager = LogManager::startup(test_config(dir.path())).unwrap();
        assert!(manager.has_partition(&tp));
        assert_eq!(manager.high_water_mark(&tp), Some(3));
        assert_eq!(manager.topics(), vec!["events".to_string()]);
        assert_eq!(manager.partitions_of("events"), vec![0]);
    }

    #[tokio::test]
    async fn appends_on_one_partition_are_serialized() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(LogManager::startup(test_config(dir.path())).unwrap());
        let tp = TopicPartition::new("serial", 0);
        manager.ensure_topic_partition(&tp).unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let manager = manager.clone();
            let tp = tp.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .append_records(&tp, MemoryRecords::from_payloads(["r"]))
                    .await
                    .unwrap()
                    .first_offset
            }));
        }
        let mut offsets = Vec::new();
        for handle in handles {
            offsets.push(handle.await.unwrap());
        }
        offsets.sort_unstable();
        assert_eq!(offsets, (0..10).collect::<Vec<i64>>());
        assert_eq!(manager.high_water_mark(&tp), Some(10));
    }
}
