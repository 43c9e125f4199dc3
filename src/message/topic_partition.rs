use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Identity of one partition of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition {
    topic: String,
    partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Directory holding this partition's segments: `<base_dir>/<topic>-<partition>`.
    pub fn partition_dir(&self, base_dir: impl AsRef<Path>) -> PathBuf {
        base_dir.as_ref().join(format!("{}-{}", self.topic, self.partition))
    }

    /// Parses a partition directory name back into its identity.
    ///
    /// Topic names may themselves contain `-`; the partition number is the
    /// part after the last dash.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let (topic, partition) = name.rsplit_once('-')?;
        if topic.is_empty() {
            return None;
        }
        let partition = partition.parse::<i32>().ok()?;
        if partition < 0 {
            return None;
        }
        Some(Self::new(topic, partition))
    }
}

impl Display for TopicPartition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}
