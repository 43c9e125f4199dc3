//! Log segments.
//!
//! A segment is a `.log`/`.index` file pair named by the zero-padded base
//! offset of its first record. Exactly one segment per partition is active;
//! the rest are sealed and immutable.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::log::index_file::{ReadOnlyIndexFile, WritableIndexFile};
#[cfg(test)]
use crate::log::index_file::INDEX_ENTRY_SIZE;
use crate::message::{MemoryRecords, RECORD_HEADER_SIZE};
use crate::service::LogConfig;
use crate::{AppError, AppResult};

pub const LOG_FILE_SUFFIX: &str = "log";
pub const INDEX_FILE_SUFFIX: &str = "index";

pub fn log_file_name(dir: impl AsRef<Path>, base_offset: i64) -> PathBuf {
    dir.as_ref()
        .join(format!("{:020}.{}", base_offset, LOG_FILE_SUFFIX))
}

pub fn index_file_name(dir: impl AsRef<Path>, base_offset: i64) -> PathBuf {
    dir.as_ref()
        .join(format!("{:020}.{}", base_offset, INDEX_FILE_SUFFIX))
}

/// Outcome of scanning an active segment during recovery.
#[derive(Debug)]
pub struct RecoveredSegment {
    pub segment: ActiveSegment,
    /// Next offset the partition will assign.
    pub next_offset: i64,
}

/// The one segment of a partition that is open for append.
///
/// Owned by the partition's single writer; all mutation goes through it.
#[derive(Debug)]
pub struct ActiveSegment {
    base_offset: i64,
    log_path: PathBuf,
    writer: BufWriter<File>,
    /// Write position in the `.log`, equal to its committed length.
    pos: u64,
    /// Log bytes appended since the last index entry.
    bytes_since_last_index_entry: u64,
    index: WritableIndexFile,
    segment_bytes: u64,
    index_interval_bytes: u64,
}

impl ActiveSegment {
    /// Creates a fresh segment pair starting at `base_offset`.
    pub fn create(dir: impl AsRef<Path>, base_offset: i64, config: &LogConfig) -> AppResult<Self> {
        let log_path = log_file_name(&dir, base_offset);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&log_path)?;
        let index = WritableIndexFile::open(
            index_file_name(&dir, base_offset),
            config.index_max_bytes,
        )?;
        debug!("created segment {}", log_path.display());
        Ok(Self {
            base_offset,
            log_path,
            writer: BufWriter::new(file),
            pos: 0,
            bytes_since_last_index_entry: 0,
            index,
            segment_bytes: config.segment_bytes,
            index_interval_bytes: config.index_interval_bytes,
        })
    }

    /// Reopens an existing segment for append, scanning the tail for torn
    /// records.
    ///
    /// The scan starts at the position named by the last index entry (or 0)
    /// and walks record headers forward. A truncated trailing record is cut
    /// off before the file is reopened for append. `byte_count` restarts at
    /// zero, which only delays the next index entry.
    pub fn recover(
        dir: impl AsRef<Path>,
        base_offset: i64,
        config: &LogConfig,
    ) -> AppResult<RecoveredSegment> {
        let log_path = log_file_name(&dir, base_offset);
        let index = WritableIndexFile::open(
            index_file_name(&dir, base_offset),
            config.index_max_bytes,
        )?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .open(&log_path)?;
        let file_len = file.metadata()?.len();

        // an index entry pointing past the log means the log lost data the
        // index still describes; fall back to a full scan
        let (rel_hint, pos_hint) = match index.last_entry() {
            Some((rel, pos)) if (pos as u64) <= file_len => (rel, pos),
            _ => (0, 0),
        };
        let (scan_end, last_offset) = scan_records(&mut file, pos_hint as u64, file_len)?;

        if scan_end < file_len {
            warn!(
                "truncating {} from {} to {} to drop a torn record",
                log_path.display(),
                file_len,
                scan_end
            );
            file.set_len(scan_end)?;
        }
        file.seek(SeekFrom::Start(scan_end))?;

        let next_offset = match last_offset {
            Some(last) => last + 1,
            // nothing readable past the hint: offsets before it are intact
            None => base_offset + rel_hint as i64,
        };

        Ok(RecoveredSegment {
            segment: Self {
                base_offset,
                log_path,
                writer: BufWriter::new(file),
                pos: scan_end,
                bytes_since_last_index_entry: 0,
                index,
                segment_bytes: config.segment_bytes,
                index_interval_bytes: config.index_interval_bytes,
            },
            next_offset,
        })
    }

    pub fn base_offset(&self) -> i64 {
        self.base_offset
    }

    pub fn size(&self) -> u64 {
        self.pos
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Roll-before-write predicate: true when the incoming batch would push
    /// the log past `segment_bytes`, or when it would force an index entry
    /// that no longer fits under `index_max_bytes`.
    ///
    /// An empty segment never rolls: a batch larger than `segment_bytes`
    /// still has to land somewhere, and rolling to the same base offset
    /// would recreate the files in place.
    pub fn needs_roll(&self, incoming_bytes: u64) -> bool {
        if self.pos == 0 {
            return false;
        }
        if self.pos + incoming_bytes > self.segment_bytes {
            return true;
        }
        self.bytes_since_last_index_entry + incoming_bytes >= self.index_interval_bytes
            && self.index.is_full()
    }

    /// Appends an offset-assigned batch whose first record is `first_offset`.
    ///
    /// At most one index entry is written per batch, pointing at the batch's
    /// first record.
    pub fn append(&mut self, first_offset: i64, records: &MemoryRecords) -> AppResult<()> {
        let pos_before = self.pos;
        self.writer.write_all(records.as_bytes())?;
        self.writer.flush()?;
        self.pos += records.size() as u64;
        self.bytes_since_last_index_entry += records.size() as u64;

        if self.bytes_since_last_index_entry >= self.index_interval_bytes {
            let rel = first_offset - self.base_offset;
            self.index.add_entry(rel as u32, pos_before as u32)?;
            self.bytes_since_last_index_entry = 0;
        }
        Ok(())
    }

    /// Largest indexed position at or before `offset`, or 0 with no hint.
    pub fn index_lookup(&self, offset: i64) -> u64 {
        if offset < self.base_offset {
            return 0;
        }
        self.index
            .lookup((offset - self.base_offset) as u32)
            .map(|(_, pos)| pos as u64)
            .unwrap_or(0)
    }

    pub fn flush(&mut self) -> AppResult<()> {
        self.writer.flush()?;
        self.index.flush()?;
        Ok(())
    }

    /// Closes the segment for writing and re-exposes it as a sealed segment.
    pub fn seal(mut self) -> AppResult<SealedSegment> {
        self.writer.flush()?;
        let index = self.index.into_readonly()?;
        Ok(SealedSegment {
            base_offset: self.base_offset,
            log_path: self.log_path,
            size: self.pos,
            index,
        })
    }
}

/// An immutable segment: its index is memory-mapped, its `.log` is read with
/// positional reads only.
#[derive(Debug)]
pub struct SealedSegment {
    base_offset: i64,
    log_path: PathBuf,
    size: u64,
    index: ReadOnlyIndexFile,
}

impl SealedSegment {
    pub fn open(dir: impl AsRef<Path>, base_offset: i64) -> AppResult<Self> {
        let log_path = log_file_name(&dir, base_offset);
        let size = std::fs::metadata(&log_path)?.len();
        let index = ReadOnlyIndexFile::open(index_file_name(&dir, base_offset))?;
        Ok(Self {
            base_offset,
            log_path,
            size,
            index,
        })
    }

    pub fn base_offset(&self) -> i64 {
        self.base_offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn index_lookup(&self, offset: i64) -> u64 {
        if offset < self.base_offset {
            return 0;
        }
        self.index
            .lookup((offset - self.base_offset) as u32)
            .map(|(_, pos)| pos as u64)
            .unwrap_or(0)
    }
}

/// Walks record headers from `start` and returns the byte position after the
/// last complete record together with that record's offset.
fn scan_records(file: &mut File, start: u64, file_len: u64) -> AppResult<(u64, Option<i64>)> {
    file.seek(SeekFrom::Start(start))?;
    let mut pos = start;
    let mut last_offset = None;
    let mut header = [0u8; RECORD_HEADER_SIZE];

    loop {
        if let Err(e) = file.read_exact(&mut header) {
            if e.kind() == ErrorKind::UnexpectedEof {
                return Ok((pos, last_offset));
            }
            return Err(e.into());
        }
        let offset = i64::from_be_bytes([
            header[0], header[1], header[2], header[3], header[4], header[5], header[6], header[7],
        ]);
        let size = i32::from_be_bytes([header[8], header[9], header[10], header[11]]);
        if size < 0 {
            return Err(AppError::CorruptMessage(format!(
                "negative record size {} at log position {}",
                size, pos
            )));
        }
        let record_end = pos + (RECORD_HEADER_SIZE + size as usize) as u64;
        if record_end > file_len {
            // torn payload
            return Ok((pos, last_offset));
        }
        file.seek(SeekFrom::Start(record_end))?;
        last_offset = Some(offset);
        pos = record_end;
    }
}

/// Parses `<base_offset>.<suffix>` segment file names.
pub fn parse_segment_file_name(name: &str) -> Option<(i64, &str)> {
    let (stem, suffix) = name.rsplit_once('.')?;
    let base_offset = stem.parse::<i64>().ok()?;
    Some((base_offset, suffix))
}
