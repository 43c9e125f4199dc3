//! Sparse offset index files.
//!
//! An index file is a flat sequence of 6-byte entries
//! `{rel_offset: i24 BE, file_pos: i24 BE}`, both signed. Entries strictly
//! increase in both fields. The file is append-only; the active segment's
//! index keeps an in-memory mirror for lookups, sealed indexes are
//! memory-mapped read-only.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, warn};

use crate::{AppError, AppResult};

pub const INDEX_ENTRY_SIZE: usize = 6;

/// Largest value a 24-bit signed field can carry; also the cap this format
/// imposes on `segment_bytes`.
pub const MAX_SEGMENT_BYTES: u64 = (1 << 23) - 1;

fn encode_i24(value: u32) -> [u8; 3] {
    [(value >> 16) as u8, (value >> 8) as u8, value as u8]
}

fn get_u24(buf: &[u8]) -> u32 {
    ((buf[0] as u32) << 16) | ((buf[1] as u32) << 8) | buf[2] as u32
}

fn check_i24(name: &str, value: u32) -> AppResult<()> {
    if u64::from(value) > MAX_SEGMENT_BYTES {
        return Err(AppError::IllegalStateError(format!(
            "{} {} exceeds 24-bit index field",
            name, value
        )));
    }
    Ok(())
}

/// Binary search for the last entry with `rel_offset <= target`.
///
/// `read` maps an entry index to its `(rel_offset, file_pos)` pair.
fn search_floor(entries: usize, target: u32, read: impl Fn(usize) -> (u32, u32)) -> Option<(u32, u32)> {
    if entries == 0 {
        return None;
    }
    let (first_rel, _) = read(0);
    if first_rel > target {
        return None;
    }
    let mut low = 0usize;
    let mut high = entries - 1;
    while low < high {
        let mid = (low + high + 1) / 2;
        let (rel, _) = read(mid);
        if rel <= target {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    Some(read(low))
}

/// The active segment's index: append-only file plus an in-memory mirror.
#[derive(Debug)]
pub struct WritableIndexFile {
    path: PathBuf,
    file: File,
    entries: Vec<(u32, u32)>,
    max_bytes: u64,
}

impl WritableIndexFile {
    /// Opens (or creates) an index file and loads any existing entries.
    ///
    /// A trailing partial entry left by a crash is truncated away.
    pub fn open<P: AsRef<Path>>(path: P, max_bytes: u64) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;
        let whole = raw.len() - raw.len() % INDEX_ENTRY_SIZE;
        if whole != raw.len() {
            warn!(
                "index file {} has {} trailing bytes, truncating",
                path.display(),
                raw.len() - whole
            );
            file.set_len(whole as u64)?;
            file.seek(SeekFrom::Start(whole as u64))?;
        }

        let entries = raw[..whole]
            .chunks_exact(INDEX_ENTRY_SIZE)
            .map(|chunk| (get_u24(&chunk[0..3]), get_u24(&chunk[3..6])))
            .collect::<Vec<_>>();
        debug!("opened index {} with {} entries", path.display(), entries.len());

        Ok(Self {
            path,
            file,
            entries,
            max_bytes,
        })
    }

    pub fn add_entry(&mut self, rel_offset: u32, file_pos: u32) -> AppResult<()> {
        if self.is_full() {
            return Err(AppError::IndexFileFull);
        }
        check_i24("relative offset", rel_offset)?;
        check_i24("file position", file_pos)?;

        let mut entry = [0u8; INDEX_ENTRY_SIZE];
        entry[0..3].copy_from_slice(&encode_i24(rel_offset));
        entry[3..6].copy_from_slice(&encode_i24(file_pos));
        self.file.write_all(&entry)?;
        self.entries.push((rel_offset, file_pos));
        Ok(())
    }

    /// True once the next entry would push the file past its cap.
    pub fn is_full(&self) -> bool {
        (self.entries.len() + 1) * INDEX_ENTRY_SIZE > self.max_bytes as usize
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn size_bytes(&self) -> u64 {
        (self.entries.len() * INDEX_ENTRY_SIZE) as u64
    }

    pub fn last_entry(&self) -> Option<(u32, u32)> {
        self.entries.last().copied()
    }

    /// Last entry with `rel_offset <= target`, or `None` if the index is
    /// empty or starts past the target.
    pub fn lookup(&self, target: u32) -> Option<(u32, u32)> {
        search_floor(self.entries.len(), target, |i| self.entries[i])
    }

    pub fn flush(&mut self) -> AppResult<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Seals the index: flushes and reopens it as a read-only map.
    pub fn into_readonly(mut self) -> AppResult<ReadOnlyIndexFile> {
        self.file.flush()?;
        let path = self.path.clone();
        drop(self);
        ReadOnlyIndexFile::open(path)
    }
}

/// A sealed segment's index, memory-mapped for concurrent lookups.
#[derive(Debug)]
pub struct ReadOnlyIndexFile {
    // None for an absent or empty index file; lookups then report no hint.
    mmap: Option<Mmap>,
    entries: usize,
}

impl ReadOnlyIndexFile {
    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self {
                mmap: None,
                entries: 0,
            });
        }
        let file = File::open(path)?;
        let len = file.metadata()?.len() as usize;
        if len < INDEX_ENTRY_SIZE {
            return Ok(Self {
                mmap: None,
                entries: 0,
            });
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            entries: len / INDEX_ENTRY_SIZE,
            mmap: Some(mmap),
        })
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    pub fn lookup(&self, target: u32) -> Option<(u32, u32)> {
        let mmap = self.mmap.as_ref()?;
        search_floor(self.entries, target, |i| {
            let at = i * INDEX_ENTRY_SIZE;
            (get_u24(&mmap[at..at + 3]), get_u24(&mmap[at + 3..at + 6]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[test]
    fn i24_round_trip() {
        for value in [0u32, 1, 255, 65_535, (1 << 23) - 1] {
            assert_eq!(get_u24(&encode_i24(value)), value);
        }
    }

    #[test]
    fn add_entry_rejects_out_of_range_fields() {
        let dir = tempdir().unwrap();
        let mut index = WritableIndexFile::open(dir.path().join("0.index"), 1024).unwrap();
        assert!(index.add_entry(1 << 23, 0).is_err());
        assert!(index.add_entry(0, 1 << 23).is_err());
    }

    #[rstest]
    #[case(0, None)]
    #[case(9, None)]
    #[case(10, Some((10, 100)))]
    #[case(25, Some((20, 200)))]
    #[case(30, Some((30, 300)))]
    #[case(1000, Some((30, 300)))]
    fn lookup_returns_floor_entry(#[case] target: u32, #[case] expected: Option<(u32, u32)>) {
        let dir = tempdir().unwrap();
        let mut index = WritableIndexFile::open(dir.path().join("0.index"), 1024).unwrap();
        index.add_entry(10, 100).unwrap();
        index.add_entry(20, 200).unwrap();
        index.add_entry(30, 300).unwrap();
        assert_eq!(index.lookup(target), expected);
    }

    #[test]
    fn full_index_rejects_entries() {
        let dir = tempdir().unwrap();
        let mut index =
            WritableIndexFile::open(dir.path().join("0.index"), 2 * INDEX_ENTRY_SIZE as u64)
                .unwrap();
        index.add_entry(1, 10).unwrap();
        assert!(!index.is_full());
        index.add_entry(2, 20).unwrap();
        assert!(index.is_full());
        assert!(matches!(index.add_entry(3, 30), Err(AppError::IndexFileFull)));
    }

    #[test]
    fn reopen_recovers_entries_and_truncates_partial_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.index");
        {
            let mut index = WritableIndexFile::open(&path, 1024).unwrap();
            index.add_entry(5, 50).unwrap();
            index.add_entry(8, 80).unwrap();
        }
        // simulate a crash mid-entry
        let file = OpenOptions::new().append(true).open(&path).unwrap();
        (&file).write_all(&[0xde, 0xad]).unwrap();
        drop(file);

        let index = WritableIndexFile::open(&path, 1024).unwrap();
        assert_eq!(index.entry_count(), 2);
        assert_eq!(index.last_entry(), Some((8, 80)));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 12);
    }

    #[test]
    fn sealed_index_preserves_lookups() {
        let dir = tempdir().unwrap();
        let mut index = WritableIndexFile::open(dir.path().join("0.index"), 1024).unwrap();
        index.add_entry(4, 40).unwrap();
        index.add_entry(9, 90).unwrap();

        let sealed = index.into_readonly().unwrap();
        assert_eq!(sealed.entry_count(), 2);
        assert_eq!(sealed.lookup(4), Some((4, 40)));
        assert_eq!(sealed.lookup(7), Some((4, 40)));
        assert_eq!(sealed.lookup(100), Some((9, 90)));
        assert_eq!(sealed.lookup(3), None);
    }

    #[test]
    fn absent_index_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let sealed = ReadOnlyIndexFile::open(dir.path().join("missing.index")).unwrap();
        assert_eq!(sealed.entry_count(), 0);
        assert_eq!(sealed.lookup(0), None);
    }
}
