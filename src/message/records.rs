use bytes::{BufMut, Bytes, BytesMut};

use crate::{AppError, AppResult};

/// `{offset: i64}{size: i32}`, both big-endian.
pub const RECORD_HEADER_SIZE: usize = 12;

/// A view of one record inside a record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub offset: i64,
    pub payload: &'a [u8],
}

/// A framed, contiguous sequence of records backed by a single buffer.
///
/// The same representation travels over the wire (produce/fetch record sets)
/// and lands on disk (`.log` segment contents), so no re-framing happens
/// between the codec and the log engine.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MemoryRecords {
    pub(crate) buffer: BytesMut,
}

impl std::fmt::Debug for MemoryRecords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRecords")
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

impl MemoryRecords {
    pub fn new(buffer: BytesMut) -> Self {
        Self { buffer }
    }

    pub fn empty() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Frames payloads into a record set. Offsets are written as zero and are
    /// expected to be overwritten by [`MemoryRecords::assign_offsets`]; the
    /// engine never trusts client-supplied offsets.
    pub fn from_payloads<I, B>(payloads: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut buffer = BytesMut::new();
        for payload in payloads {
            let payload = payload.as_ref();
            buffer.put_i64(0);
            buffer.put_i32(payload.len() as i32);
            buffer.put_slice(payload);
        }
        Self { buffer }
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Walks the framing and returns the record count.
    ///
    /// Errors with `CorruptMessage` on a negative size field or a record that
    /// claims more bytes than the buffer holds.
    pub fn validate(&self) -> AppResult<u32> {
        let buf = &self.buffer[..];
        let mut pos = 0usize;
        let mut count = 0u32;
        while pos < buf.len() {
            if pos + RECORD_HEADER_SIZE > buf.len() {
                return Err(AppError::CorruptMessage(format!(
                    "truncated record header at byte {}",
                    pos
                )));
            }
            let size = read_i32(buf, pos + 8);
            if size < 0 {
                return Err(AppError::CorruptMessage(format!(
                    "negative record size {} at byte {}",
                    size, pos
                )));
            }
            let end = pos + RECORD_HEADER_SIZE + size as usize;
            if end > buf.len() {
                return Err(AppError::CorruptMessage(format!(
                    "record at byte {} claims {} payload bytes, {} available",
                    pos,
                    size,
                    buf.len() - pos - RECORD_HEADER_SIZE
                )));
            }
            pos = end;
            count += 1;
        }
        Ok(count)
    }

    /// Restamps every record's offset field with `first, first+1, ...` and
    /// returns the record count. The buffer must already be validated.
    pub fn assign_offsets(&mut self, first: i64) -> u32 {
        let buf = &mut self.buffer[..];
        let mut pos = 0usize;
        let mut count = 0u32;
        while pos + RECORD_HEADER_SIZE <= buf.len() {
            let offset = first + count as i64;
            buf[pos..pos + 8].copy_from_slice(&offset.to_be_bytes());
            let size = read_i32(buf, pos + 8);
            pos += RECORD_HEADER_SIZE + size.max(0) as usize;
            count += 1;
        }
        count
    }

    pub fn records(&self) -> RecordIter<'_> {
        RecordIter {
            buf: &self.buffer,
            pos: 0,
        }
    }

    pub fn first_offset(&self) -> Option<i64> {
        if self.buffer.len() >= 8 {
            Some(read_i64(&self.buffer, 0))
        } else {
            None
        }
    }
}

fn read_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_i64(buf: &[u8], at: usize) -> i64 {
    i64::from_be_bytes([
        buf[at],
        buf[at + 1],
        buf[at + 2],
        buf[at + 3],
        buf[at + 4],
        buf[at + 5],
        buf[at + 6],
        buf[at + 7],
    ])
}

/// Iterates complete records; stops at the first truncated one.
pub struct RecordIter<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + RECORD_HEADER_SIZE > self.buf.len() {
            return None;
        }
        let offset = read_i64(self.buf, self.pos);
        let size = read_i32(self.buf, self.pos + 8);
        if size < 0 {
            return None;
        }
        let start = self.pos + RECORD_HEADER_SIZE;
        let end = start + size as usize;
        if end > self.buf.len() {
            return None;
        }
        self.pos = end;
        Some(Record {
            offset,
            payload: &self.buf[start..end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_assign_and_iterate() {
        let mut records = MemoryRecords::from_payloads(["a", "bb", "ccc"]);
        assert_eq!(records.validate().unwrap(), 3);
        assert_eq!(records.assign_offsets(7), 3);

        let collected: Vec<_> = records.records().collect();
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0].offset, 7);
        assert_eq!(collected[0].payload, b"a");
        assert_eq!(collected[2].offset, 9);
        assert_eq!(collected[2].payload, b"ccc");
        assert_eq!(records.size(), 3 * RECORD_HEADER_SIZE + 6);
    }

    #[test]
    fn engine_offsets_overwrite_client_offsets() {
        let mut buffer = BytesMut::new();
        buffer.put_i64(12345);
        buffer.put_i32(2);
        buffer.put_slice(b"hi");
        let mut records = MemoryRecords::new(buffer);

        records.assign_offsets(0);
        assert_eq!(records.records().next().unwrap().offset, 0);
    }

    #[test]
    fn validate_rejects_truncated_payload() {
        let mut buffer = BytesMut::new();
        buffer.put_i64(0);
        buffer.put_i32(10);
        buffer.put_slice(b"short");
        let records = MemoryRecords::new(buffer);
        assert!(matches!(
            records.validate(),
            Err(AppError::CorruptMessage(_))
        ));
    }

    #[test]
    fn validate_rejects_negative_size() {
        let mut buffer = BytesMut::new();
        buffer.put_i64(0);
        buffer.put_i32(-1);
        let records = MemoryRecords::new(buffer);
        assert!(matches!(
            records.validate(),
            Err(AppError::CorruptMessage(_))
        ));
    }

    #[test]
    fn validate_rejects_short_header() {
        let mut buffer = BytesMut::new();
        buffer.put_slice(&[0u8; 5]);
        let records = MemoryRecords::new(buffer);
        assert!(records.validate().is_err());
    }

    #[test]
    fn empty_set_is_valid_with_zero_records() {
        assert_eq!(MemoryRecords::empty().validate().unwrap(), 0);
    }
}
