use bytes::{Buf, BufMut, BytesMut};

use crate::{AppError, AppResult};

fn need(buffer: &BytesMut, bytes: usize, what: &str) -> AppResult<()> {
    if buffer.remaining() < bytes {
        return Err(AppError::MalformedProtocol(format!(
            "need {} bytes for {}, {} available",
            bytes,
            what,
            buffer.remaining()
        )));
    }
    Ok(())
}

pub fn read_i16(buffer: &mut BytesMut) -> AppResult<i16> {
    need(buffer, 2, "i16")?;
    Ok(buffer.get_i16())
}

pub fn read_i32(buffer: &mut BytesMut) -> AppResult<i32> {
    need(buffer, 4, "i32")?;
    Ok(buffer.get_i32())
}

pub fn read_i64(buffer: &mut BytesMut) -> AppResult<i64> {
    need(buffer, 8, "i64")?;
    Ok(buffer.get_i64())
}

/// `{len: i16}{bytes}`; a negative length denotes null.
pub fn read_string16(buffer: &mut BytesMut) -> AppResult<Option<String>> {
    let len = read_i16(buffer)?;
    if len < 0 {
        return Ok(None);
    }
    need(buffer, len as usize, "string16 body")?;
    let bytes = buffer.split_to(len as usize);
    let value = String::from_utf8(bytes.to_vec())
        .map_err(|e| AppError::MalformedProtocol(format!("invalid utf8 in string16: {}", e)))?;
    Ok(Some(value))
}

pub fn require_string16(buffer: &mut BytesMut, what: &str) -> AppResult<String> {
    read_string16(buffer)?
        .ok_or_else(|| AppError::MalformedProtocol(format!("{} must not be null", what)))
}

/// `{len: i32}{bytes}`; a negative length denotes null. The returned buffer
/// shares the underlying allocation.
pub fn read_bytes32(buffer: &mut BytesMut) -> AppResult<Option<BytesMut>> {
    let len = read_i32(buffer)?;
    if len < 0 {
        return Ok(None);
    }
    need(buffer, len as usize, "bytes32 body")?;
    Ok(Some(buffer.split_to(len as usize)))
}

pub fn write_string16(buffer: &mut BytesMut, value: Option<&str>) {
    match value {
        Some(s) => {
            buffer.put_i16(s.len() as i16);
            buffer.put_slice(s.as_bytes());
        }
        None => buffer.put_i16(-1),
    }
}

pub fn write_bytes32(buffer: &mut BytesMut, value: Option<&[u8]>) {
    match value {
        Some(bytes) => {
            buffer.put_i32(bytes.len() as i32);
            buffer.put_slice(bytes);
        }
        None => buffer.put_i32(-1),
    }
}

/// `{count: i32}{T x count}`. A non-positive count reads as empty.
pub fn read_array<T>(
    buffer: &mut BytesMut,
    mut read_one: impl FnMut(&mut BytesMut) -> AppResult<T>,
) -> AppResult<Vec<T>> {
    let count = read_i32(buffer)?;
    if count <= 0 {
        return Ok(Vec::new());
    }
    // each element takes at least one byte; a count beyond the buffer is lying
    if count as usize > buffer.remaining() {
        return Err(AppError::MalformedProtocol(format!(
            "array count {} exceeds {} buffered bytes",
            count,
            buffer.remaining()
        )));
    }
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        items.push(read_one(buffer)?);
    }
    Ok(items)
}

pub fn write_array<T>(
    buffer: &mut BytesMut,
    items: &[T],
    mut write_one: impl FnMut(&mut BytesMut, &T),
) {
    buffer.put_i32(items.len() as i32);
    for item in items {
        write_one(buffer, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string16_round_trip() {
        let mut buffer = BytesMut::new();
        write_string16(&mut buffer, Some("hello"));
        write_string16(&mut buffer, None);
        assert_eq!(read_string16(&mut buffer).unwrap(), Some("hello".into()));
        assert_eq!(read_string16(&mut buffer).unwrap(), None);
    }

    #[test]
    fn bytes32_round_trip() {
        let mut buffer = BytesMut::new();
        write_bytes32(&mut buffer, Some(b"abc"));
        write_bytes32(&mut buffer, None);
        assert_eq!(read_bytes32(&mut buffer).unwrap().unwrap().as_ref(), b"abc");
        assert_eq!(read_bytes32(&mut buffer).unwrap(), None);
    }

    #[test]
    fn truncated_reads_error_instead_of_panicking() {
        let mut buffer = BytesMut::from(&[0u8, 0, 0][..]);
        assert!(read_i32(&mut buffer).is_err());

        let mut buffer = BytesMut::new();
        buffer.put_i16(10);
        buffer.put_slice(b"short");
        assert!(read_string16(&mut buffer).is_err());
    }

    #[test]
    fn array_round_trip() {
        let mut buffer = BytesMut::new();
        write_array(&mut buffer, &[1i32, 2, 3], |b, v| b.put_i32(*v));
        let values = read_array(&mut buffer, read_i32).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn array_with_lying_count_is_rejected() {
        let mut buffer = BytesMut::new();
        buffer.put_i32(1_000_000);
        assert!(read_array(&mut buffer, read_i32).is_err());
    }
}
