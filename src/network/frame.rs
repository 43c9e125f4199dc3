use bytes::{Buf, BytesMut};

use crate::protocol::RequestHeader;
use crate::AppError::Incomplete;
use crate::{AppError, AppResult};

/// A complete request frame with its header parsed and body left raw.
#[derive(Debug)]
pub struct RequestFrame {
    pub request_header: RequestHeader,
    pub request_body: BytesMut,
}

impl RequestFrame {
    /// Checks whether `buffer` holds a complete frame.
    ///
    /// `Incomplete` asks the caller for more bytes; any other error means
    /// the stream is unusable and the connection should be closed.
    pub fn check(buffer: &mut BytesMut, max_frame_size: usize) -> AppResult<()> {
        if buffer.remaining() < 4 {
            return Err(Incomplete);
        }
        let body_size = i32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        if body_size < 0 {
            return Err(AppError::DetailedIoError(format!(
                "frame size {} less than 0",
                body_size
            )));
        }
        if body_size as usize > max_frame_size {
            return Err(AppError::DetailedIoError(format!(
                "frame of length {} is too large",
                body_size
            )));
        }
        if buffer.remaining() < body_size as usize + 4 {
            buffer.reserve(body_size as usize + 4 - buffer.remaining());
            return Err(Incomplete);
        }
        Ok(())
    }

    /// Parses one frame out of `buffer`, leaving pipelined bytes in place.
    /// `Ok(None)` means more bytes are needed.
    pub fn parse(buffer: &mut BytesMut, max_frame_size: usize) -> AppResult<Option<RequestFrame>> {
        match Self::check(buffer, max_frame_size) {
            Ok(()) => {
                let body_length = buffer.get_i32();
                let mut body = buffer.split_to(body_length as usize);
                let request_header = RequestHeader::read_from(&mut body)?;
                Ok(Some(RequestFrame {
                    request_header,
                    request_body: body,
                }))
            }
            Err(AppError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
