use std::io::{self, ErrorKind};

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;

use crate::network::RequestFrame;
use crate::AppResult;

/// Read side of a client connection.
#[derive(Debug)]
pub struct Connection {
    reader: OwnedReadHalf,
    buffer: BytesMut,
    max_frame_size: usize,
}

impl Connection {
    pub fn new(reader: OwnedReadHalf, max_frame_size: usize) -> Connection {
        Connection {
            reader,
            buffer: BytesMut::with_capacity(4 * 1024),
            max_frame_size,
        }
    }

    /// Reads one complete `RequestFrame` from the stream.
    ///
    /// Returns `None` when the client closed the connection between frames.
    /// A close in the middle of a frame, a negative size, or an oversized
    /// frame is an error; the caller drops the connection, which releases
    /// the buffer without touching any partition state.
    pub async fn read_frame(&mut self) -> AppResult<Option<RequestFrame>> {
        loop {
            if let Some(frame) = RequestFrame::parse(&mut self.buffer, self.max_frame_size)? {
                return Ok(Some(frame));
            }
            if 0 == self.reader.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(io::Error::new(ErrorKind::ConnectionReset, "connection reset by peer")
                        .into())
                };
            }
        }
    }
}
