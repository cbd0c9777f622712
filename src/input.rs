//! Buffered reading of RESP data from network streams.
//!
//! Every connection owns one [`RespReader`]. Bytes are accumulated in a persistent
//! buffer across socket reads, so a command split over several TCP segments is only
//! dispatched once it has fully arrived, and several commands delivered by one read are
//! all dispatched in order.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::resp::{decode_snapshot, Frame, RespError, RespValue};

const INITIAL_BUFFER_CAPACITY: usize = 4096;

/// Errors that can occur while reading from a connection.
#[derive(Error, Debug, PartialEq)]
pub enum CommandReadError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("RESP parse error: {0}")]
    RespParseError(#[from] RespError),
}

pub struct RespReader<R> {
    reader: R,
    buffer: BytesMut,
}

impl<R> RespReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Number of bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns every complete frame currently available, reading from the stream until
    /// at least one is.
    ///
    /// Malformed frames are skipped and never reach the caller.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Frame>)` - One or more frames, in arrival order
    /// * `Err(CommandReadError::ConnectionClosed)` - The peer closed the connection
    /// * `Err(CommandReadError::IoError)` - Reading from the stream failed
    pub async fn read_frames(&mut self) -> Result<Vec<Frame>, CommandReadError> {
        loop {
            let frames = self.decode_buffered_frames();

            if !frames.is_empty() {
                return Ok(frames);
            }

            self.fill_buffer().await?;
        }
    }

    /// Reads one status or error reply line.
    pub async fn read_reply(&mut self) -> Result<RespValue, CommandReadError> {
        loop {
            if let Some(reply) = RespValue::decode_reply(&mut self.buffer)? {
                return Ok(reply);
            }

            self.fill_buffer().await?;
        }
    }

    /// Reads the full-resync snapshot payload.
    pub async fn read_snapshot(&mut self) -> Result<Bytes, CommandReadError> {
        loop {
            if let Some(snapshot) = decode_snapshot(&mut self.buffer)? {
                return Ok(snapshot);
            }

            self.fill_buffer().await?;
        }
    }

    fn decode_buffered_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();

        loop {
            match Frame::decode(&mut self.buffer) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break,
                Err(e) => debug!("skipping malformed frame: {}", e),
            }
        }

        frames
    }

    async fn fill_buffer(&mut self) -> Result<usize, CommandReadError> {
        let number_of_bytes = self
            .reader
            .read_buf(&mut self.buffer)
            .await
            .map_err(|e| CommandReadError::IoError(e.to_string()))?;

        if number_of_bytes == 0 {
            return Err(CommandReadError::ConnectionClosed);
        }

        Ok(number_of_bytes)
    }
}
