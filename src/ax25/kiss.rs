//! KISS framing (http://www.ax25.net/kiss.aspx).

use log::{debug, trace, warn};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use super::frame::Frame;

pub const FEND: u8 = 0xC0;
pub const FESC: u8 = 0xDB;
pub const TFEND: u8 = 0xDC;
pub const TFESC: u8 = 0xDD;

const CMD_DATA: u8 = 0x00;

/// Escaped bytes allowed between two FENDs. A UI frame with ten addresses
/// and a 256 byte information field fits twice over.
pub const MAX_FRAME_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("read error: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed by TNC")]
    Closed,
}

/// Wraps an AX.25 frame in a KISS data frame on port 0.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(FEND);
    out.push(CMD_DATA);
    for &b in payload {
        match b {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            _ => out.push(b),
        }
    }
    out.push(FEND);
    out
}

fn unescape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut escaped = false;
    for &b in raw {
        if escaped {
            match b {
                TFEND => out.push(FEND),
                TFESC => out.push(FESC),
                other => out.push(other),
            }
            escaped = false;
        } else if b == FESC {
            escaped = true;
        } else {
            out.push(b);
        }
    }
    out
}

/// Stream decoder yielding AX.25 frames from a KISS byte stream.
///
/// The decoder buffers partial frames, so an instance must not outlive the
/// connection it was built on.
pub struct KissDecoder<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    /// Set while skipping the rest of an oversized frame.
    discarding: bool,
}

impl<R: AsyncRead + Unpin> KissDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            discarding: false,
        }
    }

    /// Returns the next AX.25 frame. Non-data KISS frames, oversized frames
    /// and frames that fail AX.25 decoding are skipped; only stream
    /// failures are errors.
    ///
    /// Cancel safe: bytes of a partially read frame stay buffered and the
    /// next call resumes where this one stopped.
    pub async fn next_frame(&mut self) -> Result<Frame, DecodeError> {
        loop {
            let raw = self.next_raw().await?;

            // Between frames, or back-to-back FENDs
            let Some((&command, escaped)) = raw.split_first() else {
                continue;
            };
            if command & 0x0F != CMD_DATA {
                trace!("Skipping KISS command frame {:#04x}", command);
                continue;
            }

            let payload = unescape(escaped);
            match Frame::decode(&payload) {
                Ok(frame) => return Ok(frame),
                Err(e) => {
                    debug!("Dropping undecodable AX.25 frame ({} bytes): {}", payload.len(), e);
                    continue;
                }
            }
        }
    }

    /// Bytes up to the next FEND, at most `MAX_FRAME_LEN` of them.
    async fn next_raw(&mut self) -> Result<Vec<u8>, DecodeError> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                // EOF, possibly in the middle of a frame
                return Err(DecodeError::Closed);
            }

            let end = available.iter().position(|&b| b == FEND);
            let chunk = &available[..end.unwrap_or(available.len())];
            if !self.discarding {
                self.buf.extend_from_slice(chunk);
            }
            let consumed = chunk.len() + usize::from(end.is_some());
            self.reader.consume(consumed);

            if self.buf.len() > MAX_FRAME_LEN {
                warn!("KISS frame exceeds {} bytes, discarding it", MAX_FRAME_LEN);
                self.buf.clear();
                self.discarding = true;
            }
            if end.is_some() {
                if std::mem::take(&mut self.discarding) {
                    continue;
                }
                return Ok(std::mem::take(&mut self.buf));
            }
        }
    }
}
