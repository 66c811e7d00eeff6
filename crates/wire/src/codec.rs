//! Sentinel-delimited framing.
//!
//! A frame is `<body><sentinel>` with no length prefix and no separator.
//! The sentinel is never escaped, so a body that contains it cannot be
//! framed and is rejected at encode time.
//!
//! Decoding accumulates reads until the sentinel appears anywhere in what
//! has been read so far, then strips every occurrence of it and trims the
//! result. A read that times out, hits end-of-stream or errors before the
//! sentinel shows up still yields whatever text was accumulated; the
//! [`ReadStatus`] says which of those happened and callers decide whether
//! that matters (see [`crate::ReadMode`]).

use bytes::BytesMut;
use cubewright_core::Command;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout_at, Instant};

use crate::error::{Result, WireError};
use crate::types::ReadMode;

const READ_CHUNK: usize = 1024;

/// How a decode cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// The sentinel was observed.
    Complete,
    /// The deadline elapsed first.
    TimedOut,
    /// The peer closed the stream first.
    Closed,
    /// The underlying read errored.
    Failed(String),
}

/// Text accumulated by one decode cycle together with how the cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub text: String,
    pub status: ReadStatus,
    /// Raw bytes read, sentinel included
    pub received: usize,
}

impl ReadOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == ReadStatus::Complete
    }

    /// Apply `mode` to the outcome.
    ///
    /// Lenient mode hands back the text no matter how the read ended.
    pub fn into_checked(self, mode: ReadMode) -> Result<String> {
        match (mode, self.status) {
            (ReadMode::Lenient, _) | (ReadMode::Strict, ReadStatus::Complete) => Ok(self.text),
            (ReadMode::Strict, ReadStatus::TimedOut) => Err(WireError::ReadTimeout {
                received: self.received,
            }),
            (ReadMode::Strict, ReadStatus::Closed) => Err(WireError::Read(
                "connection closed before sentinel".to_string(),
            )),
            (ReadMode::Strict, ReadStatus::Failed(reason)) => Err(WireError::Read(reason)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    sentinel: String,
}

impl Codec {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Serialize `command` to JSON and append the sentinel.
    pub fn encode(&self, command: &Command) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(command)?;
        self.frame(body)
    }

    /// Frame a raw text body, as used by the password handshake.
    pub fn encode_text(&self, text: &str) -> Result<Vec<u8>> {
        self.frame(text.as_bytes().to_vec())
    }

    fn frame(&self, mut body: Vec<u8>) -> Result<Vec<u8>> {
        if find(&body, self.sentinel.as_bytes()).is_some() {
            return Err(WireError::SentinelCollision {
                sentinel: self.sentinel.clone(),
            });
        }
        body.extend_from_slice(self.sentinel.as_bytes());
        Ok(body)
    }

    /// Read from `reader` until the sentinel is seen or `wait` elapses.
    pub async fn decode<R>(&self, reader: &mut R, wait: Duration) -> ReadOutcome
    where
        R: AsyncRead + Unpin,
    {
        let deadline = Instant::now() + wait;
        let needle = self.sentinel.as_bytes();
        let mut buffer = BytesMut::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        let status = loop {
            match timeout_at(deadline, reader.read(&mut chunk)).await {
                Err(_) => break ReadStatus::TimedOut,
                Ok(Ok(0)) => break ReadStatus::Closed,
                Ok(Ok(n)) => {
                    // The sentinel may straddle the previous chunk boundary.
                    let scan_from = buffer.len().saturating_sub(needle.len().saturating_sub(1));
                    buffer.extend_from_slice(&chunk[..n]);
                    if find(&buffer[scan_from..], needle).is_some() {
                        break ReadStatus::Complete;
                    }
                }
                Ok(Err(e)) => break ReadStatus::Failed(e.to_string()),
            }
        };

        ReadOutcome {
            text: self.strip(&buffer),
            status,
            received: buffer.len(),
        }
    }

    /// Remove every sentinel occurrence and trim surrounding whitespace.
    pub fn strip(&self, raw: &[u8]) -> String {
        String::from_utf8_lossy(raw)
            .replace(&self.sentinel, "")
            .trim()
            .to_string()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
