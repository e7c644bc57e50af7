// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Length-prefixed message framing over any `AsyncRead`/`AsyncWrite`
//! (spec §6.1): 4-byte big-endian length prefix, then the raw payload.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A generous cap against a malformed/hostile peer sending a huge length
/// prefix and exhausting memory before the payload is even read.
const MAX_MESSAGE_BYTES: u32 = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("message of {0} bytes exceeds the {MAX_MESSAGE_BYTES}-byte limit")]
    TooLarge(u32),
}

impl casare_core::error::Classify for FramingError {
    fn kind(&self) -> casare_core::error::ErrorKind {
        match self {
            FramingError::Io(_) => casare_core::error::ErrorKind::Transient,
            FramingError::TooLarge(_) => casare_core::error::ErrorKind::Validation,
        }
    }
}

/// Writes `payload` prefixed with its big-endian `u32` length.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), FramingError> {
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed message. Returns `Ok(Vec)` of exactly the
/// declared length, or an `Io` error (including a clean EOF) if the peer
/// closed the connection.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_MESSAGE_BYTES {
        return Err(FramingError::TooLarge(len));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
