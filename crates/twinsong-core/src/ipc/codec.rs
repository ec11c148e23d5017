//! Framed JSON over a duplex byte stream.
//!
//! Format: 4-byte length (u32 LE) + JSON-encoded message. The same framing
//! runs over kernel pipes (sync, inside the kernel process) and over the
//! server side of those pipes (async).

use std::io::{Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Reject frames larger than this (100MB); a longer length prefix means a
/// corrupted or desynchronized stream.
const MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(message)
        .map_err(|e| Error::Serialization(format!("failed to encode frame: {}", e)))?;
    let mut bytes = Vec::with_capacity(body.len() + 4);
    bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| Error::Deserialization(format!("failed to decode frame: {}", e)))
}

fn check_len(len: usize) -> Result<()> {
    if len > MAX_FRAME_LEN {
        return Err(Error::Ipc(format!("frame too large: {} bytes", len)));
    }
    Ok(())
}

/// Write a message to a writer using length-prefixed JSON encoding.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let bytes = encode(message)?;
    writer
        .write_all(&bytes)
        .map_err(|e| Error::Ipc(format!("failed to write frame: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Ipc(format!("failed to flush stream: {}", e)))?;
    Ok(())
}

/// Read a message from a reader using length-prefixed JSON encoding.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| Error::Ipc(format!("failed to read frame length: {}", e)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    check_len(len)?;

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .map_err(|e| Error::Ipc(format!("failed to read frame body: {}", e)))?;
    decode(&body)
}

/// Async variant of [`write_frame`].
pub async fn write_frame_async<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode(message)?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| Error::Ipc(format!("failed to write frame: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Ipc(format!("failed to flush stream: {}", e)))?;
    Ok(())
}

/// Async variant of [`read_frame`].
pub async fn read_frame_async<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .await
        .map_err(|e| Error::Ipc(format!("failed to read frame length: {}", e)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    check_len(len)?;

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| Error::Ipc(format!("failed to read frame body: {}", e)))?;
    decode(&body)
}
