//! Length-prefixed message framing (RFC 1035 section 4.2.2).
//!
//! Used for client TCP connections and for every upstream TLS connection.
//! Each message is a 2-byte big-endian length followed by that many bytes.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FramingError;

/// Largest payload a 2-byte prefix can describe.
pub const MAX_FRAMED_LEN: usize = u16::MAX as usize;

/// Read one length-prefixed message and return its payload.
///
/// Transport reads may return fewer bytes than asked for, so both the
/// prefix and the payload are read until complete.
pub async fn read_framed<S>(stream: &mut S) -> Result<Vec<u8>, FramingError>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 2];
    stream.read_exact(&mut prefix).await.map_err(eof_as_truncated)?;

    let len = u16::from_be_bytes(prefix) as usize;

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.map_err(eof_as_truncated)?;

    Ok(payload)
}

/// Write `payload` with its length prefix as a single write.
pub async fn write_framed<S>(stream: &mut S, payload: &[u8]) -> Result<(), FramingError>
where
    S: AsyncWrite + Unpin,
{
    let len = u16::try_from(payload.len()).map_err(|_| FramingError::Oversized(payload.len()))?;

    let mut frame = Vec::with_capacity(2 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);

    stream.write_all(&frame).await?;
    stream.flush().await?;

    Ok(())
}

fn eof_as_truncated(e: io::Error) -> FramingError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FramingError::Truncated
    } else {
        FramingError::Io(e)
    }
}
