use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::bail;
use crate::error::{ErrorKind, SyncResult};

/// Size of the big-endian length prefix preceding every frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Writes one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max_frame_bytes: usize) -> SyncResult<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max_frame_bytes || payload.len() > u32::MAX as usize {
        bail!(
            ErrorKind::FrameTooLarge,
            "Outgoing frame exceeds the frame size limit",
            format!("{} bytes, limit {max_frame_bytes}", payload.len())
        );
    }

    let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(payload);
    writer.write_all(&frame).await?;

    Ok(())
}

/// Reads one length-prefixed frame.
///
/// A clean end of stream before the length prefix surfaces as [`ErrorKind::ConnectionClosed`].
pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> SyncResult<Bytes>
where
    R: AsyncRead + Unpin,
{
    let length = reader.read_u32().await? as usize;
    if length > max_frame_bytes {
        bail!(
            ErrorKind::FrameTooLarge,
            "Incoming frame exceeds the frame size limit",
            format!("{length} bytes, limit {max_frame_bytes}")
        );
    }

    let mut payload = BytesMut::zeroed(length);
    reader.read_exact(&mut payload).await?;

    Ok(payload.freeze())
}
