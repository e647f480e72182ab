use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::trace;

use crate::error::SyncResult;
use crate::protocol::codec::{read_frame, write_frame};
use crate::protocol::message::{decode_row, encode_row, encode_rows_end};
use crate::protocol::{Request, Response};
use crate::types::Value;

/// A framed, ordered message channel to the peer.
///
/// Writes are buffered until [`Channel::flush`]; [`Channel::send_request`] flushes on its own
/// since the initiator always waits for the answer next.
pub struct Channel<R, W> {
    reader: R,
    writer: BufWriter<W>,
    max_frame_bytes: usize,
}

impl<R, W> Channel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            writer: BufWriter::new(writer),
            max_frame_bytes,
        }
    }

    pub async fn send_request(&mut self, request: &Request) -> SyncResult<()> {
        trace!(verb = %request.verb(), "sending request");

        let payload = request.encode()?;
        write_frame(&mut self.writer, &payload, self.max_frame_bytes).await?;
        self.flush().await
    }

    pub async fn recv_request(&mut self) -> SyncResult<Request> {
        let frame = read_frame(&mut self.reader, self.max_frame_bytes).await?;
        let request = Request::decode(&frame)?;
        trace!(verb = %request.verb(), "received request");

        Ok(request)
    }

    pub async fn send_response(&mut self, response: &Response) -> SyncResult<()> {
        trace!(verb = %response.verb(), "sending response");

        let payload = response.encode()?;
        write_frame(&mut self.writer, &payload, self.max_frame_bytes).await
    }

    pub async fn recv_response(&mut self) -> SyncResult<Response> {
        let frame = read_frame(&mut self.reader, self.max_frame_bytes).await?;
        let response = Response::decode(&frame)?;
        trace!(verb = %response.verb(), "received response");

        Ok(response)
    }

    /// Sends one row of a ROWS response as a single frame.
    ///
    /// Rows whose encoding exceeds the frame size limit are refused.
    pub async fn send_row(&mut self, values: &[Value]) -> SyncResult<()> {
        let payload = encode_row(values)?;
        write_frame(&mut self.writer, &payload, self.max_frame_bytes).await
    }

    /// Terminates a ROWS response.
    pub async fn send_rows_end(&mut self) -> SyncResult<()> {
        let payload = encode_rows_end()?;
        write_frame(&mut self.writer, &payload, self.max_frame_bytes).await
    }

    /// Reads the next row of a ROWS response, or `None` at its terminator.
    pub async fn recv_row(&mut self) -> SyncResult<Option<Vec<Value>>> {
        let frame = read_frame(&mut self.reader, self.max_frame_bytes).await?;
        decode_row(&frame)
    }

    pub async fn flush(&mut self) -> SyncResult<()> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Flushes pending writes and shuts the write half down.
    pub async fn shutdown(&mut self) -> SyncResult<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
