//! Newline-delimited JSON framing shared by the server and client halves.

use async_stream::stream;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::debug;

use crate::rpc::error::RpcError;
use crate::rpc::message::Frame;

/// Decode frames of at most `max_length` bytes from `reader` until EOF.
///
/// A line that is not a valid frame yields an [`RpcError::Json`] and reading continues. An IO
/// error or an oversized line is yielded once and ends the stream.
pub(crate) fn read_frames<R>(
    reader: R,
    max_length: usize,
) -> impl Stream<Item = Result<Frame, RpcError>>
where
    R: AsyncRead + Unpin,
{
    stream! {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(max_length));
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    yield serde_json::from_str::<Frame>(&line).map_err(RpcError::from);
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    yield Err(RpcError::FrameTooLong(max_length));
                    break;
                }
                Err(LinesCodecError::Io(e)) => {
                    yield Err(RpcError::from(e));
                    break;
                }
            }
        }
    }
}

/// Write every frame received on `frames` to `writer`, one per line, until the channel closes or
/// the socket fails.
pub(crate) async fn write_frames<W>(
    mut writer: W,
    mut frames: mpsc::Receiver<Frame>,
) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }

    debug!("Outbound frame queue closed");
    writer.shutdown().await?;
    Ok(())
}
