//! Length-prefixed TCP pumps.
//!
//! Every frame is a big-endian `u16` length followed by that many bytes.

use super::{PacketSink, TransportError};
use overmind_kit::ShutdownState;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, trace};

/// Read-side limits of a TCP connection.
#[derive(Debug, Clone, Copy)]
pub struct TcpLimits {
    pub max_frame_size: usize,
    pub idle_timeout: Option<Duration>,
}

/// Reads frames until EOF, an error, or hang-up.
///
/// Clean EOF between frames and hang-up both return `Ok`.
pub async fn read_loop<R>(
    mut reader: R,
    sink: &PacketSink,
    limits: TcpLimits,
    hangup: &ShutdownState,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = hangup.wait() => return Ok(()),
            frame = read_frame(&mut reader, limits) => frame?,
        };
        let Some(frame) = frame else {
            return Ok(());
        };
        sink.deliver(&frame)?;
    }
}

async fn read_frame<R>(reader: &mut R, limits: TcpLimits) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let read = async {
        let len = match reader.read_u16().await {
            Ok(len) => usize::from(len),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(TransportError::Io(e)),
        };
        if len > limits.max_frame_size {
            return Err(TransportError::Oversized {
                len,
                max: limits.max_frame_size,
            });
        }
        let mut frame = vec![0u8; len];
        reader.read_exact(&mut frame).await?;
        Ok::<_, TransportError>(Some(frame))
    };

    match limits.idle_timeout {
        Some(idle) => timeout(idle, read).await.map_err(|_| TransportError::ReadTimeout)?,
        None => read.await,
    }
}

/// Writes queued frames until the queue closes or the connection hangs up,
/// then shuts down the write half.
pub async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    hangup: ShutdownState,
    write_wait: Duration,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let result = loop {
        let item = tokio::select! {
            biased;
            _ = hangup.wait() => break Ok(()),
            item = outbound.recv() => item,
        };
        let Some(body) = item else {
            break Ok(());
        };
        let Ok(len) = u16::try_from(body.len()) else {
            error!("Outbound frame of {} bytes cannot be length-prefixed, dropping", body.len());
            continue;
        };

        let mut frame = Vec::with_capacity(2 + body.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&body);
        match timeout(write_wait, writer.write_all(&frame)).await {
            Ok(Ok(())) => trace!("📤 Wrote {} bytes", frame.len()),
            Ok(Err(e)) => break Err(TransportError::Io(e)),
            Err(_) => break Err(TransportError::WriteTimeout),
        }
    };

    let _ = timeout(write_wait, writer.shutdown()).await;
    result
}
