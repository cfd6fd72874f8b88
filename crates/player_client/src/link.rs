//! One client connection to the gateway over either transport.

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// An open connection that moves whole frames.
pub enum Link {
    /// Raw TCP with a big-endian `u16` length prefix per frame
    Tcp(TcpStream),
    /// One binary WebSocket message per frame
    Ws(Box<WebSocketStream<MaybeTlsStream<TcpStream>>>),
}

impl Link {
    pub async fn tcp(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connecting to {addr}"))?;
        stream.set_nodelay(true)?;
        Ok(Link::Tcp(stream))
    }

    pub async fn ws(url: &str) -> Result<Self> {
        let (socket, _) = connect_async(url)
            .await
            .with_context(|| format!("connecting to {url}"))?;
        Ok(Link::Ws(Box::new(socket)))
    }

    /// Writes one frame.
    pub async fn send(&mut self, frame: &[u8]) -> Result<()> {
        match self {
            Link::Tcp(stream) => {
                let len = u16::try_from(frame.len())
                    .with_context(|| format!("frame of {} bytes is too long", frame.len()))?;
                stream.write_all(&len.to_be_bytes()).await?;
                stream.write_all(frame).await?;
            }
            Link::Ws(socket) => socket.send(Message::Binary(frame.to_vec().into())).await?,
        }
        Ok(())
    }

    /// Reads the next frame, waiting at most `within`.
    pub async fn recv(&mut self, within: Duration) -> Result<Vec<u8>> {
        tokio::time::timeout(within, self.recv_frame())
            .await
            .context("timed out waiting for a response")?
    }

    async fn recv_frame(&mut self) -> Result<Vec<u8>> {
        match self {
            Link::Tcp(stream) => {
                let len = stream.read_u16().await.context("connection closed")?;
                let mut frame = vec![0u8; usize::from(len)];
                stream.read_exact(&mut frame).await?;
                Ok(frame)
            }
            Link::Ws(socket) => loop {
                match socket.next().await {
                    Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                    Some(Ok(Message::Close(_))) | None => bail!("connection closed"),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                }
            },
        }
    }

    pub async fn close(self) -> Result<()> {
        match self {
            Link::Tcp(mut stream) => stream.shutdown().await?,
            // Deref past the box so the inherent close, which takes a frame, is used.
            Link::Ws(mut socket) => (*socket).close(None).await?,
        }
        Ok(())
    }
}
