//! WebSocket pumps.
//!
//! One binary message carries one frame. The reader enforces a pong-driven
//! read deadline and the writer interleaves pings with queued frames.

use super::{PacketSink, TransportError};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use overmind_kit::ShutdownState;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, timeout_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, trace};

/// Reads messages until close, an error, the read deadline, or hang-up.
///
/// The deadline starts at `pong_wait` and is pushed back by `pong_wait`
/// every time a pong arrives. Text messages are ignored.
pub async fn read_loop<S>(
    mut stream: S,
    sink: &PacketSink,
    pong_wait: Duration,
    hangup: &ShutdownState,
) -> Result<(), TransportError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let mut deadline = Instant::now() + pong_wait;
    loop {
        let next = tokio::select! {
            _ = hangup.wait() => return Ok(()),
            next = timeout_at(deadline, stream.next()) => next,
        };
        let message = match next {
            Err(_) => return Err(TransportError::ReadTimeout),
            Ok(None) => return Ok(()),
            Ok(Some(message)) => message?,
        };

        match message {
            Message::Binary(data) => sink.deliver(&data)?,
            Message::Pong(_) => {
                trace!("🏓 Pong received");
                deadline = Instant::now() + pong_wait;
            }
            Message::Close(frame) => {
                debug!("🔌 Client requested close: {:?}", frame);
                return Ok(());
            }
            Message::Text(_) => trace!("Ignoring text message"),
            Message::Ping(_) | Message::Frame(_) => {}
        }
    }
}

/// Timing of the WebSocket writer.
#[derive(Debug, Clone, Copy)]
pub struct WsTiming {
    pub write_wait: Duration,
    pub ping_period: Duration,
}

/// Writes queued frames and periodic pings until the queue closes or the
/// connection hangs up, then closes the socket.
pub async fn write_loop<S>(
    mut socket: S,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    hangup: ShutdownState,
    timing: WsTiming,
) -> Result<(), TransportError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let mut ping = interval_at(Instant::now() + timing.ping_period, timing.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        let message = tokio::select! {
            biased;
            _ = hangup.wait() => break Ok(()),
            item = outbound.recv() => match item {
                Some(frame) => Message::Binary(frame.into()),
                None => break Ok(()),
            },
            _ = ping.tick() => Message::Ping(Default::default()),
        };

        match timeout(timing.write_wait, socket.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => break Err(TransportError::WebSocket(e)),
            Err(_) => break Err(TransportError::WriteTimeout),
        }
    };

    if let Err(e) = &result {
        error!("WebSocket write failed: {}", e);
    }
    let _ = timeout(timing.write_wait, socket.close()).await;
    result
}
