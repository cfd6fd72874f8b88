//! # Overmind Player Client
//!
//! Connects one or more clients to a running gateway and walks each through
//! the full request flow: handshake, heartbeat, login, entering the world
//! and a few moves. Every response is decoded and checked against the
//! request it answers.

mod link;

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use edge_gateway::protocol::{decode_response, encode_request, OutboundFrame, DEV_SHARED_KEY};
use edge_gateway::CipherKey;
use link::Link;
use overmind_kit::MsgType;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Tcp,
    Ws,
}

#[derive(Parser, Debug)]
#[command(name = "player-client")]
#[command(about = "Exercises the Overmind edge gateway wire protocol")]
struct Args {
    /// Transport to speak
    #[arg(short, long, value_enum, default_value = "tcp")]
    transport: Transport,

    /// TCP gateway address
    #[arg(long, default_value = "127.0.0.1:8081")]
    addr: String,

    /// WebSocket gateway URL
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Shared AES key (16, 24 or 32 bytes); the development key by default
    #[arg(short, long)]
    key: Option<String>,

    /// Number of simultaneous clients
    #[arg(short, long, default_value = "1")]
    clients: u32,

    /// Move requests sent by each client after entering the world
    #[arg(short, long, default_value = "3")]
    moves: u32,

    /// Seconds to wait for each response
    #[arg(long, default_value = "5")]
    timeout: u64,
}

/// One client's conversation with the gateway.
struct Player {
    id: u32,
    link: Link,
    key: CipherKey,
    timeout: Duration,
    msg_no: i32,
}

impl Player {
    async fn connect(id: u32, args: &Args, key: CipherKey) -> Result<Self> {
        let link = match args.transport {
            Transport::Tcp => Link::tcp(&args.addr).await?,
            Transport::Ws => Link::ws(&args.url).await?,
        };
        Ok(Self {
            id,
            link,
            key,
            timeout: Duration::from_secs(args.timeout),
            msg_no: 0,
        })
    }

    /// Sends a request and returns the `msg_no` it was stamped with.
    async fn send(&mut self, kind: MsgType, body: &Value) -> Result<i32> {
        self.msg_no += 1;
        let body = serde_json::to_vec(body)?;
        let frame = encode_request(kind.code(), self.msg_no, &body, &self.key)?;
        self.link.send(&frame).await?;
        Ok(self.msg_no)
    }

    /// Sends a request and waits for the matching response.
    async fn call(&mut self, kind: MsgType, body: Value, expect: MsgType) -> Result<Value> {
        let msg_no = self.send(kind, &body).await?;
        let raw = self.link.recv(self.timeout).await?;
        let frame = decode_response(&raw)?;
        check_response(&frame, expect, msg_no)?;

        let body: Value = serde_json::from_slice(&frame.body)
            .with_context(|| format!("{expect} body is not JSON"))?;
        info!("📨 client {} <- {} #{}: {}", self.id, expect, msg_no, body);
        Ok(body)
    }

    async fn run(mut self, moves: u32) -> Result<()> {
        let handshake = self
            .call(MsgType::HandshakeReq, json!({}), MsgType::HandshakeResp)
            .await?;
        ensure!(handshake["rt"] == 0, "handshake refused: {handshake}");

        self.send(MsgType::Heartbeat, &json!({})).await?;

        let login = self
            .call(
                MsgType::LoginReq,
                json!({ "app_id": format!("client-{}", self.id) }),
                MsgType::LoginResp,
            )
            .await?;
        ensure!(login["rt"] == 0, "login refused: {login}");

        let entered = self
            .call(MsgType::EnterWorldReq, json!({}), MsgType::EnterWorldResp)
            .await?;
        ensure!(entered["rt"] == 0, "enter world refused: {entered}");

        for step in 0..moves {
            let step = f64::from(step);
            self.send(MsgType::MoveReq, &json!({ "x": step, "y": step }))
                .await?;
        }

        info!("✅ client {} finished ({} moves)", self.id, moves);
        self.link.close().await
    }
}

fn check_response(frame: &OutboundFrame, expect: MsgType, msg_no: i32) -> Result<()> {
    ensure!(
        i32::from(frame.msg_type) == expect.code(),
        "expected {expect}, got message type {}",
        frame.msg_type
    );
    ensure!(
        frame.msg_no == msg_no,
        "response #{} does not answer request #{msg_no}",
        frame.msg_no
    );
    ensure!(frame.rt == 0, "{expect} carried result code {}", frame.rt);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let key = match &args.key {
        Some(key) => CipherKey::new(key.as_bytes())?,
        None => {
            warn!("🔑 Using the development key");
            CipherKey::new(DEV_SHARED_KEY)?
        }
    };

    info!("🚀 Starting player client");
    info!("   • Transport: {:?}", args.transport);
    info!(
        "   • Target: {}",
        match args.transport {
            Transport::Tcp => &args.addr,
            Transport::Ws => &args.url,
        }
    );
    info!("   • Clients: {} | Moves per client: {}", args.clients, args.moves);

    let mut handles = Vec::new();
    for id in 1..=args.clients {
        let player = Player::connect(id, &args, key.clone()).await?;
        handles.push(tokio::spawn(player.run(args.moves)));
    }

    let mut failures = 0;
    for (index, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("❌ client {} failed: {:#}", index + 1, e);
                failures += 1;
            }
            Err(e) => {
                error!("❌ client {} task panicked: {}", index + 1, e);
                failures += 1;
            }
        }
    }

    ensure!(failures == 0, "{failures} of {} client(s) failed", args.clients);
    info!("🎉 All {} client(s) completed the flow", args.clients);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(msg_type: MsgType, msg_no: i32, rt: i16) -> OutboundFrame {
        OutboundFrame {
            msg_type: msg_type.code() as i16,
            msg_no,
            rt,
            body: Vec::new(),
        }
    }

    #[test]
    fn matching_response_passes() {
        assert!(check_response(&frame(MsgType::LoginResp, 4, 0), MsgType::LoginResp, 4).is_ok());
    }

    #[test]
    fn mismatches_are_reported() {
        assert!(check_response(&frame(MsgType::HandshakeResp, 4, 0), MsgType::LoginResp, 4).is_err());
        assert!(check_response(&frame(MsgType::LoginResp, 3, 0), MsgType::LoginResp, 4).is_err());
        assert!(check_response(&frame(MsgType::LoginResp, 4, 1), MsgType::LoginResp, 4).is_err());
    }

    #[test]
    fn args_default_to_tcp() {
        let args = Args::parse_from(["player-client"]);
        assert_eq!(args.transport, Transport::Tcp);
        assert_eq!(args.clients, 1);

        let args = Args::parse_from(["player-client", "-t", "ws", "--url", "ws://h:1/ws"]);
        assert_eq!(args.transport, Transport::Ws);
        assert_eq!(args.url, "ws://h:1/ws");
    }
}
