//! Shared helpers for the loopback integration tests.

#![allow(dead_code)]

use edge_gateway::protocol::{decode_response, encode_request, OutboundFrame};
use edge_gateway::{Backends, CipherKey, GatewayConfig};
use overmind_kit::Mail;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Stands in for a backend: every mail lands in a channel the test reads.
struct Inbox;

impl Actor for Inbox {
    type Msg = Mail;
    type State = mpsc::UnboundedSender<Mail>;
    type Arguments = mpsc::UnboundedSender<Mail>;

    async fn pre_start(&self, _myself: ActorRef<Mail>, tx: Self::Arguments) -> Result<Self::State, ActorProcessingErr> {
        Ok(tx)
    }

    async fn handle(&self, _myself: ActorRef<Mail>, mail: Mail, tx: &mut Self::State) -> Result<(), ActorProcessingErr> {
        let _ = tx.send(mail);
        Ok(())
    }
}

async fn inbox() -> (ActorRef<Mail>, mpsc::UnboundedReceiver<Mail>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (actor, _) = Actor::spawn(None, Inbox, tx).await.unwrap();
    (actor, rx)
}

/// Backend addresses that land in plain channels the test can read.
pub struct Backplane {
    pub backends: Backends,
    pub portal: mpsc::UnboundedReceiver<Mail>,
    pub world: mpsc::UnboundedReceiver<Mail>,
}

pub async fn backplane() -> Backplane {
    let (portal_ref, portal) = inbox().await;
    let (world_ref, world) = inbox().await;
    Backplane {
        backends: Backends::new(portal_ref, world_ref),
        portal,
        world,
    }
}

/// Loopback configuration on ephemeral ports.
pub fn config() -> Arc<GatewayConfig> {
    Arc::new(GatewayConfig {
        ws_bind_address: "127.0.0.1:0".parse().unwrap(),
        tcp_bind_address: "127.0.0.1:0".parse().unwrap(),
        tcp_idle_timeout: Some(Duration::from_secs(5)),
        ..GatewayConfig::default()
    })
}

pub fn key() -> CipherKey {
    CipherKey::development()
}

pub fn request(msg_type: i32, msg_no: i32, body: &[u8]) -> Vec<u8> {
    encode_request(msg_type, msg_no, body, &key()).unwrap()
}

pub async fn tcp_send(stream: &mut TcpStream, frame: &[u8]) {
    stream.write_all(&(frame.len() as u16).to_be_bytes()).await.unwrap();
    stream.write_all(frame).await.unwrap();
}

pub async fn tcp_recv(stream: &mut TcpStream) -> OutboundFrame {
    let read = async {
        let len = stream.read_u16().await.unwrap();
        let mut frame = vec![0u8; usize::from(len)];
        stream.read_exact(&mut frame).await.unwrap();
        decode_response(&frame).unwrap()
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("no response within 5s")
}

/// True if the peer closes the connection within the timeout.
pub async fn tcp_closed(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 64];
    loop {
        match tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) => return true,
            Ok(Ok(_)) => continue,
            Err(_) => return false,
        }
    }
}
