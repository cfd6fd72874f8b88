mod common;

use common::*;
use edge_gateway::{NetworkServer, TcpServer};
use overmind_kit::{EdgeLetter, EvictLetter, Letter, Logger, Mail, MsgType, ShutdownState};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

async fn start() -> (TcpServer, Backplane, TcpStream) {
    let plane = backplane().await;
    let server = TcpServer::new(config(), plane.backends.clone(), &Logger::detached());
    server.start(ShutdownState::new()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    (server, plane, client)
}

#[tokio::test(flavor = "multi_thread")]
async fn handshake_over_tcp() {
    let (server, _plane, mut client) = start().await;
    assert_eq!(server.protocol(), "tcp");

    tcp_send(&mut client, &request(MsgType::HandshakeReq.code(), 41, &[])).await;
    let response = tcp_recv(&mut client).await;

    assert_eq!(response.msg_type, MsgType::HandshakeResp.code() as i16);
    assert_eq!(response.msg_no, 41);
    assert_eq!(response.rt, 0);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert!(body["server_time"].as_str().is_some());
    assert!(body["session_key"].as_str().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_handshake_is_answered_twice() {
    let (_server, _plane, mut client) = start().await;

    tcp_send(&mut client, &request(MsgType::HandshakeReq.code(), 1, &[])).await;
    tcp_send(&mut client, &request(MsgType::HandshakeReq.code(), 2, &[])).await;

    assert_eq!(tcp_recv(&mut client).await.msg_no, 1);
    assert_eq!(tcp_recv(&mut client).await.msg_no, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_frames_do_not_close_the_connection() {
    let (_server, _plane, mut client) = start().await;

    tcp_send(&mut client, &[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0, 0, 0]).await;
    let mut corrupt = request(MsgType::HandshakeReq.code(), 1, &[]);
    corrupt[0] ^= 0xff;
    tcp_send(&mut client, &corrupt).await;
    tcp_send(&mut client, &request(MsgType::HandshakeReq.code(), 3, &[])).await;

    assert_eq!(tcp_recv(&mut client).await.msg_no, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_length_prefix_closes_the_connection() {
    let (server, _plane, mut client) = start().await;
    tcp_send(&mut client, &request(MsgType::HandshakeReq.code(), 1, &[])).await;
    tcp_recv(&mut client).await;

    client.write_all(&5000u16.to_be_bytes()).await.unwrap();
    assert!(tcp_closed(&mut client).await);
    assert!(server.registry().wait_empty(Duration::from_secs(5)).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn frames_reach_the_backend_in_order() {
    let (_server, mut plane, mut client) = start().await;

    for msg_no in 0..100 {
        tcp_send(&mut client, &request(MsgType::MoveReq.code(), msg_no, b"{}")).await;
    }
    for expected in 0..100 {
        let mail = tokio::time::timeout(Duration::from_secs(5), plane.world.recv())
            .await
            .unwrap()
            .unwrap();
        match mail.envelope.payload {
            Letter::Edge(edge) => assert_eq!(edge.msg_no, expected),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_replies_reach_the_client() {
    let (_server, mut plane, mut client) = start().await;

    tcp_send(&mut client, &request(MsgType::LoginReq.code(), 9, br#"{"app_id":"42"}"#)).await;
    let mail = plane.portal.recv().await.unwrap();
    let Letter::Edge(request) = &mail.envelope.payload else {
        panic!("expected an edge letter");
    };
    let reply = mail.envelope.reply(Letter::Edge(EdgeLetter {
        msg_type: MsgType::LoginResp.code(),
        msg_no: request.msg_no,
        session_id: request.session_id,
        body: br#"{"rt":0}"#.to_vec(),
    }));
    mail.reply_to.unwrap().send(Mail::new(reply)).unwrap();

    let response = tcp_recv(&mut client).await;
    assert_eq!(response.msg_type, MsgType::LoginResp.code() as i16);
    assert_eq!(response.msg_no, 9);
    assert_eq!(response.body, br#"{"rt":0}"#);
}

#[tokio::test(flavor = "multi_thread")]
async fn eviction_hangs_up_the_client() {
    let (server, mut plane, mut client) = start().await;

    tcp_send(&mut client, &request(MsgType::LoginReq.code(), 1, b"{}")).await;
    let mail = plane.portal.recv().await.unwrap();
    let session_id = mail.envelope.session_id();
    let evict = mail.envelope.reply(Letter::Evict(EvictLetter {
        session_id,
        reason: "test".to_string(),
    }));
    mail.reply_to.unwrap().send(Mail::new(evict)).unwrap();

    assert!(tcp_closed(&mut client).await);
    assert!(server.registry().wait_empty(Duration::from_secs(5)).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_closes_every_connection() {
    let (server, _plane, first) = start().await;
    let addr = server.local_addr().unwrap();
    let mut clients = vec![first];
    for _ in 0..2 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    for (n, client) in clients.iter_mut().enumerate() {
        tcp_send(client, &request(MsgType::HandshakeReq.code(), n as i32, &[])).await;
        tcp_recv(client).await;
    }
    assert_eq!(server.registry().len(), 3);

    server.stop(Duration::from_secs(5)).await.unwrap();

    for client in clients.iter_mut() {
        assert!(tcp_closed(client).await);
    }
    assert!(server.registry().is_empty());
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn bind_conflict_is_reported() {
    let (server, plane, _client) = start().await;
    let taken = server.local_addr().unwrap();

    let mut config = (*config()).clone();
    config.tcp_bind_address = taken;
    let second = TcpServer::new(
        std::sync::Arc::new(config),
        plane.backends.clone(),
        &Logger::detached(),
    );
    let err = second.start(ShutdownState::new()).await.unwrap_err();
    assert!(matches!(err, edge_gateway::GatewayError::BindFailed { .. }));
}
