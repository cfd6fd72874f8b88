//! Portal actor: the entry point for login.

use crate::{actor_logger, reply};
use overmind_kit::{EdgeLetter, Letter, Logger, Mail, MsgType};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Token handed out by the mock login.
pub const MOCK_TOKEN: &str = "mock-token-123456";

#[derive(Debug, Deserialize)]
struct LoginReq {
    app_id: String,
}

#[derive(Debug, Serialize)]
struct LoginResp {
    rt: i32,
    token: String,
    player_id: String,
}

/// Handles login requests with a fixed mock token.
#[derive(Debug, Default)]
pub struct PortalActor;

impl PortalActor {
    pub fn new() -> Self {
        Self
    }

    fn login(&self, mail: &Mail, edge: &EdgeLetter) {
        let request: LoginReq = match serde_json::from_slice(&edge.body) {
            Ok(request) => request,
            Err(e) => {
                warn!("Malformed login body from session {}: {}", edge.session_id, e);
                return;
            }
        };
        info!("🔑 Processing login for app {}", request.app_id);

        let response = LoginResp {
            rt: 0,
            token: MOCK_TOKEN.to_string(),
            player_id: format!("player-{}", request.app_id),
        };
        match serde_json::to_vec(&response) {
            Ok(body) => reply(mail, edge, MsgType::LoginResp.code(), body),
            Err(e) => warn!("Failed to serialize login response: {}", e),
        }
    }
}

impl Actor for PortalActor {
    type Msg = Mail;
    type State = Logger;
    type Arguments = Logger;

    async fn pre_start(&self, myself: ActorRef<Mail>, parent: Logger) -> Result<Logger, ActorProcessingErr> {
        let logger = actor_logger(&parent, &myself);
        logger.in_scope(|| info!("🚪 Portal actor started"));
        Ok(logger)
    }

    async fn handle(&self, _myself: ActorRef<Mail>, mail: Mail, logger: &mut Logger) -> Result<(), ActorProcessingErr> {
        logger
            .with_trace_id(&mail.envelope.trace_id)
            .in_scope(|| match &mail.envelope.payload {
                Letter::Edge(edge) => match MsgType::try_from(edge.msg_type) {
                    Ok(MsgType::LoginReq) => self.login(&mail, edge),
                    _ => debug!("Portal ignoring message type {}", edge.msg_type),
                },
                Letter::Evict(evict) => debug!("Portal ignoring eviction of session {}", evict.session_id),
            });
        Ok(())
    }

    async fn post_stop(&self, _myself: ActorRef<Mail>, logger: &mut Logger) -> Result<(), ActorProcessingErr> {
        logger.in_scope(|| info!("🚪 Portal actor stopped"));
        Ok(())
    }
}
