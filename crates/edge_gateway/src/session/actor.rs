//! The per-connection session actor.
//!
//! One `ractor` actor runs per client connection. It is the only code that
//! touches the connection's [`Session`], receiving decoded packets from the
//! inbound pump and reply mail from the backends through the same mailbox,
//! so the two sources are serialized without locks.

use super::state::{EnqueueError, HandshakeState, Session};
use crate::protocol::{encode, Packet};
use crate::routing::{self, Backends, Inbound, Route};
use overmind_kit::{current_timestamp_nanos, Logger, Mail, MsgType, ReplyTo};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

/// Mailbox message of a [`SessionActor`].
#[derive(Debug)]
pub enum SessionMessage {
    /// A decoded client frame
    Packet(Packet),
    /// A backend reply or instruction
    Mail(Mail),
}

impl From<Packet> for SessionMessage {
    fn from(packet: Packet) -> Self {
        SessionMessage::Packet(packet)
    }
}

impl From<Mail> for SessionMessage {
    fn from(mail: Mail) -> Self {
        SessionMessage::Mail(mail)
    }
}

/// Client packet classification used by the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    Handshake,
    Heartbeat,
    Forward(Route),
    /// Known type that clients must not send
    Reserved(MsgType),
    Unknown,
}

impl MsgKind {
    pub fn classify(msg_type: i32) -> MsgKind {
        match MsgType::try_from(msg_type) {
            Ok(MsgType::HandshakeReq) => MsgKind::Handshake,
            Ok(MsgType::Heartbeat) => MsgKind::Heartbeat,
            Ok(kind) => match Route::of(kind) {
                Route::Local => MsgKind::Reserved(kind),
                route => MsgKind::Forward(route),
            },
            Err(_) => MsgKind::Unknown,
        }
    }
}

/// What the actor does with a client packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Handshake,
    Acknowledge,
    Forward(Route),
    RefuseUnauthenticated,
    Drop,
}

/// The dispatch table, keyed on handshake state and packet kind.
pub fn dispatch(state: HandshakeState, kind: MsgKind, require_handshake: bool) -> Action {
    match (state, kind) {
        (_, MsgKind::Handshake) => Action::Handshake,
        (_, MsgKind::Heartbeat) => Action::Acknowledge,
        (HandshakeState::PreAuth, MsgKind::Forward(_)) if require_handshake => Action::RefuseUnauthenticated,
        (_, MsgKind::Forward(route)) => Action::Forward(route),
        (_, MsgKind::Reserved(_)) | (_, MsgKind::Unknown) => Action::Drop,
    }
}

#[derive(Debug, Serialize)]
struct HandshakeBody<'a> {
    rt: i32,
    server_time: String,
    session_key: &'a str,
}

/// Placeholder until a real key exchange is defined for the protocol.
const SESSION_KEY_PLACEHOLDER: &str = "new-session-key";

/// Actor owning one client session.
///
/// The handler holds what every session of a listener shares. The
/// connection itself lives in the actor's [`SessionState`].
pub struct SessionActor {
    backends: Backends,
    require_handshake: bool,
}

/// Per-connection state of a [`SessionActor`].
pub struct SessionState {
    pub session: Session,
    /// Logger scoped to the connection
    pub logger: Logger,
}

impl SessionActor {
    pub fn new(backends: Backends, require_handshake: bool) -> Self {
        Self {
            backends,
            require_handshake,
        }
    }

    fn handle_packet(&self, myself: &ActorRef<SessionMessage>, state: &mut SessionState, packet: Packet) {
        let session = &mut state.session;
        let kind = MsgKind::classify(packet.msg_type);
        trace!(
            "📥 Packet type={} no={} len={} state={:?}",
            packet.msg_type,
            packet.msg_no,
            packet.body.len(),
            session.state()
        );

        match dispatch(session.state(), kind, self.require_handshake) {
            Action::Handshake => handshake(session, &packet),
            Action::Acknowledge => trace!("💓 Heartbeat from session {}", session.id()),
            Action::Forward(route) => self.forward(myself, session, &state.logger, &packet, route),
            Action::RefuseUnauthenticated => warn!(
                "🔒 Session {} sent type {} before handshake, dropping",
                session.id(),
                packet.msg_type
            ),
            Action::Drop => debug!(
                "🗑️ Dropping packet of type {} from session {}",
                packet.msg_type,
                session.id()
            ),
        }
    }

    fn forward(
        &self,
        myself: &ActorRef<SessionMessage>,
        session: &Session,
        logger: &Logger,
        packet: &Packet,
        route: Route,
    ) {
        let envelope = match routing::to_envelope(packet, session.id()) {
            Ok((_, envelope)) => envelope,
            Err(e) => {
                debug!("Dropping untranslatable packet: {}", e);
                return;
            }
        };
        let Some(backend) = self.backends.for_route(route) else {
            return;
        };

        logger.with_trace_id(&envelope.trace_id).in_scope(|| {
            let backend_name = backend.get_name().unwrap_or_default();
            match backend.cast(Mail::with_reply_to(envelope, ReplyTo::actor(myself))) {
                Ok(()) => trace!("📤 Forwarded type {} to {}", packet.msg_type, backend_name),
                Err(_) => warn!("Backend {} unavailable, dropping type {}", backend_name, packet.msg_type),
            }
        });
    }

    fn handle_mail(&self, myself: &ActorRef<SessionMessage>, state: &mut SessionState, mail: Mail) {
        let logger = state.logger.with_trace_id(&mail.envelope.trace_id);
        let session = &state.session;
        logger.in_scope(|| match routing::open(mail.envelope) {
            Ok(Inbound::Deliver(edge)) => {
                if edge.session_id != session.id() {
                    warn!(
                        "Reply for session {} reached session {}, dropping",
                        edge.session_id,
                        session.id()
                    );
                    return;
                }
                trace!("📨 Reply type {}", edge.msg_type);
                send_to_client(session, edge.msg_type, edge.msg_no, &edge.body);
            }
            Ok(Inbound::Evict(evict)) => {
                if evict.session_id != session.id() {
                    warn!(
                        "Eviction of session {} reached session {}, dropping",
                        evict.session_id,
                        session.id()
                    );
                    return;
                }
                info!("👢 Evicting session {}: {}", session.id(), evict.reason);
                session.hang_up();
                myself.stop(Some(evict.reason));
            }
            Err(e) => warn!("Dropping backend reply: {}", e),
        });
    }
}

fn handshake(session: &mut Session, packet: &Packet) {
    let body = HandshakeBody {
        rt: 0,
        server_time: current_timestamp_nanos().to_string(),
        session_key: SESSION_KEY_PLACEHOLDER,
    };
    let body = match serde_json::to_vec(&body) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize handshake response: {}", e);
            return;
        }
    };

    session.authenticate();
    debug!("🤝 Handshake completed for session {}", session.id());
    send_to_client(session, MsgType::HandshakeResp.code(), packet.msg_no, &body);
}

fn send_to_client(session: &Session, msg_type: i32, msg_no: i32, body: &[u8]) {
    let frame = match encode(msg_type, msg_no, 0, body) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Failed to encode response: {}", e);
            return;
        }
    };
    match session.enqueue(frame) {
        // A full queue is already reported by the session.
        Ok(()) | Err(EnqueueError::Full) => {}
        Err(EnqueueError::Closed) => debug!(
            "Outbound queue of session {} closed, dropping type {}",
            session.id(),
            msg_type
        ),
    }
}

impl Actor for SessionActor {
    type Msg = SessionMessage;
    type State = SessionState;
    type Arguments = SessionState;

    async fn pre_start(
        &self,
        _myself: ActorRef<SessionMessage>,
        state: SessionState,
    ) -> Result<SessionState, ActorProcessingErr> {
        state.logger.in_scope(|| {
            info!(
                "🔗 Session {} started on {}",
                state.session.id(),
                state.session.protocol()
            )
        });
        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<SessionMessage>,
        message: SessionMessage,
        state: &mut SessionState,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SessionMessage::Packet(packet) => {
                let logger = state.logger.clone();
                logger.in_scope(|| self.handle_packet(&myself, state, packet));
            }
            SessionMessage::Mail(mail) => self.handle_mail(&myself, state, mail),
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<SessionMessage>,
        state: &mut SessionState,
    ) -> Result<(), ActorProcessingErr> {
        state.session.hang_up();
        state
            .logger
            .in_scope(|| info!("🔌 Session {} stopped", state.session.id()));
        Ok(())
    }
}
