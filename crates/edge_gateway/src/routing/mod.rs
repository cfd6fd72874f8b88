//! Routing bridge between wire packets and internal envelopes.
//!
//! This is the only place that knows which backend handles which message
//! type. Everything here is pure translation; failures are returned as
//! [`BridgeError`] for the caller to log before dropping the message.

use crate::protocol::Packet;
use overmind_kit::{EdgeLetter, Envelope, EvictLetter, Letter, Mail, MsgType, UnknownMsgType};
use ractor::{registry, ActorRef};
use uuid::Uuid;

/// Name the portal actor is registered under.
pub const PORTAL_ACTOR: &str = "portal";

/// Name the world actor is registered under.
pub const WORLD_ACTOR: &str = "world";

/// Where a message type is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Answered by the session actor itself
    Local,
    /// Login and account traffic
    Portal,
    /// Spatial simulation traffic
    World,
}

impl Route {
    /// Routing table for every known message type.
    pub fn of(kind: MsgType) -> Route {
        match kind {
            MsgType::LoginReq => Route::Portal,
            MsgType::EnterWorldReq | MsgType::MoveReq => Route::World,
            MsgType::HandshakeReq
            | MsgType::HandshakeResp
            | MsgType::Heartbeat
            | MsgType::LoginResp
            | MsgType::EnterWorldResp => Route::Local,
        }
    }
}

/// Translation failures. Never fatal to a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    UnknownMsgType(#[from] UnknownMsgType),

    /// The message type is not forwarded to any backend
    #[error("message type {0} is handled locally")]
    LocalOnly(MsgType),

    /// A backend reply cannot be sent to a client as-is
    #[error("malformed backend reply: {0}")]
    MalformedReply(String),
}

/// A backend reply, unwrapped for the session actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Deliver(EdgeLetter),
    Evict(EvictLetter),
}

/// Wraps a client packet into a fresh envelope bound for its backend.
///
/// # Returns
///
/// The backend route together with an envelope stamped with the current time
/// and a new trace id.
pub fn to_envelope(packet: &Packet, session_id: i64) -> Result<(Route, Envelope), BridgeError> {
    let kind = MsgType::try_from(packet.msg_type)?;
    let route = Route::of(kind);
    if route == Route::Local {
        return Err(BridgeError::LocalOnly(kind));
    }

    let letter = Letter::Edge(EdgeLetter {
        msg_type: packet.msg_type,
        msg_no: packet.msg_no,
        session_id,
        body: packet.body.clone(),
    });
    Ok((route, Envelope::new(Uuid::new_v4().to_string(), letter)))
}

/// Unwraps an envelope arriving at a session actor.
pub fn open(envelope: Envelope) -> Result<Inbound, BridgeError> {
    match envelope.payload {
        Letter::Edge(edge) => {
            if i16::try_from(edge.msg_type).is_err() {
                return Err(BridgeError::MalformedReply(format!(
                    "message type {} does not fit the response header",
                    edge.msg_type
                )));
            }
            MsgType::try_from(edge.msg_type)?;
            Ok(Inbound::Deliver(edge))
        }
        Letter::Evict(evict) => Ok(Inbound::Evict(evict)),
    }
}

/// Addresses of the backend actors a session forwards to.
#[derive(Debug, Clone)]
pub struct Backends {
    portal: ActorRef<Mail>,
    world: ActorRef<Mail>,
}

impl Backends {
    pub fn new(portal: ActorRef<Mail>, world: ActorRef<Mail>) -> Self {
        Self { portal, world }
    }

    /// Resolves both backends by their registered names.
    ///
    /// # Returns
    ///
    /// `None` if either actor is not running under the given name.
    pub fn lookup(portal: &str, world: &str) -> Option<Self> {
        let portal = registry::where_is(portal.to_string())?;
        let world = registry::where_is(world.to_string())?;
        Some(Self::new(portal.into(), world.into()))
    }

    /// Address for a route; `None` for [`Route::Local`].
    pub fn for_route(&self, route: Route) -> Option<&ActorRef<Mail>> {
        match route {
            Route::Local => None,
            Route::Portal => Some(&self.portal),
            Route::World => Some(&self.world),
        }
    }
}
