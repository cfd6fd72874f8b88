//! Internal routing messages exchanged between the gateway and backend actors.
//!
//! An [`Envelope`] carries trace metadata around exactly one [`Letter`]. The
//! letter kinds form a closed set so every receiver matches them
//! exhaustively. A [`Mail`] is what actually travels through a mailbox: the
//! envelope plus the address a reply should be sent to.

use crate::utils::current_timestamp_nanos;
use ractor::{ActorRef, Message};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Routing message with trace metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unix timestamp in nanoseconds at which the envelope was stamped
    pub timestamp: i64,
    /// Correlates a request with its replies across actors
    pub trace_id: String,
    /// The letter being carried
    pub payload: Letter,
}

impl Envelope {
    /// Wraps a letter, stamping the current time.
    pub fn new(trace_id: impl Into<String>, payload: Letter) -> Self {
        Self {
            timestamp: current_timestamp_nanos(),
            trace_id: trace_id.into(),
            payload,
        }
    }

    /// Builds a reply to `self`: fresh timestamp, same trace id.
    pub fn reply(&self, payload: Letter) -> Self {
        Self::new(self.trace_id.clone(), payload)
    }

    /// The session this envelope concerns, whatever the letter kind.
    pub fn session_id(&self) -> i64 {
        match &self.payload {
            Letter::Edge(edge) => edge.session_id,
            Letter::Evict(evict) => evict.session_id,
        }
    }
}

/// Every letter kind the gateway and backends exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Letter {
    /// One client request or response crossing the edge
    Edge(EdgeLetter),
    /// Instruction from a backend to drop a client session
    Evict(EvictLetter),
}

/// A client request or response, as seen by the backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeLetter {
    pub msg_type: i32,
    pub msg_no: i32,
    pub session_id: i64,
    pub body: Vec<u8>,
}

/// Forced eviction of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictLetter {
    pub session_id: i64,
    pub reason: String,
}

/// The reply address is gone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reply address {0} is no longer running")]
pub struct ReplyError(pub String);

/// Address a reply [`Mail`] is cast to.
///
/// Backends only ever see `Mail`, while the actor waiting for the reply may
/// accept a wider message type. `ReplyTo` erases that type so any actor
/// whose message can be built from `Mail` can be replied to.
#[derive(Clone)]
pub struct ReplyTo {
    name: Arc<str>,
    cast: Arc<dyn Fn(Mail) -> Result<(), ReplyError> + Send + Sync>,
}

impl ReplyTo {
    /// Replies are cast to `actor`.
    pub fn actor<M>(actor: &ActorRef<M>) -> Self
    where
        M: From<Mail> + Message,
    {
        let name: Arc<str> = match actor.get_name() {
            Some(name) => Arc::from(name),
            None => Arc::from(actor.get_id().to_string()),
        };
        let target = actor.clone();
        let gone = name.clone();
        Self {
            name,
            cast: Arc::new(move |mail: Mail| {
                target
                    .cast(M::from(mail))
                    .map_err(|_| ReplyError(gone.to_string()))
            }),
        }
    }

    /// Registered name of the actor behind this address, or its id.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Casts a reply. Never blocks.
    pub fn send(&self, mail: Mail) -> Result<(), ReplyError> {
        (self.cast)(mail)
    }
}

impl fmt::Debug for ReplyTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReplyTo").field(&self.name).finish()
    }
}

/// An envelope in transit, with the address replies should go to.
#[derive(Debug, Clone)]
pub struct Mail {
    pub envelope: Envelope,
    pub reply_to: Option<ReplyTo>,
}

impl Mail {
    /// Mail that expects no reply.
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            reply_to: None,
        }
    }

    /// Mail whose replies go to `reply_to`.
    pub fn with_reply_to(envelope: Envelope, reply_to: ReplyTo) -> Self {
        Self {
            envelope,
            reply_to: Some(reply_to),
        }
    }
}
