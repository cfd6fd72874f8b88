//! # Backend Actors
//!
//! Mock-level backends reached through the edge gateway. They only exercise
//! the envelope contract: every request arrives as [`overmind_kit::Mail`]
//! and every answer goes back to the mail's reply-to address with the
//! request's trace id.
//!
//! * [`PortalActor`] - login
//! * [`WorldActor`] - owns the cell grid and routes requests to cells
//! * [`CellActor`] - one spatial chunk and the sessions present in it
//!
//! All three are `ractor` actors taking the parent [`Logger`] as their
//! startup argument.

pub mod cell;
pub mod portal;
pub mod world;

pub use cell::CellActor;
pub use portal::PortalActor;
pub use world::WorldActor;

use overmind_kit::{EdgeLetter, Letter, Logger, Mail};
use ractor::ActorRef;
use tracing::{debug, warn};

/// Child logger named after the actor, or its id when unnamed.
pub(crate) fn actor_logger(parent: &Logger, myself: &ActorRef<Mail>) -> Logger {
    match myself.get_name() {
        Some(name) => parent.actor(&name),
        None => parent.actor(&myself.get_id().to_string()),
    }
}

/// Sends a reply to `request` carrying `msg_type` and `body`.
///
/// The reply keeps the trace id of the mail it answers.
pub(crate) fn reply(mail: &Mail, request: &EdgeLetter, msg_type: i32, body: Vec<u8>) {
    let Some(reply_to) = &mail.reply_to else {
        debug!("No reply address, dropping type {}", msg_type);
        return;
    };
    let envelope = mail.envelope.reply(Letter::Edge(EdgeLetter {
        msg_type,
        msg_no: request.msg_no,
        session_id: request.session_id,
        body,
    }));
    if let Err(e) = reply_to.send(Mail::new(envelope)) {
        warn!("Reply lost: {}", e);
    }
}
