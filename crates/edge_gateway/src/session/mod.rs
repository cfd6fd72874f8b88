//! Client sessions: state, ids and the session actor.

pub mod actor;
pub mod id;
pub mod state;

pub use actor::{SessionActor, SessionMessage, SessionState};
pub use id::{next_session_id, SessionIdGenerator};
pub use state::{EnqueueError, HandshakeState, Session};
