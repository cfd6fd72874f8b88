//! # Overmind Kit
//!
//! Shared substrate for the Overmind multiplayer backend. Both the edge
//! gateway and the backend actors build on the pieces in this crate:
//!
//! * [`envelope`] - the internal routing message, its closed set of letters
//!   and the reply address carried with it
//! * [`msg_type`] - wire message type enumeration
//! * [`shutdown`] - awaitable shutdown flags for processes, listeners and connections
//! * [`log`] - the logger facade handed to component constructors
//! * [`utils`] - timestamp helpers
//!
//! ## Message Flow
//!
//! 1. The gateway wraps a decoded client frame into an [`Envelope`] holding an
//!    [`EdgeLetter`]
//! 2. The envelope is cast as [`Mail`] to a backend `ractor` actor, with the
//!    session actor as [`ReplyTo`] address
//! 3. The backend answers with [`Envelope::reply`], which keeps the trace id
//! 4. The session actor re-encodes the reply for the client

pub mod envelope;
pub mod log;
pub mod msg_type;
pub mod shutdown;
pub mod utils;

pub use envelope::{EdgeLetter, Envelope, EvictLetter, Letter, Mail, ReplyError, ReplyTo};
pub use log::Logger;
pub use msg_type::{MsgType, UnknownMsgType};
pub use shutdown::ShutdownState;
pub use utils::current_timestamp_nanos;
