//! Wire message type enumeration shared by the gateway and the backends.
//!
//! Values are fixed by the client protocol. The gateway widens the unsigned
//! 16-bit wire field to `i32`, so every value here must fit in `u16` for
//! inbound use and in `i16` for outbound use.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every message type the gateway and its backends understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum MsgType {
    HandshakeReq = 1,
    HandshakeResp = 2,
    Heartbeat = 3,
    LoginReq = 1001,
    LoginResp = 1002,
    EnterWorldReq = 2001,
    EnterWorldResp = 2002,
    MoveReq = 2003,
}

impl MsgType {
    /// All known message types, in wire-value order.
    pub const ALL: [MsgType; 8] = [
        MsgType::HandshakeReq,
        MsgType::HandshakeResp,
        MsgType::Heartbeat,
        MsgType::LoginReq,
        MsgType::LoginResp,
        MsgType::EnterWorldReq,
        MsgType::EnterWorldResp,
        MsgType::MoveReq,
    ];

    /// The numeric wire value.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Upper-case protocol name, as used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            MsgType::HandshakeReq => "HANDSHAKE_REQ",
            MsgType::HandshakeResp => "HANDSHAKE_RESP",
            MsgType::Heartbeat => "HEARTBEAT",
            MsgType::LoginReq => "LOGIN_REQ",
            MsgType::LoginResp => "LOGIN_RESP",
            MsgType::EnterWorldReq => "ENTER_WORLD_REQ",
            MsgType::EnterWorldResp => "ENTER_WORLD_RESP",
            MsgType::MoveReq => "MOVE_REQ",
        }
    }
}

/// Returned when a wire value does not name a known [`MsgType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown message type {0}")]
pub struct UnknownMsgType(pub i32);

impl TryFrom<i32> for MsgType {
    type Error = UnknownMsgType;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        MsgType::ALL
            .into_iter()
            .find(|kind| kind.code() == value)
            .ok_or(UnknownMsgType(value))
    }
}

impl From<MsgType> for i32 {
    fn from(kind: MsgType) -> Self {
        kind.code()
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
