//! Wire protocol: framing, checksum and cipher.
//!
//! Everything in here is a pure function over byte slices. The transports
//! call [`decode`] on each physical frame and the session actor calls
//! [`encode`] on each response.

pub mod cipher;
pub mod codec;
pub mod crc16;

pub use cipher::{CipherKey, BLOCK_SIZE, DEV_SHARED_KEY};
pub use codec::{decode, decode_response, encode, encode_request, CodecError, OutboundFrame, Packet};
