//! Frame encoding and decoding.
//!
//! Inbound (client to server) frames are
//!
//! ```text
//! AES-ECB( u16 msg_type | i32 msg_no | body | PKCS#7 padding ) | u16 crc16
//! ```
//!
//! and outbound (server to client) frames are sent in the clear:
//!
//! ```text
//! i16 msg_type | i32 msg_no | i16 rt | body | u16 crc16
//! ```
//!
//! All integers are big-endian. The checksum always covers the bytes that
//! precede it. The inbound header has no `rt` field.

use super::cipher::{self, CipherKey};
use super::crc16::{self, CHECKSUM_LEN};

/// Size of the decrypted inbound header.
pub const REQUEST_HEADER_LEN: usize = 6;

/// Size of the outbound header.
pub const RESPONSE_HEADER_LEN: usize = 8;

/// Errors raised while encoding or decoding a frame.
///
/// Every variant is terminal for a single frame only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Frame is shorter than the smallest valid frame
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    /// Trailing checksum does not match the frame contents
    #[error("checksum mismatch: expected {expected:#06x}, received {received:#06x}")]
    InvalidChecksum { expected: u16, received: u16 },

    /// Ciphertext length is not a positive multiple of the block size
    #[error("ciphertext of {0} bytes is not block aligned")]
    MalformedCiphertext(usize),

    /// Padding byte is zero, larger than a block, or larger than the buffer
    #[error("invalid padding value {0}")]
    BadPadding(u8),

    /// Decrypted payload cannot hold a header
    #[error("payload of {0} bytes is shorter than the header")]
    HeaderTruncated(usize),

    /// A header field does not fit its wire width
    #[error("{field} value {value} does not fit the wire field")]
    FieldOutOfRange { field: &'static str, value: i32 },

    /// Key is not a valid AES key size
    #[error("invalid cipher key length: {0} bytes")]
    InvalidKeyLength(usize),
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Wire message type, widened from its unsigned 16-bit field
    pub msg_type: i32,
    /// Client-chosen sequence number echoed in the response
    pub msg_no: i32,
    pub body: Vec<u8>,
}

/// A parsed server response, as a client sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub msg_type: i16,
    pub msg_no: i32,
    /// Result code, 0 on success
    pub rt: i16,
    pub body: Vec<u8>,
}

/// Decodes one inbound frame.
///
/// The checksum is verified before anything is decrypted.
///
/// # Arguments
///
/// * `raw` - The complete frame as read from the transport
/// * `key` - Key the client encrypted the frame with
///
/// # Returns
///
/// The decoded [`Packet`], or the first [`CodecError`] met.
pub fn decode(raw: &[u8], key: &CipherKey) -> Result<Packet, CodecError> {
    if raw.len() < CHECKSUM_LEN + REQUEST_HEADER_LEN {
        return Err(CodecError::TooShort(raw.len()));
    }

    let (payload, trailer) = raw.split_at(raw.len() - CHECKSUM_LEN);
    verify_checksum(payload, trailer)?;

    let mut plain = payload.to_vec();
    key.decrypt_in_place(&mut plain)?;
    let len = cipher::unpad(&plain)?;
    plain.truncate(len);

    if plain.len() < REQUEST_HEADER_LEN {
        return Err(CodecError::HeaderTruncated(plain.len()));
    }
    let msg_type = u16::from_be_bytes([plain[0], plain[1]]);
    let msg_no = i32::from_be_bytes([plain[2], plain[3], plain[4], plain[5]]);
    let body = plain.split_off(REQUEST_HEADER_LEN);

    Ok(Packet {
        msg_type: i32::from(msg_type),
        msg_no,
        body,
    })
}

/// Encodes one outbound frame.
///
/// # Arguments
///
/// * `msg_type` - Message type; must fit in `i16`
/// * `msg_no` - Sequence number of the request being answered
/// * `rt` - Result code; must fit in `i16`
/// * `body` - Serialized response body
pub fn encode(msg_type: i32, msg_no: i32, rt: i32, body: &[u8]) -> Result<Vec<u8>, CodecError> {
    let msg_type = narrow_i16("msg_type", msg_type)?;
    let rt = narrow_i16("rt", rt)?;

    let mut frame = Vec::with_capacity(RESPONSE_HEADER_LEN + body.len() + CHECKSUM_LEN);
    frame.extend_from_slice(&msg_type.to_be_bytes());
    frame.extend_from_slice(&msg_no.to_be_bytes());
    frame.extend_from_slice(&rt.to_be_bytes());
    frame.extend_from_slice(body);
    crc16::append_checksum(&mut frame);
    Ok(frame)
}

/// Encodes a client request. Used by tests and the player client.
pub fn encode_request(msg_type: i32, msg_no: i32, body: &[u8], key: &CipherKey) -> Result<Vec<u8>, CodecError> {
    let msg_type = u16::try_from(msg_type).map_err(|_| CodecError::FieldOutOfRange {
        field: "msg_type",
        value: msg_type,
    })?;

    let mut frame = Vec::with_capacity(REQUEST_HEADER_LEN + body.len() + cipher::BLOCK_SIZE + CHECKSUM_LEN);
    frame.extend_from_slice(&msg_type.to_be_bytes());
    frame.extend_from_slice(&msg_no.to_be_bytes());
    frame.extend_from_slice(body);
    cipher::pad(&mut frame);
    key.encrypt_in_place(&mut frame)?;
    crc16::append_checksum(&mut frame);
    Ok(frame)
}

/// Parses a server response frame. Used by tests and the player client.
pub fn decode_response(raw: &[u8]) -> Result<OutboundFrame, CodecError> {
    if raw.len() < RESPONSE_HEADER_LEN + CHECKSUM_LEN {
        return Err(CodecError::TooShort(raw.len()));
    }

    let (payload, trailer) = raw.split_at(raw.len() - CHECKSUM_LEN);
    verify_checksum(payload, trailer)?;

    Ok(OutboundFrame {
        msg_type: i16::from_be_bytes([payload[0], payload[1]]),
        msg_no: i32::from_be_bytes([payload[2], payload[3], payload[4], payload[5]]),
        rt: i16::from_be_bytes([payload[6], payload[7]]),
        body: payload[RESPONSE_HEADER_LEN..].to_vec(),
    })
}

fn verify_checksum(payload: &[u8], trailer: &[u8]) -> Result<(), CodecError> {
    let received = u16::from_be_bytes([trailer[0], trailer[1]]);
    let expected = crc16::checksum(payload);
    if expected != received {
        return Err(CodecError::InvalidChecksum { expected, received });
    }
    Ok(())
}

fn narrow_i16(field: &'static str, value: i32) -> Result<i16, CodecError> {
    i16::try_from(value).map_err(|_| CodecError::FieldOutOfRange { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use overmind_kit::MsgType;

    fn key() -> CipherKey {
        CipherKey::development()
    }

    #[test]
    fn request_round_trip() {
        let frame = encode_request(MsgType::LoginReq.code(), 42, br#"{"app_id":"7"}"#, &key()).unwrap();
        let packet = decode(&frame, &key()).unwrap();
        assert_eq!(
            packet,
            Packet {
                msg_type: 1001,
                msg_no: 42,
                body: br#"{"app_id":"7"}"#.to_vec(),
            }
        );
    }

    #[test]
    fn round_trip_across_every_padding_boundary() {
        for len in 0..=48usize {
            let body: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let frame = encode_request(MsgType::MoveReq.code(), len as i32, &body, &key()).unwrap();
            assert_eq!((frame.len() - CHECKSUM_LEN) % 16, 0, "len {len}");

            let packet = decode(&frame, &key()).unwrap();
            assert_eq!(packet.msg_type, MsgType::MoveReq.code(), "len {len}");
            assert_eq!(packet.msg_no, len as i32);
            assert_eq!(packet.body, body, "len {len}");
        }
    }

    #[test]
    fn header_only_request_decodes_with_empty_body() {
        let frame = encode_request(MsgType::Heartbeat.code(), -1, &[], &key()).unwrap();
        assert_eq!(frame.len(), 16 + CHECKSUM_LEN);
        let packet = decode(&frame, &key()).unwrap();
        assert_eq!(packet.msg_no, -1);
        assert!(packet.body.is_empty());
    }

    #[test]
    fn high_unsigned_msg_type_is_widened() {
        let frame = encode_request(0xFFFE, 1, &[], &key()).unwrap();
        assert_eq!(decode(&frame, &key()).unwrap().msg_type, 0xFFFE);
    }

    #[test]
    fn any_flipped_ciphertext_bit_fails_the_checksum() {
        let frame = encode_request(MsgType::MoveReq.code(), 9, b"x=1,y=2", &key()).unwrap();
        let ciphertext_len = frame.len() - CHECKSUM_LEN;
        for byte in 0..ciphertext_len {
            for bit in 0..8 {
                let mut corrupt = frame.clone();
                corrupt[byte] ^= 1 << bit;
                assert!(
                    matches!(decode(&corrupt, &key()), Err(CodecError::InvalidChecksum { .. })),
                    "byte {byte} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn short_frames_are_rejected() {
        assert_eq!(decode(&[0u8; 7], &key()), Err(CodecError::TooShort(7)));
        assert_eq!(decode(&[], &key()), Err(CodecError::TooShort(0)));
    }

    #[test]
    fn unaligned_ciphertext_is_rejected_after_checksum() {
        let mut frame = vec![0u8; 10];
        crc16::append_checksum(&mut frame);
        assert_eq!(decode(&frame, &key()), Err(CodecError::MalformedCiphertext(10)));
    }

    #[test]
    fn wrong_key_is_caught_by_padding_or_header() {
        let frame = encode_request(MsgType::LoginReq.code(), 1, &[], &key()).unwrap();
        let wrong = CipherKey::new(&[9u8; 16]).unwrap();
        // The checksum covers ciphertext only, so a wrong key gets past it.
        match decode(&frame, &wrong) {
            Err(CodecError::BadPadding(_)) | Err(CodecError::HeaderTruncated(_)) => {}
            Ok(packet) => {
                assert!(packet.body.len() <= 16 - REQUEST_HEADER_LEN);
                assert_ne!(
                    packet,
                    Packet {
                        msg_type: MsgType::LoginReq.code(),
                        msg_no: 1,
                        body: Vec::new(),
                    }
                );
            }
            Err(e) => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn truncated_plaintext_is_a_header_error() {
        // One block holding 3 plaintext bytes and 13 bytes of padding.
        let mut block = vec![0xAA, 0xBB, 0xCC];
        cipher::pad(&mut block);
        key().encrypt_in_place(&mut block).unwrap();
        crc16::append_checksum(&mut block);
        assert_eq!(decode(&block, &key()), Err(CodecError::HeaderTruncated(3)));
    }

    #[test]
    fn response_layout() {
        let frame = encode(MsgType::HandshakeResp.code(), 77, 0, b"ok").unwrap();
        assert_eq!(&frame[..8], &[0x00, 0x02, 0x00, 0x00, 0x00, 0x4D, 0x00, 0x00]);
        assert_eq!(&frame[8..10], b"ok");
        assert_eq!(frame.len(), RESPONSE_HEADER_LEN + 2 + CHECKSUM_LEN);

        let parsed = decode_response(&frame).unwrap();
        assert_eq!(parsed.msg_type, 2);
        assert_eq!(parsed.msg_no, 77);
        assert_eq!(parsed.rt, 0);
        assert_eq!(parsed.body, b"ok");
    }

    #[test]
    fn out_of_range_fields_are_refused() {
        assert_eq!(
            encode(40_000, 1, 0, &[]),
            Err(CodecError::FieldOutOfRange {
                field: "msg_type",
                value: 40_000
            })
        );
        assert_eq!(
            encode(1, 1, -40_000, &[]),
            Err(CodecError::FieldOutOfRange {
                field: "rt",
                value: -40_000
            })
        );
        assert!(matches!(
            encode_request(-1, 1, &[], &key()),
            Err(CodecError::FieldOutOfRange { field: "msg_type", .. })
        ));
    }

    #[test]
    fn corrupted_response_is_rejected() {
        let mut frame = encode(MsgType::LoginResp.code(), 3, 0, b"{}").unwrap();
        frame[4] ^= 0x10;
        assert!(matches!(decode_response(&frame), Err(CodecError::InvalidChecksum { .. })));
    }
}
