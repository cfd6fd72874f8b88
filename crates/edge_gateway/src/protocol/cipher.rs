//! Block cipher applied to client frames.
//!
//! Client payloads are AES in ECB mode with PKCS#7 padding. ECB leaks
//! equal-block patterns and the key is shared by every client; both are
//! properties of the client protocol and are kept as-is here.

use super::codec::CodecError;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use std::fmt;

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Development key shipped with the client SDK. Never use it in production.
pub const DEV_SHARED_KEY: &[u8; 16] = b"EDb35olv1SRQG5NT";

#[derive(Clone)]
enum Engine {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

/// A validated AES key with its expanded round keys.
#[derive(Clone)]
pub struct CipherKey {
    engine: Engine,
}

impl CipherKey {
    /// Builds a key from raw bytes. Accepts 16, 24 or 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CodecError> {
        let engine = match key.len() {
            16 => Aes128::new_from_slice(key).map(Engine::Aes128),
            24 => Aes192::new_from_slice(key).map(Engine::Aes192),
            32 => Aes256::new_from_slice(key).map(Engine::Aes256),
            other => return Err(CodecError::InvalidKeyLength(other)),
        }
        .map_err(|_| CodecError::InvalidKeyLength(key.len()))?;
        Ok(Self { engine })
    }

    /// The well-known development key.
    pub fn development() -> Self {
        Self {
            engine: Engine::Aes128(Aes128::new(GenericArray::from_slice(DEV_SHARED_KEY))),
        }
    }

    /// Key size in bytes.
    pub fn size(&self) -> usize {
        match self.engine {
            Engine::Aes128(_) => 16,
            Engine::Aes192(_) => 24,
            Engine::Aes256(_) => 32,
        }
    }

    /// Decrypts `buf` in place, block by block.
    pub fn decrypt_in_place(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
            return Err(CodecError::MalformedCiphertext(buf.len()));
        }
        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(chunk);
            match &self.engine {
                Engine::Aes128(c) => c.decrypt_block(block),
                Engine::Aes192(c) => c.decrypt_block(block),
                Engine::Aes256(c) => c.decrypt_block(block),
            }
        }
        Ok(())
    }

    /// Encrypts `buf` in place, block by block.
    pub fn encrypt_in_place(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
            return Err(CodecError::MalformedCiphertext(buf.len()));
        }
        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(chunk);
            match &self.engine {
                Engine::Aes128(c) => c.encrypt_block(block),
                Engine::Aes192(c) => c.encrypt_block(block),
                Engine::Aes256(c) => c.encrypt_block(block),
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherKey(AES-{}, <redacted>)", self.size() * 8)
    }
}

/// Pads `buf` to a whole number of blocks. Always adds at least one byte.
pub fn pad(buf: &mut Vec<u8>) {
    let pad = BLOCK_SIZE - buf.len() % BLOCK_SIZE;
    buf.resize(buf.len() + pad, pad as u8);
}

/// Strips padding and returns the plaintext length.
///
/// Only the final byte is inspected; a value of 0, above the block size or
/// above the buffer length is rejected.
pub fn unpad(buf: &[u8]) -> Result<usize, CodecError> {
    let Some(&last) = buf.last() else {
        return Err(CodecError::BadPadding(0));
    };
    let pad = usize::from(last);
    if pad == 0 || pad > BLOCK_SIZE || pad > buf.len() {
        return Err(CodecError::BadPadding(last));
    }
    Ok(buf.len() - pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_aes_key_sizes() {
        for len in [16, 24, 32] {
            let key = CipherKey::new(&vec![7u8; len]).unwrap();
            assert_eq!(key.size(), len);
        }
        assert_eq!(CipherKey::new(&[0u8; 15]).unwrap_err(), CodecError::InvalidKeyLength(15));
    }

    #[test]
    fn encrypt_then_decrypt_restores_blocks() {
        let key = CipherKey::development();
        let plain = b"sixteen byte blk and a second one".to_vec();
        let mut buf = plain.clone();
        pad(&mut buf);
        key.encrypt_in_place(&mut buf).unwrap();
        assert_ne!(&buf[..plain.len()], &plain[..]);
        key.decrypt_in_place(&mut buf).unwrap();
        let len = unpad(&buf).unwrap();
        assert_eq!(&buf[..len], &plain[..]);
    }

    #[test]
    fn ecb_mode_repeats_equal_blocks() {
        let key = CipherKey::development();
        let mut buf = [0x41u8; 32];
        key.encrypt_in_place(&mut buf).unwrap();
        assert_eq!(buf[..16], buf[16..]);
    }

    #[test]
    fn full_block_of_padding_when_aligned() {
        let mut buf = vec![1u8; 16];
        pad(&mut buf);
        assert_eq!(buf.len(), 32);
        assert!(buf[16..].iter().all(|&b| b == 16));
    }

    #[test]
    fn rejects_bad_padding() {
        assert_eq!(unpad(&[1, 2, 0]), Err(CodecError::BadPadding(0)));
        assert_eq!(unpad(&[17; 32]), Err(CodecError::BadPadding(17)));
        assert_eq!(unpad(&[5, 5, 5]), Err(CodecError::BadPadding(5)));
        assert_eq!(unpad(&[]), Err(CodecError::BadPadding(0)));
    }

    #[test]
    fn rejects_partial_blocks() {
        let key = CipherKey::development();
        let mut buf = [0u8; 17];
        assert_eq!(key.decrypt_in_place(&mut buf), Err(CodecError::MalformedCiphertext(17)));
    }

    #[test]
    fn debug_hides_key_material() {
        let rendered = format!("{:?}", CipherKey::development());
        assert!(!rendered.contains("EDb35"));
        assert!(rendered.contains("AES-128"));
    }
}
