//! Frame checksum.
//!
//! Frames carry a CRC-16/CCITT-FALSE checksum (poly 0x1021, init 0xFFFF, no
//! reflection). The algorithm is pinned by [`ALGORITHM`]; swapping it only
//! requires changing that constant.

use crc::{Crc, CRC_16_IBM_3740};

/// The checksum algorithm used on the wire.
pub const ALGORITHM: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Size of the trailing checksum field in bytes.
pub const CHECKSUM_LEN: usize = 2;

/// Computes the checksum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    ALGORITHM.checksum(bytes)
}

/// Appends the big-endian checksum of `frame` to it.
pub fn append_checksum(frame: &mut Vec<u8>) {
    let sum = checksum(frame);
    frame.extend_from_slice(&sum.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn golden_vector() {
        assert_eq!(checksum(b"123456789"), 0x29B1);
    }

    #[test]
    fn empty_input_is_the_init_value() {
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn append_writes_big_endian() {
        let mut frame = b"123456789".to_vec();
        append_checksum(&mut frame);
        assert_eq!(&frame[9..], &[0x29, 0xB1]);
    }
}
