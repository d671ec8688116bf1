use bitvec::prelude::*;

use super::error::ParserError;

const PACKET_HEADER_LENGTH: usize = 7;
const PACKET_TRAILER_LENGTH: usize = 59;
const SAMPLES_START_BYTE_WITH_GPS: usize = 349;
const SAMPLES_START_BYTE_WITHOUT_GPS: usize = 351;

/// Reconstructs the contiguous per-sample bitstream from a session's raw
/// packets, then slices off the fixed-size header region that precedes
/// the samples.
///
/// Packet 0 keeps its header (useful for [`super::header::SessionInfo`]
/// but otherwise unused here); packets 1..n-2 drop the 7-byte header and
/// 59-byte trailer; the final packet drops the header and any trailing
/// zero padding.
pub fn samples_bits(raw_packets: &[Vec<u8>], has_gps: bool) -> Result<BitVec<Msb0, u8>, ParserError> {
    if raw_packets.is_empty() {
        return Err(ParserError::Invariant {
            field: "bitstream",
            detail: "session has no packets".to_string(),
        });
    }

    let mut bits: BitVec<Msb0, u8> = BitVec::new();
    let last = raw_packets.len() - 1;

    for (index, packet) in raw_packets.iter().enumerate() {
        let start = if index == 0 { 0 } else { PACKET_HEADER_LENGTH };
        let body: &[u8] = if index == last {
            let head = packet.get(start..).unwrap_or(&[]);
            strip_trailing_zeroes(head)
        } else {
            let end = packet.len().saturating_sub(PACKET_TRAILER_LENGTH);
            if end <= start {
                &[]
            } else {
                &packet[start..end]
            }
        };

        for &byte in body {
            bits.extend_from_bitslice(byte.view_bits::<Msb0>());
        }
    }

    let start_byte = if has_gps {
        SAMPLES_START_BYTE_WITH_GPS
    } else {
        SAMPLES_START_BYTE_WITHOUT_GPS
    };
    let start_bit = start_byte * 8;

    if start_bit > bits.len() {
        return Err(ParserError::Truncated { cursor: start_bit });
    }

    Ok(bits[start_bit..].to_bitvec())
}

fn strip_trailing_zeroes(bytes: &[u8]) -> &[u8] {
    let trimmed = bytes.len() - bytes.iter().rev().take_while(|&&b| b == 0).count();
    &bytes[..trimmed]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_zero_padding() {
        assert_eq!(strip_trailing_zeroes(&[1, 2, 3, 0, 0, 0]), &[1, 2, 3]);
        assert_eq!(strip_trailing_zeroes(&[0, 0, 0]), &[] as &[u8]);
        assert_eq!(strip_trailing_zeroes(&[1, 2, 3]), &[1, 2, 3]);
    }

    #[test]
    fn single_packet_without_gps_slices_header_off() {
        let mut packet = vec![0u8; 512];
        packet[SAMPLES_START_BYTE_WITHOUT_GPS] = 0b1010_0000;
        packet[SAMPLES_START_BYTE_WITHOUT_GPS + 1] = 0xFF;
        let bits = samples_bits(&[packet], false).unwrap();
        assert_eq!(
            bits[0..4].iter().map(|b| *b as u8).collect::<Vec<_>>(),
            vec![1, 0, 1, 0]
        );
    }
}
