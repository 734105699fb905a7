//! Reliable header and sub-packet header codec.
//!
//! All multi-byte fields are little-endian on the wire. A datagram is
//! one [`ReliableHeader`] followed by one or more sub-packet units, each
//! a [`SubPacketHeader`] and exactly `size` payload bytes.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use relgram_core::error::DecodingErrorKind;

use crate::SequenceNumber;

/// Sub-packet flag: this unit is a retransmission of an earlier sequence.
const RESEND_FLAG: u8 = 0x80;
/// Sub-packet flag: the size field spans two bytes.
const LONG_SIZE_FLAG: u8 = 0x40;
/// Low six bits of the first sub-packet header byte.
const SIZE_MASK: u8 = 0x3F;
/// Sizes at or above this need the long encoding.
const LONG_SIZE_THRESHOLD: usize = 64;
/// Largest size the two-byte encoding can carry.
pub const MAX_ENCODABLE_SIZE: usize = 0x3FFF;

/// Fixed 8-byte header carried by every reliable datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliableHeader {
    /// Sequence number of the first sub-packet in this datagram.
    pub sequence: SequenceNumber,
    /// Highest sequence the sender has received from us.
    pub ack: SequenceNumber,
    /// Bit `i` set means sequence `ack - (i + 1)` was received.
    pub ack_bits: u32,
}

impl ReliableHeader {
    /// Appends the encoded header to `buffer`.
    pub fn write_into(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.sequence.to_le_bytes());
        buffer.extend_from_slice(&self.ack.to_le_bytes());
        buffer.extend_from_slice(&self.ack_bits.to_le_bytes());
    }

    /// Reads a header from the cursor.
    pub fn read_from(cursor: &mut Cursor<&[u8]>) -> Result<Self, DecodingErrorKind> {
        let sequence = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| DecodingErrorKind::HeaderTruncated)?;
        let ack = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| DecodingErrorKind::HeaderTruncated)?;
        let ack_bits = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| DecodingErrorKind::HeaderTruncated)?;
        Ok(Self { sequence, ack, ack_bits })
    }
}

/// Variable-length header preceding each sub-packet payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubPacketHeader {
    /// Payload size in bytes.
    pub size: usize,
    /// Original sequence this sub-packet retransmits, if any.
    pub resend_of: Option<SequenceNumber>,
}

impl SubPacketHeader {
    /// Appends the encoded header to `buffer`.
    ///
    /// The long-size flag is set for any size of 64 or above, and the
    /// resend trailer is emitted whenever `resend_of` is present.
    pub fn write_into(&self, buffer: &mut Vec<u8>) {
        debug_assert!(self.size <= MAX_ENCODABLE_SIZE);
        let long_size = self.size >= LONG_SIZE_THRESHOLD;
        let mut first = if long_size {
            LONG_SIZE_FLAG | ((self.size >> 8) as u8 & SIZE_MASK)
        } else {
            self.size as u8 & SIZE_MASK
        };
        if self.resend_of.is_some() {
            first |= RESEND_FLAG;
        }
        buffer.push(first);
        if long_size {
            buffer.push((self.size & 0xFF) as u8);
        }
        if let Some(resend_of) = self.resend_of {
            buffer.extend_from_slice(&resend_of.to_le_bytes());
        }
    }

    /// Reads a sub-packet header from the cursor.
    pub fn read_from(cursor: &mut Cursor<&[u8]>) -> Result<Self, DecodingErrorKind> {
        let first = cursor.read_u8().map_err(|_| DecodingErrorKind::SubHeaderTruncated)?;
        let is_resend = first & RESEND_FLAG != 0;
        let size = if first & LONG_SIZE_FLAG != 0 {
            let low = cursor.read_u8().map_err(|_| DecodingErrorKind::SubHeaderTruncated)?;
            ((first & SIZE_MASK) as usize) << 8 | low as usize
        } else {
            (first & SIZE_MASK) as usize
        };
        let resend_of = if is_resend {
            Some(
                cursor
                    .read_u16::<LittleEndian>()
                    .map_err(|_| DecodingErrorKind::SubHeaderTruncated)?,
            )
        } else {
            None
        };
        Ok(Self { size, resend_of })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn decode_sub(bytes: &[u8]) -> Result<SubPacketHeader, DecodingErrorKind> {
        SubPacketHeader::read_from(&mut Cursor::new(bytes))
    }

    #[test]
    fn reliable_header_layout_is_little_endian() {
        let header = ReliableHeader { sequence: 0x0102, ack: 0x0304, ack_bits: 0x05060708 };
        let mut buffer = Vec::new();
        header.write_into(&mut buffer);
        assert_eq!(buffer, [0x02, 0x01, 0x04, 0x03, 0x08, 0x07, 0x06, 0x05]);
    }

    #[test]
    fn reliable_header_roundtrip() {
        let header = ReliableHeader { sequence: 42, ack: 65535, ack_bits: 0xDEADBEEF };
        let mut buffer = Vec::new();
        header.write_into(&mut buffer);
        let decoded = ReliableHeader::read_from(&mut Cursor::new(buffer.as_slice())).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn reliable_header_truncated() {
        let err = ReliableHeader::read_from(&mut Cursor::new(&[0u8; 7][..])).unwrap_err();
        assert_eq!(err, DecodingErrorKind::HeaderTruncated);
    }

    #[test]
    fn short_sub_header_is_one_byte() {
        let header = SubPacketHeader { size: 5, resend_of: None };
        let mut buffer = Vec::new();
        header.write_into(&mut buffer);
        assert_eq!(buffer, [5]);
    }

    #[test]
    fn long_size_sets_flag_at_64() {
        // size 63 stays short, 64 switches to the two-byte form
        let mut short = Vec::new();
        SubPacketHeader { size: 63, resend_of: None }.write_into(&mut short);
        assert_eq!(short, [63]);

        let mut long = Vec::new();
        SubPacketHeader { size: 64, resend_of: None }.write_into(&mut long);
        assert_eq!(long, [0x40, 64]);
    }

    #[test]
    fn resend_appends_trailer() {
        let mut buffer = Vec::new();
        SubPacketHeader { size: 3, resend_of: Some(0x1234) }.write_into(&mut buffer);
        assert_eq!(buffer, [0x80 | 3, 0x34, 0x12]);
    }

    #[test]
    fn long_resend_combines_both() {
        let mut buffer = Vec::new();
        SubPacketHeader { size: 300, resend_of: Some(7) }.write_into(&mut buffer);
        assert_eq!(buffer, [0x80 | 0x40 | 0x01, 0x2C, 7, 0]);
        let decoded = decode_sub(&buffer).unwrap();
        assert_eq!(decoded, SubPacketHeader { size: 300, resend_of: Some(7) });
    }

    #[test]
    fn truncated_long_size_errors() {
        assert_eq!(decode_sub(&[0x40]).unwrap_err(), DecodingErrorKind::SubHeaderTruncated);
    }

    #[test]
    fn truncated_resend_trailer_errors() {
        assert_eq!(decode_sub(&[0x80 | 1, 0x01]).unwrap_err(), DecodingErrorKind::SubHeaderTruncated);
        assert_eq!(decode_sub(&[0x80 | 1]).unwrap_err(), DecodingErrorKind::SubHeaderTruncated);
    }

    #[test]
    fn empty_input_errors() {
        assert_eq!(decode_sub(&[]).unwrap_err(), DecodingErrorKind::SubHeaderTruncated);
    }

    proptest! {
        #[test]
        fn sub_header_roundtrip(
            size in 0usize..=MAX_ENCODABLE_SIZE,
            resend_of in proptest::option::of(any::<u16>()),
        ) {
            let header = SubPacketHeader { size, resend_of };
            let mut buffer = Vec::new();
            header.write_into(&mut buffer);
            let decoded = decode_sub(&buffer).unwrap();
            prop_assert_eq!(decoded, header);
        }

        #[test]
        fn reliable_header_roundtrip_any(
            sequence in any::<u16>(),
            ack in any::<u16>(),
            ack_bits in any::<u32>(),
        ) {
            let header = ReliableHeader { sequence, ack, ack_bits };
            let mut buffer = Vec::new();
            header.write_into(&mut buffer);
            let decoded = ReliableHeader::read_from(&mut Cursor::new(buffer.as_slice())).unwrap();
            prop_assert_eq!(decoded, header);
        }
    }
}
