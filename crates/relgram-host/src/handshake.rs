//! The connection-accept handshake frame.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use relgram_core::constants::{HANDSHAKE_MAGIC, HANDSHAKE_SIZE};

/// The frame a server sends to promote a connecting peer: the 12-byte
/// magic followed by the assigned connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeAccept {
    /// Connection id assigned by the server.
    pub connection_id: i16,
}

impl HandshakeAccept {
    /// Encodes the 14-byte accept frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HANDSHAKE_SIZE);
        frame.extend_from_slice(&HANDSHAKE_MAGIC);
        frame.extend_from_slice(&self.connection_id.to_le_bytes());
        frame
    }

    /// Parses an accept frame. Returns `None` for anything that is not
    /// exactly a well-formed frame; a connecting peer ignores those.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() != HANDSHAKE_SIZE || payload[..HANDSHAKE_MAGIC.len()] != HANDSHAKE_MAGIC {
            return None;
        }
        let mut cursor = Cursor::new(&payload[HANDSHAKE_MAGIC.len()..]);
        let connection_id = cursor.read_i16::<LittleEndian>().ok()?;
        Some(Self { connection_id })
    }
}
