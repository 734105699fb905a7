#![warn(missing_docs)]

//! relgram-core: foundational types shared across all layers.
//!
//! This crate provides the minimal set of core utilities:
//! - Protocol constants
//! - Configuration types
//! - Error handling
//! - The `Connection` capability the reliable layer is built on
//! - Time abstraction and buffer recycling
//!
//! Protocol-specific logic lives in specialized crates:
//! - `relgram-protocol`: wire codec, sequence windows, latency estimation
//! - `relgram-channel`: the reliable channel endpoint
//! - `relgram-host`: UDP connections and the socket-driving service

/// Protocol constants shared across layers.
pub mod constants {
    /// Capacity of the sent-slot and received-slot rings. Must be a power
    /// of two larger than twice the ack window.
    pub const SEQUENCE_BUFFER_SIZE: usize = 1024;
    /// Largest datagram accepted on the wire, id byte included.
    pub const MAX_DATAGRAM_SIZE: usize = 1500;
    /// Largest payload a single sub-packet may carry.
    pub const MAX_SUB_PACKET_SIZE: usize = 2048;
    /// ACKs referring further than this behind the next outbound sequence
    /// are ignored as stale.
    pub const STALE_ACK_THRESHOLD: u16 = 512;
    /// A received sequence jumping further ahead than this cannot be
    /// reconciled with the ring history and closes the channel.
    pub const WINDOW_SKIP_THRESHOLD: u16 = (SEQUENCE_BUFFER_SIZE - 32) as u16;
    /// Size of the reliable header: sequence + ack + ack bitfield.
    pub const RELIABLE_HEADER_SIZE: usize = 8;
    /// Largest sub-packet header: flag byte, low size byte, resend-of u16.
    pub const MAX_SUB_PACKET_HEADER_SIZE: usize = 4;
    /// Magic prefix of the handshake accept frame.
    pub const HANDSHAKE_MAGIC: [u8; 12] = *b"halley_accp\0";
    /// Total size of the handshake accept frame: magic + u16 id.
    pub const HANDSHAKE_SIZE: usize = 14;
    /// Connection id used before the handshake has assigned one.
    pub const UNASSIGNED_CONNECTION_ID: i16 = -1;
}

/// Configuration options for the transport and host runtime.
pub mod config;
/// The datagram connection capability and its lifecycle states.
pub mod connection;
/// Error types and results.
pub mod error;
/// Send-buffer recycling for the socket flush path.
pub mod buffer_pool;
/// Time source abstraction.
pub mod time;
