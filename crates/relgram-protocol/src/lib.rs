#![warn(missing_docs)]

//! relgram-protocol: the reliable-datagram wire protocol.
//!
//! This crate holds the pieces the reliable channel is assembled from:
//! - `header`: the reliable header and sub-packet header codec
//! - `sequence`: 16-bit wrapping sequence arithmetic
//! - `send_window`: the ring of sent-and-unacknowledged slots
//! - `receive_history`: the ring of recently received sequences
//! - `latency`: round-trip-time smoothing

/// Reliable header and sub-packet header codec.
pub mod header;
/// Latency (round-trip time) estimation.
pub mod latency;
/// Receive-history ring and ACK bitfield generation.
pub mod receive_history;
/// Wrapping arithmetic over 16-bit sequence numbers.
pub mod sequence;
/// Sent-slot ring and inbound ACK processing.
pub mod send_window;

/// 16-bit sequence number type used on the wire.
pub type SequenceNumber = u16;
