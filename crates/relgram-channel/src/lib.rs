#![warn(missing_docs)]

//! relgram-channel: the reliable channel endpoint.
//!
//! A [`ReliableChannel`] wraps any datagram [`Connection`] and layers
//! sequence numbering, acknowledgement bookkeeping, duplicate
//! suppression, resend tagging, and latency estimation on top of it.
//!
//! [`Connection`]: relgram_core::connection::Connection

mod channel;
mod listener;

pub use channel::ReliableChannel;
pub use listener::AckListener;
