#![warn(missing_docs)]

//! relgram-host: UDP connections and the service that drives them.
//!
//! A [`UdpService`] owns one non-blocking UDP socket and demultiplexes
//! datagrams to per-peer [`UdpConnection`]s by `(connection id,
//! endpoint)`. Connections are handed out as shared
//! [`UdpConnectionHandle`]s that implement the core `Connection`
//! capability, so a reliable channel can be layered directly on top.

mod connection;
mod event;
mod handshake;
mod service;
mod socket;

pub use connection::{UdpConnection, UdpConnectionHandle};
pub use event::HostEvent;
pub use handshake::HandshakeAccept;
pub use service::UdpService;
