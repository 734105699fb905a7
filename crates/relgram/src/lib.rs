#![warn(missing_docs)]

//! Relgram: a small public API facade for the workspace.
//!
//! This crate re-exports the types needed to run reliable datagrams
//! over UDP:
//!
//! - Host service and connections (`UdpService`, `UdpConnectionHandle`)
//! - The reliable channel and its listener trait (`ReliableChannel`,
//!   `AckListener`)
//! - Core configuration and errors (`Config`, `ErrorKind`)
//!
//! Example
//! ```ignore
//! use std::time::Instant;
//! use relgram::{ConnectionStatus, ReliableChannel, UdpService};
//!
//! let mut server = UdpService::bind("127.0.0.1:9000").unwrap();
//! let mut client = UdpService::bind_any().unwrap();
//!
//! let conn = client.connect(server.local_addr().unwrap()).unwrap();
//! // ... poll both services until the handshake completes ...
//!
//! let mut channel = ReliableChannel::new(conn);
//! channel.send_tagged(b"hello", 1).unwrap();
//! ```

// Core: configuration, errors, the connection capability
pub use relgram_core::{
    config::Config,
    connection::{Connection, ConnectionStatus},
    error::{DecodingErrorKind, ErrorKind, Result},
};
// Channel: the reliable endpoint
pub use relgram_channel::{AckListener, ReliableChannel};
// Host: UDP connections and the socket-driving service
pub use relgram_host::{HostEvent, UdpConnection, UdpConnectionHandle, UdpService};
// Protocol: the sequence number type resend tagging speaks in
pub use relgram_protocol::SequenceNumber;

/// Convenience prelude with the most commonly used items.
pub mod prelude {
    pub use crate::{
        AckListener, Config, Connection, ConnectionStatus, ErrorKind, HostEvent, ReliableChannel,
        Result, UdpConnectionHandle, UdpService,
    };
}
