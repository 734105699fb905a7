//! The datagram connection capability the reliable layer is built on.

use crate::error::Result;

/// Lifecycle states of a connection.
///
/// `Connecting` is entered at construction, `Open` on a completed
/// handshake, `Closing` when local intent to terminate is recorded, and
/// `Closed` once the dispatching host has torn the connection down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Handshake not yet completed.
    Connecting,
    /// Handshake completed, traffic flows.
    Open,
    /// Local close requested, not yet torn down.
    Closing,
    /// Terminated.
    Closed,
}

impl ConnectionStatus {
    /// Returns true once the connection has reached a state it cannot
    /// leave again.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Closing | ConnectionStatus::Closed)
    }
}

/// A datagram-oriented connection to one remote peer.
///
/// This is the seam between the reliable layer and the transport
/// underneath it: anything that can queue one outbound datagram, yield
/// one inbound datagram, and report its lifecycle can carry a reliable
/// channel. Loopback test doubles implement it directly.
pub trait Connection {
    /// Reports the connection lifecycle state.
    fn status(&self) -> ConnectionStatus;

    /// Queues one outbound datagram.
    fn send(&mut self, datagram: Vec<u8>) -> Result<()>;

    /// Takes one buffered inbound datagram, if any.
    fn receive(&mut self) -> Option<Vec<u8>>;

    /// Records intent to terminate the connection.
    fn close(&mut self);
}
