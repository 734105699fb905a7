use std::net::SocketAddr;

/// Events emitted by the service as connections come and go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A connection completed its handshake.
    Connected(SocketAddr, i16),
    /// A connection was torn down: closed locally, dropped, or idle past
    /// the configured timeout.
    Disconnected(SocketAddr),
}
