use std::{default::Default, time::Duration};

use crate::constants::MAX_DATAGRAM_SIZE;

#[derive(Clone, Debug)]
/// Configuration options to tune transport and host behavior.
pub struct Config {
    /// Smoothing factor (0..1) applied to round-trip-time samples.
    pub latency_smoothing_factor: f32,
    /// Max idle time before an open connection is considered dead and culled.
    pub idle_connection_timeout: Duration,
    /// Size of the datagram receive buffer in bytes.
    pub receive_buffer_max_size: usize,
    /// Max connections waiting in the accept queue before new endpoints
    /// are turned away. Prevents handshake floods from growing the queue
    /// without bound.
    pub max_pending_connections: u16,
    /// Socket receive buffer size in bytes (None = use system default).
    /// Corresponds to SO_RCVBUF.
    pub socket_recv_buffer_size: Option<usize>,
    /// Socket send buffer size in bytes (None = use system default).
    /// Corresponds to SO_SNDBUF.
    pub socket_send_buffer_size: Option<usize>,
    /// Time-to-live for outgoing datagrams (None = use system default).
    pub socket_ttl: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latency_smoothing_factor: 0.2,
            idle_connection_timeout: Duration::from_secs(5),
            receive_buffer_max_size: MAX_DATAGRAM_SIZE,
            max_pending_connections: 50,
            socket_recv_buffer_size: None,
            socket_send_buffer_size: None,
            socket_ttl: None,
        }
    }
}
