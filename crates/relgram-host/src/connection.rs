use std::{
    cell::RefCell,
    collections::VecDeque,
    net::SocketAddr,
    rc::{Rc, Weak},
    time::{Duration, Instant},
};

use relgram_core::{
    connection::{Connection, ConnectionStatus},
    constants::UNASSIGNED_CONNECTION_ID,
    error::{ErrorKind, Result},
};
use tracing::debug;

use crate::handshake::HandshakeAccept;

/// One remote peer, identified by `(endpoint, connection id)`.
///
/// The connection only queues: all socket I/O happens in the service's
/// poll, which flushes `pending_send` and feeds `handle_datagram`.
pub struct UdpConnection {
    remote: SocketAddr,
    status: ConnectionStatus,
    connection_id: i16,
    pending_send: VecDeque<(i8, Vec<u8>)>,
    pending_receive: VecDeque<Vec<u8>>,
    error: Option<String>,
    last_activity: Instant,
}

impl UdpConnection {
    /// Creates a connection in the `Connecting` state.
    pub fn new(remote: SocketAddr, now: Instant) -> Self {
        Self {
            remote,
            status: ConnectionStatus::Connecting,
            connection_id: UNASSIGNED_CONNECTION_ID,
            pending_send: VecDeque::new(),
            pending_receive: VecDeque::new(),
            error: None,
            last_activity: now,
        }
    }

    /// The remote endpoint this connection talks to.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// The assigned connection id, or -1 before the handshake.
    pub fn connection_id(&self) -> i16 {
        self.connection_id
    }

    /// The connection lifecycle state.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether an inbound datagram tagged `id` from `addr` belongs to
    /// this connection. An id of -1 matches any connection at the same
    /// endpoint (pre-handshake traffic).
    pub fn matches_endpoint(&self, id: i16, addr: SocketAddr) -> bool {
        (id == UNASSIGNED_CONNECTION_ID || id == self.connection_id) && addr == self.remote
    }

    /// Queues one outbound datagram, tagged with the current wire id.
    ///
    /// The id byte is captured at queue time so a handshake queued while
    /// still connecting goes out tagged -1 even if the flush happens
    /// after the transition to open.
    pub fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        match self.status {
            ConnectionStatus::Open | ConnectionStatus::Connecting => {
                self.pending_send.push_back((self.wire_id(), payload));
                Ok(())
            }
            _ => Err(ErrorKind::ConnectionClosed),
        }
    }

    /// Takes one buffered inbound datagram.
    pub fn receive(&mut self) -> Option<Vec<u8>> {
        self.pending_receive.pop_front()
    }

    /// Server side: assigns an id, queues the handshake accept toward
    /// the peer, and opens the connection. A no-op outside `Connecting`.
    pub fn open(&mut self, id: i16) {
        if self.status == ConnectionStatus::Connecting {
            let frame = HandshakeAccept { connection_id: id }.encode();
            // Queued before the transition, so it is tagged -1.
            self.pending_send.push_back((self.wire_id(), frame));
            self.on_open(id);
        }
    }

    /// Applies one inbound datagram payload (connection-id byte already
    /// stripped by the service).
    ///
    /// While connecting, only a well-formed handshake accept changes
    /// anything; everything else is silently ignored and the peer may
    /// retry. Once open, payloads are buffered verbatim.
    pub(crate) fn handle_datagram(&mut self, payload: &[u8], now: Instant) {
        self.last_activity = now;
        match self.status {
            ConnectionStatus::Connecting => {
                if let Some(accept) = HandshakeAccept::parse(payload) {
                    self.on_open(accept.connection_id);
                }
            }
            ConnectionStatus::Open => {
                self.pending_receive.push_back(payload.to_vec());
            }
            _ => {}
        }
    }

    fn on_open(&mut self, id: i16) {
        debug!(connection_id = id, remote = %self.remote, "connection open");
        self.connection_id = id;
        self.status = ConnectionStatus::Open;
    }

    /// Records intent to terminate. Queued datagrams are still flushed
    /// before the service tears the connection down.
    pub fn close(&mut self) {
        if !self.status.is_terminal() {
            self.status = ConnectionStatus::Closing;
        }
    }

    /// Tears the connection down. Called by the dispatching service.
    pub fn terminate(&mut self) {
        self.status = ConnectionStatus::Closed;
    }

    /// Sets the externally observed error. Reported, never state-driving.
    pub fn set_error(&mut self, message: String) {
        self.error = Some(message);
    }

    /// The externally observed error, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn take_next_send(&mut self) -> Option<(i8, Vec<u8>)> {
        self.pending_send.pop_front()
    }

    pub(crate) fn requeue_front(&mut self, entry: (i8, Vec<u8>)) {
        self.pending_send.push_front(entry);
    }

    pub(crate) fn has_pending_send(&self) -> bool {
        !self.pending_send.is_empty()
    }

    pub(crate) fn clear_pending_send(&mut self) {
        self.pending_send.clear();
    }

    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    fn wire_id(&self) -> i8 {
        if self.status == ConnectionStatus::Open {
            self.connection_id as i8
        } else {
            UNASSIGNED_CONNECTION_ID as i8
        }
    }
}

/// Shared handle to a [`UdpConnection`].
///
/// The service keeps a weak reference for routing; the user (typically
/// through a reliable channel wrapping the handle) holds the strong one.
#[derive(Clone)]
pub struct UdpConnectionHandle {
    inner: Rc<RefCell<UdpConnection>>,
}

impl UdpConnectionHandle {
    pub(crate) fn new(connection: UdpConnection) -> Self {
        Self { inner: Rc::new(RefCell::new(connection)) }
    }

    pub(crate) fn from_shared(inner: Rc<RefCell<UdpConnection>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<UdpConnection>> {
        Rc::downgrade(&self.inner)
    }

    /// The remote endpoint this connection talks to.
    pub fn remote_addr(&self) -> SocketAddr {
        self.inner.borrow().remote_addr()
    }

    /// The assigned connection id, or -1 before the handshake.
    pub fn connection_id(&self) -> i16 {
        self.inner.borrow().connection_id()
    }

    /// The externally observed error, if any.
    pub fn error(&self) -> Option<String> {
        self.inner.borrow().error().map(str::to_owned)
    }

    /// Sets the externally observed error on the connection.
    pub fn set_error(&self, message: String) {
        self.inner.borrow_mut().set_error(message);
    }
}

impl Connection for UdpConnectionHandle {
    fn status(&self) -> ConnectionStatus {
        self.inner.borrow().status()
    }

    fn send(&mut self, datagram: Vec<u8>) -> Result<()> {
        self.inner.borrow_mut().send(datagram)
    }

    fn receive(&mut self) -> Option<Vec<u8>> {
        self.inner.borrow_mut().receive()
    }

    fn close(&mut self) {
        self.inner.borrow_mut().close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn starts_connecting_and_unassigned() {
        let conn = UdpConnection::new(addr(4000), Instant::now());
        assert_eq!(conn.status(), ConnectionStatus::Connecting);
        assert_eq!(conn.connection_id(), -1);
    }

    #[test]
    fn handshake_promotes_to_open() {
        let mut conn = UdpConnection::new(addr(4000), Instant::now());
        let frame = HandshakeAccept { connection_id: 5 }.encode();
        conn.handle_datagram(&frame, Instant::now());
        assert_eq!(conn.status(), ConnectionStatus::Open);
        assert_eq!(conn.connection_id(), 5);
    }

    #[test]
    fn handshake_mismatch_is_ignored() {
        let mut conn = UdpConnection::new(addr(4000), Instant::now());
        conn.handle_datagram(b"not a handshake", Instant::now());
        assert_eq!(conn.status(), ConnectionStatus::Connecting);

        // right length, wrong magic
        let mut frame = HandshakeAccept { connection_id: 5 }.encode();
        frame[0] = b'X';
        conn.handle_datagram(&frame, Instant::now());
        assert_eq!(conn.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn data_before_open_is_dropped() {
        let mut conn = UdpConnection::new(addr(4000), Instant::now());
        conn.handle_datagram(b"early", Instant::now());
        assert_eq!(conn.receive(), None);
    }

    #[test]
    fn open_queues_handshake_tagged_unassigned() {
        let mut conn = UdpConnection::new(addr(4000), Instant::now());
        conn.open(9);
        assert_eq!(conn.status(), ConnectionStatus::Open);
        let (wire_id, frame) = conn.take_next_send().unwrap();
        assert_eq!(wire_id, -1);
        assert_eq!(HandshakeAccept::parse(&frame), Some(HandshakeAccept { connection_id: 9 }));
    }

    #[test]
    fn sends_carry_id_once_open() {
        let mut conn = UdpConnection::new(addr(4000), Instant::now());
        conn.send(b"pre".to_vec()).unwrap();
        conn.open(9);
        conn.send(b"post".to_vec()).unwrap();

        let (pre_id, _) = conn.take_next_send().unwrap();
        assert_eq!(pre_id, -1);
        let (hs_id, _) = conn.take_next_send().unwrap();
        assert_eq!(hs_id, -1);
        let (post_id, _) = conn.take_next_send().unwrap();
        assert_eq!(post_id, 9);
    }

    #[test]
    fn send_after_close_errors() {
        let mut conn = UdpConnection::new(addr(4000), Instant::now());
        conn.close();
        assert!(matches!(conn.send(b"x".to_vec()), Err(ErrorKind::ConnectionClosed)));
    }

    #[test]
    fn open_data_is_buffered_fifo() {
        let mut conn = UdpConnection::new(addr(4000), Instant::now());
        conn.open(1);
        conn.handle_datagram(b"one", Instant::now());
        conn.handle_datagram(b"two", Instant::now());
        assert_eq!(conn.receive(), Some(b"one".to_vec()));
        assert_eq!(conn.receive(), Some(b"two".to_vec()));
        assert_eq!(conn.receive(), None);
    }

    #[test]
    fn endpoint_matching() {
        let mut conn = UdpConnection::new(addr(4000), Instant::now());
        conn.open(3);
        assert!(conn.matches_endpoint(3, addr(4000)));
        assert!(conn.matches_endpoint(-1, addr(4000)));
        assert!(!conn.matches_endpoint(4, addr(4000)));
        assert!(!conn.matches_endpoint(3, addr(4001)));
        assert!(!conn.matches_endpoint(-1, addr(4001)));
    }

    #[test]
    fn close_then_terminate_ladder() {
        let mut conn = UdpConnection::new(addr(4000), Instant::now());
        conn.open(1);
        conn.close();
        assert_eq!(conn.status(), ConnectionStatus::Closing);
        conn.terminate();
        assert_eq!(conn.status(), ConnectionStatus::Closed);
        // close after terminate stays closed
        conn.close();
        assert_eq!(conn.status(), ConnectionStatus::Closed);
    }
}
