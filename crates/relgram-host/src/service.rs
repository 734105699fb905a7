use std::{
    cell::RefCell,
    collections::VecDeque,
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs, UdpSocket},
    rc::{Rc, Weak},
    time::Instant,
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use relgram_core::{
    buffer_pool::BufferPool,
    config::Config,
    connection::ConnectionStatus,
    error::Result,
};
use tracing::{error, warn};

use crate::{
    connection::{UdpConnection, UdpConnectionHandle},
    event::HostEvent,
    socket::apply_socket_options,
};

/// Drives one non-blocking UDP socket for any number of connections.
///
/// Connections never touch the socket themselves: `poll` drains inbound
/// datagrams into them (routing by connection id and endpoint), flushes
/// their send queues one datagram at a time, and tears down connections
/// that closed, were dropped, or went idle. All of it runs on the
/// calling thread; nothing here blocks.
pub struct UdpService {
    socket: UdpSocket,
    config: Config,
    connections: Vec<Weak<RefCell<UdpConnection>>>,
    pending_accept: VecDeque<Rc<RefCell<UdpConnection>>>,
    event_sender: Sender<HostEvent>,
    event_receiver: Receiver<HostEvent>,
    receive_buffer: Vec<u8>,
    send_pool: BufferPool,
    next_connection_id: i16,
}

impl UdpService {
    /// Binds to the given address with default configuration.
    pub fn bind<A: ToSocketAddrs>(addresses: A) -> Result<Self> {
        Self::bind_with_config(addresses, Config::default())
    }

    /// Binds to any free port on localhost with default configuration.
    pub fn bind_any() -> Result<Self> {
        let loopback = Ipv4Addr::new(127, 0, 0, 1);
        Self::bind_with_config(SocketAddrV4::new(loopback, 0), Config::default())
    }

    /// Binds to the given address with custom configuration.
    pub fn bind_with_config<A: ToSocketAddrs>(addresses: A, config: Config) -> Result<Self> {
        let socket = UdpSocket::bind(addresses)?;
        apply_socket_options(&socket, &config)?;
        socket.set_nonblocking(true)?;
        let (event_sender, event_receiver) = unbounded();
        // One byte beyond the limit, so an oversized datagram reads as
        // over-length instead of being silently truncated to fit.
        let receive_buffer = vec![0; config.receive_buffer_max_size + 1];
        Ok(Self {
            socket,
            config,
            connections: Vec::new(),
            pending_accept: VecDeque::new(),
            event_sender,
            event_receiver,
            receive_buffer,
            send_pool: BufferPool::default(),
            next_connection_id: 0,
        })
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// A receiver for connection lifecycle events.
    pub fn events(&self) -> Receiver<HostEvent> {
        self.event_receiver.clone()
    }

    /// Starts connecting to a remote service.
    ///
    /// Queues a knock datagram (the bare pre-handshake id byte) so the
    /// remote learns the endpoint; the handle opens once the remote's
    /// handshake accept arrives through `poll`.
    pub fn connect(&mut self, remote: SocketAddr) -> Result<UdpConnectionHandle> {
        let mut connection = UdpConnection::new(remote, Instant::now());
        connection.send(Vec::new())?;
        let handle = UdpConnectionHandle::new(connection);
        self.connections.push(handle.downgrade());
        Ok(handle)
    }

    /// Takes one connection waiting for acceptance, assigns it the next
    /// id, and opens it (queueing the handshake accept toward the peer).
    pub fn accept(&mut self) -> Option<UdpConnectionHandle> {
        let shared = self.pending_accept.pop_front()?;
        let id = self.allocate_connection_id();
        let addr = {
            let mut connection = shared.borrow_mut();
            connection.open(id);
            connection.remote_addr()
        };
        let _ = self.event_sender.send(HostEvent::Connected(addr, id));
        Some(UdpConnectionHandle::from_shared(shared))
    }

    /// Number of connections the service still routes for.
    pub fn connection_count(&self) -> usize {
        self.connections.iter().filter(|weak| weak.strong_count() > 0).count()
    }

    /// Number of connections waiting in the accept queue.
    pub fn pending_connection_count(&self) -> usize {
        self.pending_accept.len()
    }

    /// Runs one service iteration: drain the socket, flush send queues,
    /// tear down finished connections.
    pub fn poll(&mut self, now: Instant) {
        self.pump_receives(now);
        self.flush_sends();
        self.cull(now);
    }

    fn allocate_connection_id(&mut self) -> i16 {
        // The wire tags every datagram with a single byte, so ids stay
        // in the positive i8 range and wrap.
        let id = self.next_connection_id;
        self.next_connection_id = (self.next_connection_id + 1) & 0x7F;
        id
    }

    fn pump_receives(&mut self, now: Instant) {
        loop {
            match self.socket.recv_from(&mut self.receive_buffer) {
                Ok((length, addr)) => {
                    if length > self.config.receive_buffer_max_size {
                        warn!(length, %addr, "rejecting oversized datagram");
                        continue;
                    }
                    if length == 0 {
                        continue;
                    }

                    let id = self.receive_buffer[0] as i8 as i16;
                    let payload = &self.receive_buffer[1..length];

                    let mut routed = false;
                    for weak in &self.connections {
                        let Some(conn) = weak.upgrade() else { continue };
                        let mut connection = conn.borrow_mut();
                        if connection.matches_endpoint(id, addr) {
                            let was_connecting =
                                connection.status() == ConnectionStatus::Connecting;
                            connection.handle_datagram(payload, now);
                            if was_connecting && connection.status() == ConnectionStatus::Open {
                                let _ = self.event_sender.send(HostEvent::Connected(
                                    addr,
                                    connection.connection_id(),
                                ));
                            }
                            routed = true;
                            break;
                        }
                    }

                    if !routed {
                        if self.pending_accept.len()
                            < self.config.max_pending_connections as usize
                        {
                            let mut connection = UdpConnection::new(addr, now);
                            connection.handle_datagram(payload, now);
                            let shared = Rc::new(RefCell::new(connection));
                            self.connections.push(Rc::downgrade(&shared));
                            self.pending_accept.push_back(shared);
                        } else {
                            warn!(%addr, "turning away connection, accept queue is full");
                        }
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    error!("error receiving datagram: {}", err);
                    break;
                }
            }
        }
    }

    fn flush_sends(&mut self) {
        'connections: for weak in &self.connections {
            let Some(conn) = weak.upgrade() else { continue };
            let mut connection = conn.borrow_mut();
            while let Some((wire_id, payload)) = connection.take_next_send() {
                let mut wire = self.send_pool.allocate();
                wire.push(wire_id as u8);
                wire.extend_from_slice(&payload);
                match self.socket.send_to(&wire, connection.remote_addr()) {
                    Ok(_) => self.send_pool.deallocate(wire),
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                        // Socket backpressure: park the datagram for the
                        // next poll and stop flushing altogether.
                        self.send_pool.deallocate(wire);
                        connection.requeue_front((wire_id, payload));
                        break 'connections;
                    }
                    Err(err) => {
                        error!(remote = %connection.remote_addr(), "error sending datagram: {}", err);
                        self.send_pool.deallocate(wire);
                        connection.set_error(err.to_string());
                        connection.clear_pending_send();
                        connection.close();
                        continue 'connections;
                    }
                }
            }
        }
    }

    fn cull(&mut self, now: Instant) {
        let timeout = self.config.idle_connection_timeout;

        // Handshakes that sat unaccepted past the timeout are turned
        // away; entries opened behind our back have been claimed and
        // leave the queue either way.
        self.pending_accept.retain(|conn| {
            let connection = conn.borrow();
            connection.status() == ConnectionStatus::Connecting
                && connection.idle_for(now) < timeout
        });

        let mut disconnected = Vec::new();
        self.connections.retain(|weak| {
            let Some(conn) = weak.upgrade() else { return false };
            let mut connection = conn.borrow_mut();
            match connection.status() {
                ConnectionStatus::Closing if !connection.has_pending_send() => {
                    connection.terminate();
                    disconnected.push(connection.remote_addr());
                    false
                }
                ConnectionStatus::Closed => {
                    disconnected.push(connection.remote_addr());
                    false
                }
                ConnectionStatus::Open if connection.idle_for(now) >= timeout => {
                    connection.terminate();
                    disconnected.push(connection.remote_addr());
                    false
                }
                _ => true,
            }
        });
        for addr in disconnected {
            let _ = self.event_sender.send(HostEvent::Disconnected(addr));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_stay_in_wire_range() {
        let mut service = UdpService::bind_any().unwrap();
        service.next_connection_id = 127;
        assert_eq!(service.allocate_connection_id(), 127);
        assert_eq!(service.allocate_connection_id(), 0);
        assert_eq!(service.allocate_connection_id(), 1);
    }

    #[test]
    fn connect_registers_for_routing() {
        let mut service = UdpService::bind_any().unwrap();
        let remote = "127.0.0.1:9999".parse().unwrap();
        let handle = service.connect(remote).unwrap();
        assert_eq!(service.connection_count(), 1);
        assert_eq!(handle.remote_addr(), remote);
        assert_eq!(handle.connection_id(), -1);
    }

    #[test]
    fn dropped_handle_is_culled() {
        let mut service = UdpService::bind_any().unwrap();
        let remote = "127.0.0.1:9999".parse().unwrap();
        drop(service.connect(remote).unwrap());
        assert_eq!(service.connection_count(), 0);
        service.poll(Instant::now());
        assert!(service.connections.is_empty());
    }
}
