use std::{
    cell::RefCell,
    collections::VecDeque,
    io::Cursor,
    rc::Rc,
    time::{Duration, Instant},
};

use relgram_core::{
    config::Config,
    connection::{Connection, ConnectionStatus},
    constants::{MAX_SUB_PACKET_HEADER_SIZE, MAX_SUB_PACKET_SIZE, RELIABLE_HEADER_SIZE},
    error::{DecodingErrorKind, ErrorKind, Result},
    time::{Clock, SystemClock},
};
use relgram_protocol::{
    header::{ReliableHeader, SubPacketHeader},
    latency::LatencyEstimator,
    receive_history::{ReceiveHistory, SeqDisposition},
    send_window::{SendWindow, NO_TAG},
    SequenceNumber,
};
use tracing::{debug, trace};

use crate::listener::{AckListener, AckListeners};

/// A reliable channel layered over a datagram connection.
///
/// The channel numbers outbound datagrams, piggybacks a cumulative
/// acknowledgement bitfield on every send, suppresses duplicate and
/// already-covered resend payloads on receive, reports acknowledged tags
/// to registered listeners, and keeps a smoothed round-trip estimate.
///
/// It does not retransmit: loss shows up as never-acknowledged tags, and
/// the caller decides what, if anything, to send again (marking it with
/// [`send_resend`](Self::send_resend) so the pair is deduplicated).
pub struct ReliableChannel<C: Connection> {
    connection: C,
    clock: Box<dyn Clock>,
    send_window: SendWindow,
    receive_history: ReceiveHistory,
    latency: LatencyEstimator,
    pending_delivery: VecDeque<Vec<u8>>,
    listeners: AckListeners,
    last_send: Instant,
    last_receive: Instant,
}

impl<C: Connection> ReliableChannel<C> {
    /// Wraps a connection with default configuration.
    pub fn new(connection: C) -> Self {
        Self::with_config(connection, &Config::default())
    }

    /// Wraps a connection, tuning the channel from `config`.
    pub fn with_config(connection: C, config: &Config) -> Self {
        Self::with_clock(connection, config, Box::new(SystemClock))
    }

    /// Wraps a connection with an explicit time source.
    pub fn with_clock(connection: C, config: &Config, clock: Box<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            connection,
            clock,
            send_window: SendWindow::new(),
            receive_history: ReceiveHistory::new(),
            latency: LatencyEstimator::new(config.latency_smoothing_factor),
            pending_delivery: VecDeque::new(),
            listeners: AckListeners::new(),
            last_send: now,
            last_receive: now,
        }
    }

    /// Sends a payload with tag 0.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.send_tagged(payload, 0)
    }

    /// Sends a payload; listeners are told `tag` once the peer
    /// acknowledges it. The tag must be non-negative.
    pub fn send_tagged(&mut self, payload: &[u8], tag: i32) -> Result<()> {
        self.transmit(payload, None, tag)
    }

    /// Sends a payload annotated as a retransmission of `resend_of`, so
    /// the receiver delivers at most one of the pair.
    pub fn send_resend(&mut self, payload: &[u8], resend_of: SequenceNumber, tag: i32) -> Result<()> {
        self.transmit(payload, Some(resend_of), tag)
    }

    fn transmit(
        &mut self,
        payload: &[u8],
        resend_of: Option<SequenceNumber>,
        tag: i32,
    ) -> Result<()> {
        if tag < 0 {
            return Err(ErrorKind::InvalidTag(tag));
        }
        if payload.len() > MAX_SUB_PACKET_SIZE {
            return Err(ErrorKind::SubPacketTooLarge(payload.len()));
        }

        let now = self.clock.now();
        let header = ReliableHeader {
            sequence: self.send_window.next_sequence(),
            ack: self.receive_history.highest_received(),
            ack_bits: self.receive_history.ack_bits(),
        };

        let mut datagram =
            Vec::with_capacity(RELIABLE_HEADER_SIZE + MAX_SUB_PACKET_HEADER_SIZE + payload.len());
        header.write_into(&mut datagram);
        SubPacketHeader { size: payload.len(), resend_of }.write_into(&mut datagram);
        datagram.extend_from_slice(payload);

        self.connection.send(datagram)?;
        self.send_window.record(tag, now);
        self.last_send = now;
        Ok(())
    }

    /// Drains the underlying connection, processing every pending
    /// datagram, then hands back at most one delivered payload.
    ///
    /// Any framing fault or irreconcilable sequence jump closes the
    /// channel and is surfaced as the error; payloads already queued for
    /// delivery remain retrievable by further calls.
    pub fn receive(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(datagram) = self.connection.receive() {
            let now = self.clock.now();
            self.last_receive = now;
            if let Err(err) = self.process_datagram(&datagram, now) {
                debug!("closing channel on inbound fault: {}", err);
                self.connection.close();
                return Err(err);
            }
        }
        Ok(self.pending_delivery.pop_front())
    }

    fn process_datagram(&mut self, datagram: &[u8], now: Instant) -> Result<()> {
        let mut cursor = Cursor::new(datagram);
        let header = ReliableHeader::read_from(&mut cursor)?;

        let latency = &mut self.latency;
        let listeners = &mut self.listeners;
        self.send_window.process_acks(header.ack, header.ack_bits, now, |tag, rtt| {
            latency.record(rtt);
            if tag != NO_TAG {
                listeners.notify(tag);
            }
        });

        let mut sequence = header.sequence;
        while (cursor.position() as usize) < datagram.len() {
            let sub_header = SubPacketHeader::read_from(&mut cursor)?;
            if sub_header.size > MAX_SUB_PACKET_SIZE {
                return Err(DecodingErrorKind::SizeOutOfRange.into());
            }
            let start = cursor.position() as usize;
            if sub_header.size > datagram.len() - start {
                return Err(DecodingErrorKind::PayloadTruncated.into());
            }
            let payload = &datagram[start..start + sub_header.size];
            cursor.set_position((start + sub_header.size) as u64);

            match self.receive_history.on_seq_received(sequence, sub_header.resend_of) {
                SeqDisposition::Fresh => {
                    // Own the bytes before the datagram buffer goes away.
                    self.pending_delivery.push_back(payload.to_vec());
                }
                SeqDisposition::Duplicate => {
                    trace!(sequence, "dropping duplicate sub-packet");
                }
                SeqDisposition::WindowSkipped { jump } => {
                    return Err(ErrorKind::WindowSkipped { jump });
                }
            }
            sequence = sequence.wrapping_add(1);
        }
        Ok(())
    }

    /// Registers a listener for acknowledged tags. The channel holds it
    /// weakly; the caller keeps ownership.
    pub fn add_ack_listener<L: AckListener + 'static>(&mut self, listener: &Rc<RefCell<L>>) {
        self.listeners.add(listener);
    }

    /// Unregisters a previously added listener.
    pub fn remove_ack_listener<L: AckListener + 'static>(&mut self, listener: &Rc<RefCell<L>>) {
        self.listeners.remove(listener);
    }

    /// Closes the underlying connection.
    pub fn close(&mut self) {
        self.connection.close();
    }

    /// Lifecycle state of the underlying connection.
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Smoothed round trip, or `None` before the first acknowledgement.
    pub fn latency(&self) -> Option<Duration> {
        self.latency.latency()
    }

    /// Time elapsed since the last outbound datagram.
    pub fn time_since_last_send(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.last_send)
    }

    /// Time elapsed since the last inbound datagram.
    pub fn time_since_last_receive(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.last_receive)
    }

    /// Number of sent datagrams still awaiting acknowledgement.
    pub fn packets_in_flight(&self) -> usize {
        self.send_window.packets_in_flight()
    }

    /// Borrows the underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }
}

#[cfg(test)]
mod tests {
    use relgram_core::error::ErrorKind;

    use super::*;

    /// Connection test double with externally scripted inbound datagrams.
    struct ScriptedConnection {
        status: ConnectionStatus,
        inbound: VecDeque<Vec<u8>>,
        outbound: Vec<Vec<u8>>,
    }

    impl Default for ScriptedConnection {
        fn default() -> Self {
            Self { status: ConnectionStatus::Open, inbound: VecDeque::new(), outbound: Vec::new() }
        }
    }

    impl ScriptedConnection {
        fn push_inbound(&mut self, datagram: Vec<u8>) {
            self.inbound.push_back(datagram);
        }
    }

    impl Connection for ScriptedConnection {
        fn status(&self) -> ConnectionStatus {
            self.status
        }
        fn send(&mut self, datagram: Vec<u8>) -> Result<()> {
            self.outbound.push(datagram);
            Ok(())
        }
        fn receive(&mut self) -> Option<Vec<u8>> {
            self.inbound.pop_front()
        }
        fn close(&mut self) {
            self.status = ConnectionStatus::Closing;
        }
    }

    fn datagram(sequence: u16, payloads: &[&[u8]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        ReliableHeader { sequence, ack: u16::MAX, ack_bits: 0 }.write_into(&mut bytes);
        for payload in payloads {
            SubPacketHeader { size: payload.len(), resend_of: None }.write_into(&mut bytes);
            bytes.extend_from_slice(payload);
        }
        bytes
    }

    #[test]
    fn negative_tag_is_rejected() {
        let mut channel = ReliableChannel::new(ScriptedConnection::default());
        assert_eq!(channel.send_tagged(b"x", -3).unwrap_err(), ErrorKind::InvalidTag(-3));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut channel = ReliableChannel::new(ScriptedConnection::default());
        let payload = vec![0u8; MAX_SUB_PACKET_SIZE + 1];
        assert_eq!(
            channel.send(&payload).unwrap_err(),
            ErrorKind::SubPacketTooLarge(MAX_SUB_PACKET_SIZE + 1)
        );
    }

    #[test]
    fn outbound_datagram_carries_header_and_payload() {
        let mut channel = ReliableChannel::new(ScriptedConnection::default());
        channel.send(b"hello").unwrap();
        let wire = &channel.connection().outbound[0];
        // sequence 0, ack = initial highest (0xFFFF), no ack bits
        assert_eq!(&wire[..8], &[0, 0, 0xFF, 0xFF, 0, 0, 0, 0]);
        assert_eq!(wire[8], 5);
        assert_eq!(&wire[9..], b"hello");
    }

    #[test]
    fn multiple_sub_packets_deliver_in_order() {
        // one datagram, three sub-packets with sequences 0, 1, 2
        let mut conn = ScriptedConnection::default();
        conn.push_inbound(datagram(0, &[b"a", b"bb", b"ccc"]));
        let mut channel = ReliableChannel::new(conn);
        assert_eq!(channel.receive().unwrap().as_deref(), Some(&b"a"[..]));
        assert_eq!(channel.receive().unwrap().as_deref(), Some(&b"bb"[..]));
        assert_eq!(channel.receive().unwrap().as_deref(), Some(&b"ccc"[..]));
        assert_eq!(channel.receive().unwrap(), None);
    }

    #[test]
    fn truncated_header_closes_channel() {
        let mut conn = ScriptedConnection::default();
        conn.push_inbound(vec![1, 2, 3]);
        let mut channel = ReliableChannel::new(conn);
        let err = channel.receive().unwrap_err();
        assert_eq!(err, ErrorKind::DecodingError(DecodingErrorKind::HeaderTruncated));
        assert_eq!(channel.status(), ConnectionStatus::Closing);
    }

    #[test]
    fn truncated_payload_closes_channel() {
        let mut conn = ScriptedConnection::default();
        let mut wire = Vec::new();
        ReliableHeader { sequence: 0, ack: u16::MAX, ack_bits: 0 }.write_into(&mut wire);
        SubPacketHeader { size: 10, resend_of: None }.write_into(&mut wire);
        wire.extend_from_slice(b"short");
        conn.push_inbound(wire);
        let mut channel = ReliableChannel::new(conn);
        let err = channel.receive().unwrap_err();
        assert_eq!(err, ErrorKind::DecodingError(DecodingErrorKind::PayloadTruncated));
        assert_eq!(channel.status(), ConnectionStatus::Closing);
    }

    #[test]
    fn queued_payloads_survive_a_later_fault() {
        let mut conn = ScriptedConnection::default();
        conn.push_inbound(datagram(0, &[b"kept"]));
        conn.push_inbound(vec![0xFF]); // garbage
        let mut channel = ReliableChannel::new(conn);
        assert!(channel.receive().is_err());
        // the payload parsed before the fault is still deliverable
        assert_eq!(channel.receive().unwrap().as_deref(), Some(&b"kept"[..]));
    }

    #[test]
    fn window_skip_closes_channel() {
        let mut conn = ScriptedConnection::default();
        conn.push_inbound(datagram(100, &[b"base"]));
        conn.push_inbound(datagram(1093, &[b"skip"]));
        let mut channel = ReliableChannel::new(conn);
        let err = channel.receive().unwrap_err();
        assert_eq!(err, ErrorKind::WindowSkipped { jump: 993 });
        assert_eq!(channel.status(), ConnectionStatus::Closing);
    }
}
