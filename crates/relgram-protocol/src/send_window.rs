//! Ring of sent-and-unacknowledged slots, plus inbound ACK processing.

use std::time::{Duration, Instant};

use relgram_core::constants::{SEQUENCE_BUFFER_SIZE, STALE_ACK_THRESHOLD};

use crate::{sequence::sequence_distance, SequenceNumber};

/// Tag value meaning "no acknowledgement notification wanted".
pub const NO_TAG: i32 = -1;

/// Width of the trailing acknowledgement bitfield.
pub const ACK_BITS: u32 = 32;

#[derive(Clone, Copy, Debug)]
struct SentSlot {
    waiting: bool,
    tag: i32,
    timestamp: Option<Instant>,
}

impl Default for SentSlot {
    fn default() -> Self {
        Self { waiting: false, tag: NO_TAG, timestamp: None }
    }
}

/// Tracks outbound sequences awaiting acknowledgement.
///
/// Slots live in a fixed ring indexed by `sequence % SEQUENCE_BUFFER_SIZE`;
/// a slot's tag is only meaningful while it is still waiting. The window
/// also owns sequence allocation so that the stale-ACK guard always sees
/// the next outbound sequence.
#[derive(Debug)]
pub struct SendWindow {
    next_sequence: SequenceNumber,
    slots: Box<[SentSlot]>,
}

impl SendWindow {
    /// Creates an empty window starting at sequence zero.
    pub fn new() -> Self {
        Self { next_sequence: 0, slots: vec![SentSlot::default(); SEQUENCE_BUFFER_SIZE].into() }
    }

    /// The sequence the next [`record`](Self::record) call will allocate.
    pub fn next_sequence(&self) -> SequenceNumber {
        self.next_sequence
    }

    /// Allocates the next sequence and marks its slot as waiting.
    pub fn record(&mut self, tag: i32, now: Instant) -> SequenceNumber {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        let slot = &mut self.slots[sequence as usize % SEQUENCE_BUFFER_SIZE];
        slot.waiting = true;
        slot.tag = tag;
        slot.timestamp = Some(now);
        sequence
    }

    /// Number of slots still awaiting acknowledgement.
    pub fn packets_in_flight(&self) -> usize {
        self.slots.iter().filter(|slot| slot.waiting).count()
    }

    /// Applies one inbound `(ack, ack_bits)` pair.
    ///
    /// A field whose `ack` lies more than [`STALE_ACK_THRESHOLD`] behind
    /// the next outbound sequence refers to history long overtaken and is
    /// ignored wholesale. Otherwise covered sequences are acknowledged
    /// oldest first: bit 31 down to bit 0, then `ack` itself. `on_ack`
    /// receives the slot tag and the measured round trip for every slot
    /// that was still waiting.
    pub fn process_acks(
        &mut self,
        ack: SequenceNumber,
        ack_bits: u32,
        now: Instant,
        mut on_ack: impl FnMut(i32, Duration),
    ) {
        if sequence_distance(ack, self.next_sequence) > STALE_ACK_THRESHOLD {
            return;
        }
        for i in (0..ACK_BITS).rev() {
            if ack_bits & (1 << i) != 0 {
                self.acknowledge(ack.wrapping_sub(i as u16 + 1), now, &mut on_ack);
            }
        }
        self.acknowledge(ack, now, &mut on_ack);
    }

    fn acknowledge(
        &mut self,
        sequence: SequenceNumber,
        now: Instant,
        on_ack: &mut impl FnMut(i32, Duration),
    ) {
        let slot = &mut self.slots[sequence as usize % SEQUENCE_BUFFER_SIZE];
        if slot.waiting {
            slot.waiting = false;
            let rtt = slot
                .timestamp
                .map(|sent| now.saturating_duration_since(sent))
                .unwrap_or_default();
            on_ack(slot.tag, rtt);
        }
    }
}

impl Default for SendWindow {
    fn default() -> Self {
        Self::new()
    }
}
