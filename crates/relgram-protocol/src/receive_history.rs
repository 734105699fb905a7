//! Ring of recently received sequences.
//!
//! Each slot is a 2-bit field: bit 0 records that the sequence itself
//! arrived, bit 1 that the sequence was named as the original of a
//! resend we accepted. Together they suppress duplicates across an
//! original/retransmission pair.

use relgram_core::constants::{SEQUENCE_BUFFER_SIZE, WINDOW_SKIP_THRESHOLD};

use crate::{
    sequence::{sequence_distance, sequence_greater_than},
    SequenceNumber,
};

/// Slot bit: a packet with this sequence was received.
const RECEIVED_BIT: u8 = 0b01;
/// Slot bit: this sequence was referenced as the original of a resend.
const RESEND_REFERENCED_BIT: u8 = 0b10;

/// Outcome of recording one received sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqDisposition {
    /// First sighting; the payload should be delivered.
    Fresh,
    /// Already seen (directly or through its resend pair); drop it.
    Duplicate,
    /// The sequence jumped too far ahead to keep the history coherent;
    /// the channel must close.
    WindowSkipped {
        /// How far ahead of the highest received sequence the jump was.
        jump: u16,
    },
}

/// Sliding history of received sequences with ACK bitfield generation.
#[derive(Debug)]
pub struct ReceiveHistory {
    highest_received: SequenceNumber,
    slots: Box<[u8]>,
}

impl ReceiveHistory {
    /// Creates an empty history. The initial highest sequence is u16::MAX
    /// so that the first real sequence, zero, counts as an advance.
    pub fn new() -> Self {
        Self { highest_received: u16::MAX, slots: vec![0u8; SEQUENCE_BUFFER_SIZE].into() }
    }

    /// Largest sequence received so far, in wrapping order.
    pub fn highest_received(&self) -> SequenceNumber {
        self.highest_received
    }

    /// Returns whether a packet with this sequence was received, as far
    /// as the ring still remembers.
    pub fn is_received(&self, sequence: SequenceNumber) -> bool {
        self.slots[sequence as usize % SEQUENCE_BUFFER_SIZE] & RECEIVED_BIT != 0
    }

    /// Records one received sequence, advancing the window if it is ahead.
    ///
    /// On an advance, every ring index freshly passed has its
    /// half-a-ring-ahead counterpart zeroed, so the slots in front of the
    /// window never carry bits from a full ring ago. The duplicate test
    /// runs after the advance: a non-zero slot for `sequence`, or for
    /// `resend_of` when present, drops the packet.
    pub fn on_seq_received(
        &mut self,
        sequence: SequenceNumber,
        resend_of: Option<SequenceNumber>,
    ) -> SeqDisposition {
        let buffer_pos = sequence as usize % SEQUENCE_BUFFER_SIZE;

        if sequence_greater_than(sequence, self.highest_received) {
            let jump = sequence_distance(self.highest_received, sequence);
            if jump > WINDOW_SKIP_THRESHOLD {
                return SeqDisposition::WindowSkipped { jump };
            }

            let mut i = self.highest_received as usize % SEQUENCE_BUFFER_SIZE;
            while i != buffer_pos {
                self.slots[(i + SEQUENCE_BUFFER_SIZE / 2) % SEQUENCE_BUFFER_SIZE] = 0;
                i = (i + 1) % SEQUENCE_BUFFER_SIZE;
            }

            self.highest_received = sequence;
        }

        let resend_pos = resend_of.map(|seq| seq as usize % SEQUENCE_BUFFER_SIZE);
        if self.slots[buffer_pos] != 0 || resend_pos.is_some_and(|pos| self.slots[pos] != 0) {
            return SeqDisposition::Duplicate;
        }

        self.slots[buffer_pos] |= RECEIVED_BIT;
        if let Some(pos) = resend_pos {
            self.slots[pos] |= RESEND_REFERENCED_BIT;
        }
        SeqDisposition::Fresh
    }

    /// Builds the outbound acknowledgement bitfield: bit `i` reflects
    /// whether sequence `highest_received - 1 - i` was received.
    pub fn ack_bits(&self) -> u32 {
        let mut bits = 0u32;
        for i in 0..32u16 {
            let sequence = self.highest_received.wrapping_sub(1).wrapping_sub(i);
            if self.is_received(sequence) {
                bits |= 1 << i;
            }
        }
        bits
    }
}

impl Default for ReceiveHistory {
    fn default() -> Self {
        Self::new()
    }
}
