//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only **in-order** segments are accepted (`seq == expected_seq`); each is
//!   answered with `DATA-ACK(ack = seq)`.
//! - Out-of-order or duplicate segments are discarded without buffering and
//!   answered with the last cumulative ACK, `expected_seq - 1`, if any
//!   segment has been accepted yet.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility (same pattern as [`crate::gbn_sender::GbnSender`]).

use crate::packet::{Segment, SegmentKind};

/// What the receiver decided about one DATA segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// In order: payload delivered, acknowledge it.
    Accepted { ack: Segment },
    /// Out of order or duplicate: payload dropped, re-send the last ACK.
    Reacked { ack: Segment },
    /// Out of order before anything was accepted: nothing to re-send.
    Discarded,
}

impl Delivery {
    /// The acknowledgement to transmit, if any.
    pub fn ack(&self) -> Option<&Segment> {
        match self {
            Self::Accepted { ack } | Self::Reacked { ack } => Some(ack),
            Self::Discarded => None,
        }
    }
}

/// Go-Back-N receive-side state for one session.
#[derive(Debug, Default)]
pub struct GbnReceiver {
    /// Next expected sequence number; only ever increases.
    pub expected_seq: u32,

    /// Payload bytes delivered in order.
    pub bytes_delivered: u64,

    /// Segments dropped as out of order or duplicate.
    pub discarded: u64,
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process an inbound DATA segment.
    pub fn on_segment(&mut self, seq: u32, payload: &[u8]) -> Delivery {
        if seq == self.expected_seq {
            let ack = data_ack(seq);
            self.expected_seq += 1;
            self.bytes_delivered += payload.len() as u64;
            return Delivery::Accepted { ack };
        }

        // GBN does not buffer out-of-order data.
        self.discarded += 1;
        match self.last_acked() {
            Some(last) => Delivery::Reacked { ack: data_ack(last) },
            None => Delivery::Discarded,
        }
    }

    /// Highest sequence number acknowledged so far.
    pub fn last_acked(&self) -> Option<u32> {
        self.expected_seq.checked_sub(1)
    }

    /// Number of segments accepted in order.
    pub fn segments_delivered(&self) -> u32 {
        self.expected_seq
    }
}

fn data_ack(ack: u32) -> Segment {
    Segment::control(SegmentKind::DataAck, 0, ack)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
