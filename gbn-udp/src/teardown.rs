//! Connection close.
//!
//! A collapsed close: the initiator sends `FIN(seq = base)`, the responder
//! answers `FIN-ACK(seq = random, ack = base + 1)` and is gone.  The
//! initiator never treats a failed close as an error: every path ends in
//! `CLOSED` and yields a [`TeardownOutcome`] for the operator.

use std::fmt;
use std::ops::Range;

use rand::Rng;

use crate::packet::{Segment, SegmentKind};
use crate::state::ConnectionState;

/// Range the responder draws its closing sequence number from.
pub const CLOSING_SEQ_RANGE: Range<u32> = 40_000..50_000;

/// How the initiator's close went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// A valid FIN-ACK arrived.
    Closed { peer_seq: u32 },
    /// Something other than the expected FIN-ACK arrived.
    Mismatch(Segment),
    /// No reply within the teardown wait.
    TimedOut,
}

impl TeardownOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

impl fmt::Display for TeardownOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed { peer_seq } => write!(f, "closed (peer FIN-ACK seq={peer_seq})"),
            Self::Mismatch(seg) => write!(f, "unexpected reply {seg}, closed anyway"),
            Self::TimedOut => f.write_str("timed out waiting for FIN-ACK, closed anyway"),
        }
    }
}

/// Initiator side of the close.
#[derive(Debug)]
pub struct Closer {
    state: ConnectionState,
    fin_seq: u32,
}

impl Closer {
    /// `fin_seq` is the sender's final `base`.
    pub fn new(fin_seq: u32) -> Self {
        Self {
            state: ConnectionState::Established,
            fin_seq,
        }
    }

    /// Emit the FIN and move to `FIN_WAIT`.
    pub fn fin(&mut self) -> Segment {
        self.state = ConnectionState::FinWait;
        Segment::control(SegmentKind::Fin, self.fin_seq, 0)
    }

    /// Judge the responder's reply.  Always ends in `CLOSED`.
    pub fn on_reply(&mut self, reply: &Segment) -> TeardownOutcome {
        self.state = ConnectionState::Closed;
        if reply.kind == SegmentKind::FinAck && reply.ack == self.fin_seq.wrapping_add(1) {
            TeardownOutcome::Closed { peer_seq: reply.seq }
        } else {
            TeardownOutcome::Mismatch(reply.clone())
        }
    }

    pub fn on_timeout(&mut self) -> TeardownOutcome {
        self.state = ConnectionState::Closed;
        TeardownOutcome::TimedOut
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

/// Responder side: build the FIN-ACK for `fin` with a fresh closing
/// sequence number.
pub fn answer_fin<R: Rng>(fin: &Segment, rng: &mut R) -> Segment {
    Segment::control(
        SegmentKind::FinAck,
        rng.random_range(CLOSING_SEQ_RANGE),
        fin.seq.wrapping_add(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn clean_close() {
        let mut closer = Closer::new(10);
        let fin = closer.fin();
        assert_eq!(fin, Segment::control(SegmentKind::Fin, 10, 0));
        assert_eq!(closer.state(), ConnectionState::FinWait);

        let reply = answer_fin(&fin, &mut StdRng::seed_from_u64(1));
        assert_eq!(reply.kind, SegmentKind::FinAck);
        assert_eq!(reply.ack, 11);
        assert!(CLOSING_SEQ_RANGE.contains(&reply.seq));

        let outcome = closer.on_reply(&reply);
        assert_eq!(outcome, TeardownOutcome::Closed { peer_seq: reply.seq });
        assert!(outcome.is_clean());
        assert_eq!(closer.state(), ConnectionState::Closed);
    }

    #[test]
    fn wrong_ack_is_mismatch_but_still_closes() {
        let mut closer = Closer::new(10);
        closer.fin();
        let bad = Segment::control(SegmentKind::FinAck, 45_000, 10);
        assert_eq!(closer.on_reply(&bad), TeardownOutcome::Mismatch(bad));
        assert_eq!(closer.state(), ConnectionState::Closed);
    }

    #[test]
    fn stray_data_ack_is_mismatch() {
        let mut closer = Closer::new(3);
        closer.fin();
        let stray = Segment::control(SegmentKind::DataAck, 0, 4);
        assert!(!closer.on_reply(&stray).is_clean());
    }

    #[test]
    fn timeout_closes() {
        let mut closer = Closer::new(0);
        closer.fin();
        assert_eq!(closer.on_timeout(), TeardownOutcome::TimedOut);
        assert_eq!(closer.state(), ConnectionState::Closed);
    }
}
