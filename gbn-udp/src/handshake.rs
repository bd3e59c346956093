//! Three-way handshake state machines.
//!
//! [`Initiator`] (client) and [`Responder`] (server session) each own the
//! handshake FSM for their side.  They build the segments to transmit and
//! validate the segments received; sockets and timeouts are the caller's
//! business ([`crate::connection`] and [`crate::session`]).
//!
//! ```text
//!  Initiator                                   Responder
//!  CLOSED                                      LISTEN
//!    │ ── SYN(seq=c, ack=0) ─────────────────▶   │
//!  SYN_SENT                                    SYN_RECEIVED
//!    │ ◀──────────── SYN-ACK(seq=s, ack=c+1) ──  │
//!    │ ── ACK(seq=c+1, ack=s+1) ─────────────▶   │
//!  ESTABLISHED                                 ESTABLISHED
//! ```
//!
//! A failed validation is terminal for both roles: the machine falls back to
//! `CLOSED` and there is no retry.

use std::ops::Range;

use rand::Rng;
use thiserror::Error;

use crate::packet::{Segment, SegmentKind};
use crate::state::ConnectionState;

/// Range the initiator draws its ISN from.
pub const INITIATOR_ISN_RANGE: Range<u32> = 0..10_000;
/// Range the responder draws its ISN from.
pub const RESPONDER_ISN_RANGE: Range<u32> = 20_000..30_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The peer's segment had the wrong type or acknowledgement number.
    #[error("expected {expected} with ack={expected_ack}, got {received}")]
    Mismatch {
        expected: SegmentKind,
        expected_ack: u32,
        received: Segment,
    },
    /// The step is not legal in the machine's current state.
    #[error("handshake step not allowed in state {0}")]
    BadState(ConnectionState),
}

// ---------------------------------------------------------------------------
// Initiator
// ---------------------------------------------------------------------------

/// Client side of the handshake.
#[derive(Debug)]
pub struct Initiator {
    state: ConnectionState,
    isn: u32,
    peer_isn: Option<u32>,
}

impl Initiator {
    pub fn new(isn: u32) -> Self {
        Self {
            state: ConnectionState::Closed,
            isn,
            peer_isn: None,
        }
    }

    /// Start with an ISN drawn uniformly from [`INITIATOR_ISN_RANGE`].
    pub fn with_random_isn<R: Rng>(rng: &mut R) -> Self {
        Self::new(rng.random_range(INITIATOR_ISN_RANGE))
    }

    /// Emit the SYN and move to `SYN_SENT`.
    pub fn syn(&mut self) -> Result<Segment, HandshakeError> {
        if self.state != ConnectionState::Closed {
            return Err(HandshakeError::BadState(self.state));
        }
        self.state = ConnectionState::SynSent;
        Ok(Segment::control(SegmentKind::Syn, self.isn, 0))
    }

    /// Validate the responder's reply and produce the final ACK.
    ///
    /// On success the machine is `ESTABLISHED`; on mismatch it returns to
    /// `CLOSED`.
    pub fn on_reply(&mut self, reply: &Segment) -> Result<Segment, HandshakeError> {
        if self.state != ConnectionState::SynSent {
            return Err(HandshakeError::BadState(self.state));
        }

        let expected_ack = self.isn.wrapping_add(1);
        if reply.kind != SegmentKind::SynAck || reply.ack != expected_ack {
            self.state = ConnectionState::Closed;
            return Err(HandshakeError::Mismatch {
                expected: SegmentKind::SynAck,
                expected_ack,
                received: reply.clone(),
            });
        }

        self.peer_isn = Some(reply.seq);
        self.state = ConnectionState::Established;
        Ok(Segment::control(
            SegmentKind::Ack,
            expected_ack,
            reply.seq.wrapping_add(1),
        ))
    }

    /// The handshake timed out while waiting for the reply.
    pub fn on_timeout(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn isn(&self) -> u32 {
        self.isn
    }

    /// Responder's ISN, known once `ESTABLISHED`.
    pub fn peer_isn(&self) -> Option<u32> {
        self.peer_isn
    }
}

// ---------------------------------------------------------------------------
// Responder
// ---------------------------------------------------------------------------

/// Server-session side of the handshake.
#[derive(Debug)]
pub struct Responder {
    state: ConnectionState,
    isn: u32,
    peer_isn: Option<u32>,
}

impl Responder {
    pub fn new(isn: u32) -> Self {
        Self {
            state: ConnectionState::Listen,
            isn,
            peer_isn: None,
        }
    }

    /// Start with an ISN drawn uniformly from [`RESPONDER_ISN_RANGE`].
    pub fn with_random_isn<R: Rng>(rng: &mut R) -> Self {
        Self::new(rng.random_range(RESPONDER_ISN_RANGE))
    }

    /// Accept the initiator's SYN and produce the SYN-ACK.
    pub fn on_syn(&mut self, syn: &Segment) -> Result<Segment, HandshakeError> {
        if self.state != ConnectionState::Listen {
            return Err(HandshakeError::BadState(self.state));
        }
        if syn.kind != SegmentKind::Syn {
            return Err(HandshakeError::Mismatch {
                expected: SegmentKind::Syn,
                expected_ack: 0,
                received: syn.clone(),
            });
        }

        self.peer_isn = Some(syn.seq);
        self.state = ConnectionState::SynReceived;
        Ok(Segment::control(
            SegmentKind::SynAck,
            self.isn,
            syn.seq.wrapping_add(1),
        ))
    }

    /// Validate the initiator's final ACK.
    pub fn on_ack(&mut self, ack: &Segment) -> Result<(), HandshakeError> {
        if self.state != ConnectionState::SynReceived {
            return Err(HandshakeError::BadState(self.state));
        }

        let expected_ack = self.isn.wrapping_add(1);
        if ack.kind != SegmentKind::Ack || ack.ack != expected_ack {
            self.state = ConnectionState::Closed;
            return Err(HandshakeError::Mismatch {
                expected: SegmentKind::Ack,
                expected_ack,
                received: ack.clone(),
            });
        }

        self.state = ConnectionState::Established;
        Ok(())
    }

    /// The final ACK never arrived.
    pub fn on_timeout(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn isn(&self) -> u32 {
        self.isn
    }

    pub fn peer_isn(&self) -> Option<u32> {
        self.peer_isn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn full_exchange_reaches_established_on_both_sides() {
        let mut client = Initiator::new(4000);
        let mut server = Responder::new(25_000);

        let syn = client.syn().unwrap();
        assert_eq!(syn, Segment::control(SegmentKind::Syn, 4000, 0));
        assert_eq!(client.state(), ConnectionState::SynSent);

        let syn_ack = server.on_syn(&syn).unwrap();
        assert_eq!(syn_ack, Segment::control(SegmentKind::SynAck, 25_000, 4001));
        assert_eq!(server.state(), ConnectionState::SynReceived);

        let ack = client.on_reply(&syn_ack).unwrap();
        assert_eq!(ack, Segment::control(SegmentKind::Ack, 4001, 25_001));
        assert_eq!(client.state(), ConnectionState::Established);
        assert_eq!(client.peer_isn(), Some(25_000));

        server.on_ack(&ack).unwrap();
        assert_eq!(server.state(), ConnectionState::Established);
        assert_eq!(server.peer_isn(), Some(4000));
    }

    #[test]
    fn initiator_rejects_wrong_ack_number() {
        let mut client = Initiator::new(10);
        client.syn().unwrap();

        let bogus = Segment::control(SegmentKind::SynAck, 20_000, 99);
        let err = client.on_reply(&bogus).unwrap_err();
        assert!(matches!(
            err,
            HandshakeError::Mismatch { expected: SegmentKind::SynAck, expected_ack: 11, .. }
        ));
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[test]
    fn initiator_rejects_wrong_kind() {
        let mut client = Initiator::new(10);
        client.syn().unwrap();
        let err = client
            .on_reply(&Segment::control(SegmentKind::FinAck, 0, 11))
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Mismatch { .. }));
    }

    #[test]
    fn initiator_cannot_send_syn_twice() {
        let mut client = Initiator::new(1);
        client.syn().unwrap();
        assert_eq!(
            client.syn(),
            Err(HandshakeError::BadState(ConnectionState::SynSent))
        );
    }

    #[test]
    fn reply_before_syn_is_bad_state() {
        let mut client = Initiator::new(1);
        let err = client
            .on_reply(&Segment::control(SegmentKind::SynAck, 5, 2))
            .unwrap_err();
        assert_eq!(err, HandshakeError::BadState(ConnectionState::Closed));
    }

    #[test]
    fn responder_rejects_wrong_final_ack() {
        let mut server = Responder::new(20_500);
        server
            .on_syn(&Segment::control(SegmentKind::Syn, 7, 0))
            .unwrap();

        let err = server
            .on_ack(&Segment::control(SegmentKind::Ack, 8, 20_500))
            .unwrap_err();
        assert!(matches!(
            err,
            HandshakeError::Mismatch { expected: SegmentKind::Ack, expected_ack: 20_501, .. }
        ));
        assert_eq!(server.state(), ConnectionState::Closed);
    }

    #[test]
    fn responder_rejects_non_syn_seed() {
        let mut server = Responder::new(20_500);
        let err = server
            .on_syn(&Segment::control(SegmentKind::Data, 0, 0))
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Mismatch { .. }));
        assert_eq!(server.state(), ConnectionState::Listen);
    }

    #[test]
    fn timeouts_close_both_machines() {
        let mut client = Initiator::new(1);
        client.syn().unwrap();
        client.on_timeout();
        assert_eq!(client.state(), ConnectionState::Closed);

        let mut server = Responder::new(20_000);
        server.on_syn(&Segment::control(SegmentKind::Syn, 1, 0)).unwrap();
        server.on_timeout();
        assert_eq!(server.state(), ConnectionState::Closed);
    }

    #[test]
    fn random_isns_fall_in_their_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            assert!(INITIATOR_ISN_RANGE.contains(&Initiator::with_random_isn(&mut rng).isn()));
            assert!(RESPONDER_ISN_RANGE.contains(&Responder::with_random_isn(&mut rng).isn()));
        }
    }

    #[test]
    fn seeded_isns_are_reproducible() {
        let a = Initiator::with_random_isn(&mut StdRng::seed_from_u64(99)).isn();
        let b = Initiator::with_random_isn(&mut StdRng::seed_from_u64(99)).isn();
        assert_eq!(a, b);
    }
}
