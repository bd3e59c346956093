//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] maintains a sliding window of up to `window_capacity`
//! in-flight DATA segments over a transfer of `total` units.  Sequence numbers
//! count segments, not bytes, and start at 0.
//!
//! # Protocol contract
//!
//! - At most `window_capacity` segments may be in flight at once.
//! - ACKs are **cumulative**: `DATA-ACK(ack = A)` confirms every segment
//!   `≤ A`; anything below `base` is stale and ignored.
//! - On timeout, `next_seq` goes back to `base` so the caller's next send
//!   cycle re-originates the whole window (go back to N).
//! - There is no retry cap; a persistently lossy link retransmits forever.
//!
//! This module only manages state; all socket I/O is the caller's responsibility.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::packet::Segment;

/// Go-Back-N send-side state for one transfer.
///
/// # Sequence-number layout
///
/// ```text
///    base             next_seq     base + window
///      │                  │               │
///  ────┼──────────────────┼───────────────┼──────▶ seq space
///      │ <── in flight ──▶│ <── usable ──▶│
/// ```
#[derive(Debug)]
pub struct GbnSender {
    /// Sequence number of the **oldest** unacked segment (left window edge).
    pub base: u32,

    /// Sequence number to use for the **next** segment sent.
    pub next_seq: u32,

    /// Maximum number of segments that may be in flight simultaneously (N).
    window_capacity: u32,

    /// Number of data units in the whole transfer.
    total: u32,

    /// Most recent transmission time of every segment at or above `base`.
    send_times: BTreeMap<u32, Instant>,

    /// Every DATA transmission, retransmissions included.
    pub packets_sent_total: u64,
    /// Segments re-originated because of a timeout.
    pub retransmissions: u64,
    /// Number of acknowledgement waits that expired.
    pub timeouts: u64,
    /// Acknowledgements that advanced `base`.
    pub acks_received: u64,
}

impl GbnSender {
    /// Create a sender for `total` units with window size `window_capacity`.
    ///
    /// # Panics
    ///
    /// Panics on a zero window; [`crate::config::ProtocolConfig::validate`]
    /// rejects that before a connection is made.
    pub fn new(total: u32, window_capacity: u32) -> Self {
        assert!(window_capacity >= 1, "window_capacity must be at least 1");
        Self {
            base: 0,
            next_seq: 0,
            window_capacity,
            total,
            send_times: BTreeMap::new(),
            packets_sent_total: 0,
            retransmissions: 0,
            timeouts: 0,
            acks_received: 0,
        }
    }

    /// `true` when the window has room and there is still data to originate.
    pub fn can_send(&self) -> bool {
        u64::from(self.next_seq) < u64::from(self.base) + u64::from(self.window_capacity)
            && self.next_seq < self.total
    }

    /// Number of segments sent but not yet acknowledged.
    pub fn in_flight(&self) -> u32 {
        self.next_seq - self.base
    }

    /// `true` once every unit has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.base >= self.total
    }

    /// Build the DATA segment for `next_seq`.
    ///
    /// Call [`record_sent`](Self::record_sent) once it has been handed to the
    /// socket.
    pub fn build_data_segment(&self, payload: Vec<u8>) -> Segment {
        Segment::data(self.next_seq, payload)
    }

    /// Record that `next_seq` went out at `now` and advance it.
    ///
    /// Returns the sequence number just sent.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the window is full.  Check [`can_send`](Self::can_send)
    /// before calling.
    pub fn record_sent(&mut self, now: Instant) -> u32 {
        debug_assert!(
            self.can_send(),
            "record_sent called on a full GBN window (base={} next={} cap={})",
            self.base,
            self.next_seq,
            self.window_capacity
        );
        let seq = self.next_seq;
        self.send_times.insert(seq, now);
        self.next_seq += 1;
        self.packets_sent_total += 1;
        seq
    }

    /// Process a cumulative `DATA-ACK(ack = ack_num)` received at `now`.
    ///
    /// Returns the RTT sample measured against the last transmission of
    /// segment `ack_num` when the ACK advances `base`, or `None` for a stale
    /// ACK (`ack_num < base`) or one naming a segment never sent.
    pub fn on_ack(&mut self, ack_num: u32, now: Instant) -> Option<Duration> {
        if ack_num < self.base {
            return None;
        }
        let sent_at = *self.send_times.get(&ack_num)?;

        self.base = ack_num + 1;
        // A late ACK for a segment sent before the last rewind can overtake next_seq.
        self.next_seq = self.next_seq.max(self.base);
        self.send_times = self.send_times.split_off(&self.base);
        self.acks_received += 1;

        Some(now.saturating_duration_since(sent_at))
    }

    /// The acknowledgement wait expired: go back to `base`.
    ///
    /// Returns the number of segments that were in flight, which is also
    /// what gets added to [`retransmissions`](Self::retransmissions).
    pub fn on_timeout(&mut self) -> u32 {
        let lost = self.in_flight();
        self.retransmissions += u64::from(lost);
        self.timeouts += 1;
        self.next_seq = self.base;
        lost
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::SegmentKind;

    fn invariant(s: &GbnSender) -> bool {
        s.base <= s.next_seq && s.next_seq <= s.base + s.window_capacity
    }

    /// Send until the window is full, returning the sequence numbers used.
    fn fill(s: &mut GbnSender, now: Instant) -> Vec<u32> {
        let mut sent = Vec::new();
        while s.can_send() {
            sent.push(s.record_sent(now));
        }
        sent
    }

    #[test]
    fn initial_state() {
        let s = GbnSender::new(10, 5);
        assert_eq!(s.base, 0);
        assert_eq!(s.next_seq, 0);
        assert!(s.can_send());
        assert_eq!(s.in_flight(), 0);
        assert!(!s.is_complete());
    }

    #[test]
    fn window_full_blocks_send() {
        let mut s = GbnSender::new(10, 5);
        assert_eq!(fill(&mut s, Instant::now()), vec![0, 1, 2, 3, 4]);
        assert!(!s.can_send());
        assert_eq!(s.in_flight(), 5);
        assert_eq!(s.packets_sent_total, 5);
    }

    #[test]
    fn transfer_shorter_than_window_stops_at_total() {
        let mut s = GbnSender::new(3, 5);
        assert_eq!(fill(&mut s, Instant::now()), vec![0, 1, 2]);
        assert!(!s.can_send());
    }

    #[test]
    fn data_segment_carries_next_seq() {
        let mut s = GbnSender::new(4, 2);
        s.record_sent(Instant::now());
        let seg = s.build_data_segment(vec![b'D'; 3]);
        assert_eq!(seg.kind, SegmentKind::Data);
        assert_eq!(seg.seq, 1);
        assert_eq!(seg.payload, b"DDD");
    }

    #[test]
    fn cumulative_ack_slides_window() {
        let mut s = GbnSender::new(10, 5);
        let t0 = Instant::now();
        fill(&mut s, t0);

        let sample = s.on_ack(3, t0 + Duration::from_millis(40));
        assert_eq!(sample, Some(Duration::from_millis(40)));
        assert_eq!(s.base, 4);
        assert_eq!(s.in_flight(), 1);
        assert_eq!(s.acks_received, 1);
        assert!(invariant(&s));
    }

    #[test]
    fn stale_ack_is_ignored() {
        let mut s = GbnSender::new(10, 5);
        let t0 = Instant::now();
        fill(&mut s, t0);
        s.on_ack(2, t0);

        assert_eq!(s.on_ack(1, t0), None);
        assert_eq!(s.on_ack(0, t0), None);
        assert_eq!(s.base, 3);
        assert_eq!(s.acks_received, 1);
    }

    #[test]
    fn ack_for_unsent_segment_is_ignored() {
        let mut s = GbnSender::new(10, 5);
        fill(&mut s, Instant::now());
        assert_eq!(s.on_ack(7, Instant::now()), None);
        assert_eq!(s.base, 0);
    }

    #[test]
    fn sample_uses_timestamp_of_acked_segment() {
        let mut s = GbnSender::new(10, 5);
        let t0 = Instant::now();
        s.record_sent(t0);
        s.record_sent(t0 + Duration::from_millis(10));
        s.record_sent(t0 + Duration::from_millis(20));

        // Cumulative ACK for seq 2 is timed against seq 2, not seq 0.
        let sample = s.on_ack(2, t0 + Duration::from_millis(50));
        assert_eq!(sample, Some(Duration::from_millis(30)));
    }

    #[test]
    fn timeout_goes_back_to_base_and_counts_in_flight() {
        let mut s = GbnSender::new(10, 5);
        let t0 = Instant::now();
        fill(&mut s, t0);
        s.on_ack(1, t0);

        let lost = s.on_timeout();
        assert_eq!(lost, 3);
        assert_eq!(s.retransmissions, 3);
        assert_eq!(s.timeouts, 1);
        assert_eq!(s.next_seq, s.base);

        // The next send cycle re-originates from base.
        assert_eq!(fill(&mut s, t0), vec![2, 3, 4, 5, 6]);
        assert_eq!(s.packets_sent_total, 10);
    }

    #[test]
    fn retransmission_refreshes_send_time() {
        let mut s = GbnSender::new(1, 1);
        let t0 = Instant::now();
        s.record_sent(t0);
        s.on_timeout();
        s.record_sent(t0 + Duration::from_millis(500));

        let sample = s.on_ack(0, t0 + Duration::from_millis(520));
        assert_eq!(sample, Some(Duration::from_millis(20)));
        assert!(s.is_complete());
    }

    #[test]
    fn late_ack_after_rewind_keeps_invariant() {
        let mut s = GbnSender::new(10, 5);
        let t0 = Instant::now();
        fill(&mut s, t0);
        s.on_timeout();
        assert_eq!(s.next_seq, 0);

        // ACK for the original transmission of seq 3 arrives after the rewind.
        assert!(s.on_ack(3, t0).is_some());
        assert_eq!(s.base, 4);
        assert_eq!(s.next_seq, 4);
        assert!(invariant(&s));
    }

    #[test]
    fn completes_when_base_reaches_total() {
        let mut s = GbnSender::new(3, 5);
        let t0 = Instant::now();
        fill(&mut s, t0);
        s.on_ack(2, t0);
        assert!(s.is_complete());
        assert!(!s.can_send());
    }

    #[test]
    fn timeout_with_empty_window_adds_nothing() {
        let mut s = GbnSender::new(3, 5);
        assert_eq!(s.on_timeout(), 0);
        assert_eq!(s.retransmissions, 0);
        assert_eq!(s.timeouts, 1);
    }

    #[test]
    fn window_invariant_holds_under_mixed_events() {
        let mut s = GbnSender::new(200, 5);
        let t0 = Instant::now();
        let mut x: u32 = 12345;
        let mut steps = 0;

        while !s.is_complete() && steps < 10_000 {
            steps += 1;
            fill(&mut s, t0);
            assert!(invariant(&s));

            x = x.wrapping_mul(1_103_515_245).wrapping_add(12345);
            match (x >> 16) % 4 {
                0 => {
                    s.on_timeout();
                }
                _ if s.in_flight() > 0 => {
                    let ack = s.base + (x >> 8) % s.in_flight();
                    s.on_ack(ack, t0);
                }
                _ => {}
            }
            assert!(invariant(&s));
        }
        assert!(s.is_complete());
    }
}
