//! Go-back-N send-side window state machine.
//!
//! [`SendWindow`] maintains a sliding window of up to `window_size` in-flight
//! frames numbered modulo [`SEQ_MODULO`].
//!
//! # Protocol contract
//!
//! - At most `window_size` frames may be awaiting acknowledgment at once.
//! - Acknowledgments are **cumulative**: N(R) = k means the peer expects
//!   frame k next, i.e. every frame numbered in the circular interval from
//!   the left window edge up to (but not including) k is acknowledged.
//! - An N(R) equal to the left edge while frames are in flight is a
//!   duplicate/stale acknowledgment: the retransmit cursor rewinds to the
//!   oldest unacknowledged frame and everything still buffered is resent
//!   unchanged (go back N).
//! - Sequence numbers are 3 bits wide and wrap at [`SEQ_MODULO`]; window
//!   membership is a circular-interval test, never a plain comparison.
//!
//! This module only manages state; all channel I/O is the caller's
//! responsibility.

use std::collections::VecDeque;

use crate::frame::SEQ_MODULO;

/// Hard ceiling on the window size, matching the sequence-number space.
pub const MAX_WINDOW_SIZE: usize = 8;

/// Nominal window size used when the caller does not choose one.
pub const DEFAULT_WINDOW_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Number of sequence numbers in the half-open circular interval `[lo, hi)`.
#[inline]
fn seq_distance(lo: u8, hi: u8) -> u8 {
    (hi + SEQ_MODULO - lo) % SEQ_MODULO
}

// ---------------------------------------------------------------------------
// WindowEntry
// ---------------------------------------------------------------------------

/// A single in-flight frame occupying one slot in the window.
#[derive(Debug, Clone)]
pub struct WindowEntry {
    /// The encoded frame, retransmitted verbatim on go-back-N.
    pub wire: String,
    /// Send sequence number N(S) assigned to this frame.
    pub ns: u8,
    /// Total number of times this frame has been transmitted.
    pub tx_count: u32,
}

// ---------------------------------------------------------------------------
// AckOutcome
// ---------------------------------------------------------------------------

/// Result of feeding one received N(R) into the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The left edge advanced; this many frames were retired.
    Advanced(usize),
    /// Duplicate/stale acknowledgment; this many buffered frames will be
    /// retransmitted.
    GoBackN(usize),
    /// N(R) outside the in-flight interval, or nothing in flight; no change.
    Ignored,
}

// ---------------------------------------------------------------------------
// SendWindow
// ---------------------------------------------------------------------------

/// Go-back-N send-side state for one link.
///
/// # Sequence-number layout
///
/// ```text
///   left          v(s)            rhs = left + window_size
///    │              │              │
///  ──┼──────────────┼──────────────┼────▶ seq space (mod 8)
///    │ ◀ in flight ▶│ ◀ sendable ▶ │
/// ```
///
/// The buffer holds every sent-but-unacknowledged frame, oldest first; the
/// head always carries sequence number `left`.  `cursor` indexes the next
/// buffer slot to (re)transmit; when it equals the buffer length the next
/// transmission is a brand-new frame.
#[derive(Debug)]
pub struct SendWindow {
    /// Sequence number of the oldest unacknowledged frame (left edge).
    left: u8,

    /// Index into `buffer` of the next frame to (re)transmit.
    cursor: usize,

    /// Maximum number of frames in flight simultaneously.
    window_size: usize,

    /// In-flight frames ordered by sequence number (front = oldest).
    buffer: VecDeque<WindowEntry>,
}

impl SendWindow {
    /// Create a new [`SendWindow`] with the given capacity (1..=8).
    pub fn new(window_size: usize) -> Self {
        assert!(
            (1..=MAX_WINDOW_SIZE).contains(&window_size),
            "window_size must be in 1..={MAX_WINDOW_SIZE}"
        );
        Self {
            left: 0,
            cursor: 0,
            window_size,
            buffer: VecDeque::with_capacity(window_size),
        }
    }

    /// Drop all window state and restart numbering at zero.
    pub fn reset(&mut self) {
        self.left = 0;
        self.cursor = 0;
        self.buffer.clear();
    }

    /// Sequence number the next transmission will carry, V(S).
    pub fn vs(&self) -> u8 {
        (self.left + self.cursor as u8) % SEQ_MODULO
    }

    /// Left window edge: the oldest unacknowledged sequence number.
    pub fn left_edge(&self) -> u8 {
        self.left
    }

    /// Right window edge: the first sequence number not permitted to be sent.
    pub fn rhs(&self) -> u8 {
        (self.left + self.window_size as u8) % SEQ_MODULO
    }

    /// Configured window capacity.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of frames currently awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.buffer.len()
    }

    /// `true` when no frames are awaiting acknowledgment.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// `true` when there is room to send a brand-new frame.
    pub fn can_send(&self) -> bool {
        self.buffer.len() < self.window_size
    }

    /// Place a just-transmitted new frame into the window and advance V(S).
    ///
    /// Check [`can_send`](Self::can_send) first; overfilling the window is a
    /// caller bug (checked in debug builds).
    pub fn record_sent(&mut self, wire: String) {
        debug_assert!(
            self.can_send(),
            "record_sent called on a full window ({} / {})",
            self.buffer.len(),
            self.window_size
        );
        debug_assert_eq!(
            self.cursor,
            self.buffer.len(),
            "record_sent called while retransmissions are pending"
        );
        let ns = self.vs();
        self.buffer.push_back(WindowEntry {
            wire,
            ns,
            tx_count: 1,
        });
        self.cursor += 1;
    }

    /// Take the next pending retransmission, if any.
    ///
    /// Returns the frame's sequence number and wire string, bumps its
    /// transmission count, and advances the cursor.  Returns `None` when the
    /// cursor has caught up with the buffer (nothing left to resend).
    pub fn next_retransmit(&mut self) -> Option<(u8, String)> {
        let entry = self.buffer.get_mut(self.cursor)?;
        entry.tx_count += 1;
        let out = (entry.ns, entry.wire.clone());
        self.cursor += 1;
        Some(out)
    }

    /// Process a received N(R).
    ///
    /// Follows one circular-interval convention throughout: an N(R) equal to
    /// the left edge is always read as a duplicate/stale acknowledgment
    /// requesting go-back-N, and the acknowledged count for any other N(R)
    /// is the half-open interval from the left edge up to N(R).
    pub fn on_ack(&mut self, nr: u8) -> AckOutcome {
        debug_assert!(nr < SEQ_MODULO);

        if nr == self.left {
            if self.buffer.is_empty() {
                return AckOutcome::Ignored;
            }
            self.cursor = 0;
            return AckOutcome::GoBackN(self.buffer.len());
        }

        let acked = seq_distance(self.left, nr) as usize;
        if acked > self.buffer.len() {
            // Acknowledges frames that were never sent; stale or corrupt.
            return AckOutcome::Ignored;
        }

        self.buffer.drain(..acked);
        self.left = nr;
        self.cursor = self.cursor.saturating_sub(acked);
        AckOutcome::Advanced(acked)
    }

    /// Iterate over all in-flight frames from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = &WindowEntry> {
        self.buffer.iter()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: record a dummy frame and return the sequence number it got.
    fn send_one(w: &mut SendWindow) -> u8 {
        let ns = w.vs();
        w.record_sent(format!("frame-{ns}"));
        ns
    }

    #[test]
    fn initial_state() {
        let w = SendWindow::new(4);
        assert_eq!(w.vs(), 0);
        assert_eq!(w.left_edge(), 0);
        assert_eq!(w.rhs(), 4);
        assert!(w.can_send());
        assert!(w.is_empty());
        assert_eq!(w.in_flight(), 0);
    }

    #[test]
    #[should_panic]
    fn zero_window_rejected() {
        SendWindow::new(0);
    }

    #[test]
    fn record_sent_advances_vs() {
        let mut w = SendWindow::new(4);
        assert_eq!(send_one(&mut w), 0);
        assert_eq!(w.vs(), 1);
        assert_eq!(w.left_edge(), 0);
        assert_eq!(w.in_flight(), 1);
    }

    #[test]
    fn full_window_blocks_send() {
        let mut w = SendWindow::new(2);
        send_one(&mut w);
        send_one(&mut w);
        assert!(!w.can_send());
        assert_eq!(w.in_flight(), 2);
    }

    #[test]
    fn occupancy_never_exceeds_window_size() {
        let mut w = SendWindow::new(4);
        for round in 0..5 {
            while w.can_send() {
                send_one(&mut w);
            }
            assert_eq!(w.in_flight(), 4, "round {round}");
            let next = (w.left_edge() + 2) % SEQ_MODULO;
            assert_eq!(w.on_ack(next), AckOutcome::Advanced(2));
            assert!(w.in_flight() <= w.window_size());
        }
    }

    #[test]
    fn cumulative_ack_retires_multiple() {
        let mut w = SendWindow::new(4);
        for _ in 0..3 {
            send_one(&mut w);
        }
        assert_eq!(w.on_ack(3), AckOutcome::Advanced(3));
        assert_eq!(w.left_edge(), 3);
        assert_eq!(w.rhs(), 7);
        assert!(w.is_empty());
    }

    #[test]
    fn partial_ack_retires_head_only() {
        let mut w = SendWindow::new(4);
        for _ in 0..3 {
            send_one(&mut w);
        }
        assert_eq!(w.on_ack(2), AckOutcome::Advanced(2));
        assert_eq!(w.left_edge(), 2);
        assert_eq!(w.in_flight(), 1);
        assert_eq!(w.entries().next().unwrap().ns, 2);
    }

    #[test]
    fn duplicate_ack_requests_go_back() {
        let mut w = SendWindow::new(4);
        for _ in 0..3 {
            send_one(&mut w);
        }
        assert_eq!(w.on_ack(1), AckOutcome::Advanced(1));

        // An N(R) equal to the left edge is always read as a go-back request,
        // never as a full-window acknowledgment; keeping the window size
        // below the sequence-number modulus is what keeps the two cases
        // distinguishable at the boundary.
        assert_eq!(w.on_ack(1), AckOutcome::GoBackN(2));
        assert_eq!(w.left_edge(), 1);
        assert_eq!(w.in_flight(), 2);
    }

    #[test]
    fn duplicate_ack_is_idempotent() {
        let mut w = SendWindow::new(4);
        for _ in 0..2 {
            send_one(&mut w);
        }

        assert_eq!(w.on_ack(0), AckOutcome::GoBackN(2));
        // A second identical duplicate rewinds the cursor again; it must not
        // grow the retransmission set or disturb the edges.
        assert_eq!(w.on_ack(0), AckOutcome::GoBackN(2));
        assert_eq!(w.left_edge(), 0);
        assert_eq!(w.in_flight(), 2);

        // Exactly the two buffered frames replay, oldest first.
        assert_eq!(w.next_retransmit().unwrap().0, 0);
        assert_eq!(w.next_retransmit().unwrap().0, 1);
        assert!(w.next_retransmit().is_none());
    }

    #[test]
    fn ack_with_empty_window_ignored() {
        let mut w = SendWindow::new(4);
        assert_eq!(w.on_ack(0), AckOutcome::Ignored);
    }

    #[test]
    fn spurious_ack_beyond_in_flight_ignored() {
        let mut w = SendWindow::new(4);
        send_one(&mut w);
        assert_eq!(w.on_ack(5), AckOutcome::Ignored);
        assert_eq!(w.left_edge(), 0);
        assert_eq!(w.in_flight(), 1);
    }

    #[test]
    fn retransmit_replays_in_order_and_counts() {
        let mut w = SendWindow::new(4);
        for _ in 0..3 {
            send_one(&mut w);
        }
        assert_eq!(w.on_ack(0), AckOutcome::GoBackN(3));

        let (ns0, wire0) = w.next_retransmit().unwrap();
        assert_eq!((ns0, wire0.as_str()), (0, "frame-0"));
        assert_eq!(w.next_retransmit().unwrap().0, 1);
        assert_eq!(w.next_retransmit().unwrap().0, 2);
        assert!(w.next_retransmit().is_none());

        let counts: Vec<u32> = w.entries().map(|e| e.tx_count).collect();
        assert_eq!(counts, vec![2, 2, 2]);
    }

    #[test]
    fn ack_during_replay_skips_retired_frames() {
        let mut w = SendWindow::new(4);
        for _ in 0..3 {
            send_one(&mut w);
        }
        assert_eq!(w.on_ack(0), AckOutcome::GoBackN(3));
        assert_eq!(w.next_retransmit().unwrap().0, 0);

        // Frames 0 and 1 get acknowledged while the replay is underway; the
        // cursor must land on frame 2, not resend frame 1.
        assert_eq!(w.on_ack(2), AckOutcome::Advanced(2));
        assert_eq!(w.next_retransmit().unwrap().0, 2);
        assert!(w.next_retransmit().is_none());
    }

    #[test]
    fn window_straddles_sequence_wrap() {
        let mut w = SendWindow::new(4);

        // Walk the window forward to a left edge of 6.
        for _ in 0..4 {
            send_one(&mut w);
        }
        assert_eq!(w.on_ack(2), AckOutcome::Advanced(2));
        send_one(&mut w);
        send_one(&mut w);
        assert_eq!(w.on_ack(6), AckOutcome::Advanced(4));
        assert_eq!(w.left_edge(), 6);

        // Occupy {6, 7, 0, 1} across the wrap point.
        let sent: Vec<u8> = (0..4).map(|_| send_one(&mut w)).collect();
        assert_eq!(sent, vec![6, 7, 0, 1]);
        assert!(!w.can_send());
        assert_eq!(w.rhs(), 2);

        // Acknowledgments on either side of the wrap compute the right count.
        assert_eq!(w.on_ack(0), AckOutcome::Advanced(2));
        assert_eq!(w.left_edge(), 0);
        assert_eq!(w.on_ack(2), AckOutcome::Advanced(2));
        assert!(w.is_empty());
        assert_eq!(w.vs(), 2);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut w = SendWindow::new(4);
        send_one(&mut w);
        send_one(&mut w);
        w.reset();
        assert_eq!(w.vs(), 0);
        assert_eq!(w.left_edge(), 0);
        assert!(w.is_empty());
        assert!(w.can_send());
    }
}
