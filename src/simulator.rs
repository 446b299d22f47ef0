//! In-process channel pair with fault injection, for deterministic testing.
//!
//! Real links drop and duplicate frames.  To exercise the go-back-N
//! machinery without depending on actual network conditions, this module
//! provides [`LinkedChannel`]: two endpoints joined by in-memory queues,
//! implementing [`FrameChannel`] and applying a configurable fault model on
//! transmit:
//!
//! | Fault       | Description                                            |
//! |-------------|--------------------------------------------------------|
//! | Drop list   | Drop the nth transmit call, by 0-based index.          |
//! | Dup list    | Deliver the nth transmit call twice.                   |
//! | Random loss | Drop any frame with probability `loss_rate` (seeded).  |
//!
//! The scripted lists make loss scenarios exactly reproducible; the random
//! model uses a fixed-seed RNG so probabilistic runs replay identically.

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::mpsc;

use crate::channel::{ChannelError, FrameChannel};

/// Seed for the fault-injection RNG; fixed so failures are reproducible.
const FAULT_SEED: u64 = 0x5eed;

// ---------------------------------------------------------------------------
// FaultPlan
// ---------------------------------------------------------------------------

/// Configuration for the fault model applied to one endpoint's transmits.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Probability in `[0.0, 1.0]` that any given frame is silently dropped.
    pub loss_rate: f64,
    /// 0-based indices of transmit calls to drop deterministically.
    pub drop_sends: Vec<usize>,
    /// 0-based indices of transmit calls to deliver twice.
    pub duplicate_sends: Vec<usize>,
}

// ---------------------------------------------------------------------------
// LinkedChannel
// ---------------------------------------------------------------------------

/// One endpoint of an in-memory channel pair.
#[derive(Debug)]
pub struct LinkedChannel {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
    /// Fault model applied to this endpoint's outbound frames.
    pub faults: FaultPlan,
    rng: StdRng,
    sent: usize,
    closed: bool,
}

/// Create two connected endpoints with no faults configured.
///
/// Frames transmitted on one endpoint arrive, in order, at the other.
pub fn linked_pair() -> (LinkedChannel, LinkedChannel) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    let make = |tx, rx| LinkedChannel {
        tx,
        rx,
        faults: FaultPlan::default(),
        rng: StdRng::seed_from_u64(FAULT_SEED),
        sent: 0,
        closed: false,
    };
    (make(a_tx, a_rx), make(b_tx, b_rx))
}

impl LinkedChannel {
    /// Whether the frame with this transmit index should be dropped.
    fn should_drop(&mut self, index: usize) -> bool {
        if self.faults.drop_sends.contains(&index) {
            return true;
        }
        self.faults.loss_rate > 0.0 && self.rng.gen::<f64>() < self.faults.loss_rate
    }
}

impl FrameChannel for LinkedChannel {
    async fn transmit(&mut self, frame: &str) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        let index = self.sent;
        self.sent += 1;

        if self.should_drop(index) {
            log::debug!("[sim] dropped frame #{index}");
            return Ok(());
        }

        let copies = if self.faults.duplicate_sends.contains(&index) {
            log::debug!("[sim] duplicated frame #{index}");
            2
        } else {
            1
        };
        for _ in 0..copies {
            // A peer that has closed its endpoint just loses the frame, the
            // same way a dead wire would.
            if self.tx.send(frame.to_string()).is_err() {
                log::debug!("[sim] peer gone; frame #{index} lost");
            }
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<String>, ChannelError> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rx.recv().await)
    }

    fn poll_receive(&mut self) -> Result<Option<String>, ChannelError> {
        if self.closed {
            return Ok(None);
        }
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.rx.close();
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
