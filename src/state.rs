//! Link finite-state machine (FSM) types.
//!
//! This module defines the states a [`crate::link::SecondaryLink`] can
//! occupy during the normal-response-mode connection lifecycle.  State
//! transitions are *not* implemented here; they are driven by the service
//! operations in [`crate::link`].
//!
//! ```text
//!  DISCONNECTED ──SNRM received──▶ AWAITING_RESPONSE ──UA sent──▶ CONNECTED
//!       ▲                                                             │
//!       └───────────────────────DISC received─────────────────────────┘
//! ```

/// All possible states of the link FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No connection exists; initial state.
    Disconnected,
    /// SNRM accepted; the UA response has not been sent yet.
    AwaitingResponse,
    /// UA sent; data transfer is permitted.
    Connected,
}

impl Default for LinkState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
