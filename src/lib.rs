//! `hdlc-secondary` — a simplified HDLC secondary station speaking normal
//! response mode over an unreliable frame channel.
//!
//! # Architecture
//!
//! ```text
//!  ┌─────────────┐  SNRM / DISC / RR   ┌─────────────┐
//!  │   Primary   │────────────────────▶│  Secondary  │
//!  └──────▲──────┘                     └──────┬──────┘
//!         │        I-frames (go-back-N)       │
//!         └────────────────────────────────────┘
//!                                             │
//!  ┌──────────────────────────────────────────▼──┐
//!  │               SecondaryLink                 │
//!  │  (FSM + sliding window + reception filter)  │
//!  └──────┬──────────────────────────────────────┘
//!         │ whole frames as wire strings
//!  ┌──────▼──────┐
//!  │ FrameChannel│  (UDP datagrams, or an in-memory pair in tests)
//!  └─────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`bits`]      — bit-field codec (integer ↔ bitstring, payload chunking)
//! - [`frame`]     — wire format (serialise / deserialise U-, S-, I-frames)
//! - [`state`]     — connection finite-state-machine types
//! - [`window`]    — go-back-N outbound window state machine
//! - [`link`]      — the data-link entity and its service operations
//! - [`channel`]   — frame transport abstraction + UDP implementation
//! - [`simulator`] — in-memory lossy channel pair for testing

pub mod bits;
pub mod channel;
pub mod frame;
pub mod link;
pub mod simulator;
pub mod state;
pub mod window;
