//! Secondary-station data-link entity: services + transfer control loop.
//!
//! # Architecture
//!
//! ```text
//!  Application / network layer
//!      │  connect_indication / connect_response
//!      │  disconnect_indication / data_request
//!      ▼
//!  SecondaryLink
//!    ├── LinkState   (connection FSM)
//!    ├── SendWindow  (go-back-N outbound window)
//!    └── C: FrameChannel  (UDP or simulated link)
//! ```
//!
//! # Service model
//!
//! The station operates in normal response mode: it transmits data only
//! after the primary polls it with a receiver-ready frame whose poll bit is
//! set.  Connection management is a confirmed indication/response pair
//! (SNRM in, UA out); disconnection is a plain indication with no response
//! frame at this layer.
//!
//! There is no retransmission timer.  The transfer loop makes progress only
//! on acknowledgments: a duplicate acknowledgment rewinds the window cursor
//! and replays the unacknowledged frames (go back N).  A peer that neither
//! acknowledges nor re-polls stalls the service call indefinitely.
//!
//! TODO: expose a timeout/cancellation hook around the blocking waits so an
//! application layer can abort a stalled call.

use std::time::Duration;

use thiserror::Error;

use crate::bits;
use crate::channel::{ChannelError, FrameChannel};
use crate::frame::{format_wire, Frame, UnnumberedKind, MAX_INFO_BYTES};
use crate::state::LinkState;
use crate::window::{AckOutcome, SendWindow, DEFAULT_WINDOW_SIZE};

/// Idle delay inserted when a transfer-loop iteration neither transmits nor
/// receives, bounding the acknowledgment busy-poll.
const ACK_POLL_DELAY: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Service outcomes and errors
// ---------------------------------------------------------------------------

/// Outcome code of a confirmed service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCode {
    /// The service completed as requested.
    Successful,
    /// A frame of the wrong class arrived (e.g. an I-frame where a U-frame
    /// was required).
    UnexpectedFrame,
    /// A U-frame arrived, but with the wrong modifier function.
    UnexpectedUnnumbered,
}

/// Result of a confirmed service call.
///
/// `detail` carries the observed frame kind or modifier when the peer sent
/// something other than what the operation required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOutcome {
    pub code: ServiceCode,
    pub address: u8,
    pub detail: Option<String>,
}

impl ServiceOutcome {
    fn successful(address: u8) -> Self {
        Self {
            code: ServiceCode::Successful,
            address,
            detail: None,
        }
    }

    /// `true` when the service completed as requested.
    pub fn is_successful(&self) -> bool {
        self.code == ServiceCode::Successful
    }
}

/// Hard faults of the link entity, as opposed to rejected service outcomes.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The channel transport failed.
    #[error("channel transport error: {0}")]
    Channel(#[from] ChannelError),

    /// The channel closed while a service was waiting for a frame.
    #[error("channel closed while waiting for a frame")]
    ChannelClosed,

    /// A data transfer was requested outside the connected state.
    #[error("service requires an established connection")]
    NotConnected,
}

// ---------------------------------------------------------------------------
// SecondaryLink
// ---------------------------------------------------------------------------

/// A secondary-station data-link entity bound to one station address and one
/// channel transport.
pub struct SecondaryLink<C: FrameChannel> {
    /// Current FSM state.
    pub state: LinkState,

    /// Outbound go-back-N window.
    pub window: SendWindow,

    channel: C,
    address: u8,

    /// Receive variable V(R): next expected inbound sequence number, echoed
    /// as N(R) in outbound I-frames.  The secondary receives no numbered
    /// frames in this role, so it only changes on connection reset.
    vr: u8,
}

impl<C: FrameChannel> SecondaryLink<C> {
    /// Create a link entity with the nominal window size.
    pub fn new(channel: C, address: u8) -> Self {
        Self::with_window_size(channel, address, DEFAULT_WINDOW_SIZE)
    }

    /// Create a link entity with an explicit window size (1..=8).
    pub fn with_window_size(channel: C, address: u8, window_size: usize) -> Self {
        Self {
            state: LinkState::Disconnected,
            window: SendWindow::new(window_size),
            channel,
            address,
            vr: 0,
        }
    }

    /// The station address this entity filters on.
    pub fn station_address(&self) -> u8 {
        self.address
    }

    /// Release the channel transport.
    pub fn close(mut self) {
        log::debug!("[link] station {}: closing channel", self.address);
        self.channel.close();
    }

    // -----------------------------------------------------------------------
    // Connection service (confirmed)
    // -----------------------------------------------------------------------

    /// Wait for the primary to request a connection with an SNRM frame.
    ///
    /// Blocks until a frame addressed to this station arrives.  A frame of
    /// the wrong class or a U-frame with the wrong modifier is reported as a
    /// rejected outcome carrying the observed kind/modifier; the caller may
    /// retry the indication.  On success the caller must follow up with
    /// [`connect_response`](Self::connect_response).
    pub async fn connect_indication(&mut self) -> Result<ServiceOutcome, LinkError> {
        let frame = self.next_addressed_frame().await?;
        let address = frame.address();
        match frame {
            Frame::Unnumbered {
                modifier: UnnumberedKind::SetNormalResponseMode,
                ..
            } => {
                log::debug!("[link] ← SNRM adr={address}");
                self.state = LinkState::AwaitingResponse;
                Ok(ServiceOutcome::successful(address))
            }
            Frame::Unnumbered { modifier, .. } => Ok(ServiceOutcome {
                code: ServiceCode::UnexpectedUnnumbered,
                address,
                detail: Some(modifier.to_string()),
            }),
            other => Ok(ServiceOutcome {
                code: ServiceCode::UnexpectedFrame,
                address,
                detail: Some(other.kind().to_string()),
            }),
        }
    }

    /// Accept the connection: transmit an unnumbered-acknowledge frame and
    /// reset all window state.
    pub async fn connect_response(&mut self) -> Result<ServiceOutcome, LinkError> {
        let ua = Frame::Unnumbered {
            address: self.address,
            modifier: UnnumberedKind::UnnumberedAck,
            poll_final: true,
        };
        let wire = ua.encode();
        log::debug!("[link] → UA >{}<", format_wire(&wire));
        self.channel.transmit(&wire).await?;
        self.window.reset();
        self.vr = 0;
        self.state = LinkState::Connected;
        self.log_window_state("connection established");
        Ok(ServiceOutcome::successful(self.address))
    }

    // -----------------------------------------------------------------------
    // Disconnect service (non-confirmed)
    // -----------------------------------------------------------------------

    /// Wait for the primary to end the connection with a DISC frame.
    ///
    /// No response frame is transmitted; disconnection is a non-confirmed
    /// service at this layer.
    pub async fn disconnect_indication(&mut self) -> Result<ServiceOutcome, LinkError> {
        let frame = self.next_addressed_frame().await?;
        let address = frame.address();
        match frame {
            Frame::Unnumbered {
                modifier: UnnumberedKind::Disconnect,
                ..
            } => {
                log::debug!("[link] ← DISC adr={address}");
                self.state = LinkState::Disconnected;
                Ok(ServiceOutcome::successful(address))
            }
            Frame::Unnumbered { modifier, .. } => Ok(ServiceOutcome {
                code: ServiceCode::UnexpectedUnnumbered,
                address,
                detail: Some(modifier.to_string()),
            }),
            other => Ok(ServiceOutcome {
                code: ServiceCode::UnexpectedFrame,
                address,
                detail: Some(other.kind().to_string()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Data service (confirmed)
    // -----------------------------------------------------------------------

    /// Deliver `sdu` to the primary reliably under go-back-N flow control.
    ///
    /// Waits for the primary's poll (receiver-ready with the poll bit set),
    /// fragments the payload into frames of at most [`MAX_INFO_BYTES`]
    /// bytes, then alternates transmitting while the window is open with
    /// non-blocking acknowledgment checks.  Returns once every fragment has
    /// been transmitted and acknowledged.
    pub async fn data_request(&mut self, sdu: &[u8]) -> Result<ServiceOutcome, LinkError> {
        if self.state != LinkState::Connected {
            return Err(LinkError::NotConnected);
        }

        // Poll synchronisation: the primary invites transmission with an RR
        // whose poll bit is set.  Anything else is discarded.
        loop {
            let (nr, poll) = self.next_ack_frame().await?;
            if poll {
                log::debug!("[link] ← RR poll nr={nr}");
                break;
            }
            log::trace!("[link] RR without poll bit discarded (nr={nr})");
        }

        let fragments = bits::split_chunks(sdu, MAX_INFO_BYTES);
        let total = fragments.len();
        log::debug!(
            "[link] station {}: sending {} byte(s) as {total} fragment(s)",
            self.address,
            sdu.len()
        );

        let mut next_fragment = 0usize;
        while next_fragment < total || !self.window.is_empty() {
            let mut progressed = false;

            // One transmission per iteration: pending retransmissions replay
            // first, then new frames while the window is open.
            if let Some((ns, wire)) = self.window.next_retransmit() {
                self.channel.transmit(&wire).await?;
                progressed = true;
                log::debug!(
                    "[link] → I ns={ns} (retransmit) in_flight={}",
                    self.window.in_flight()
                );
            } else if self.window.can_send() && next_fragment < total {
                let ns = self.window.vs();
                let is_final = next_fragment + 1 == total;
                let frame = Frame::Information {
                    address: self.address,
                    ns,
                    poll_final: is_final,
                    nr: self.vr,
                    payload: fragments[next_fragment].to_vec(),
                };
                let wire = frame.encode();
                self.channel.transmit(&wire).await?;
                self.window.record_sent(wire);
                next_fragment += 1;
                progressed = true;
                log::debug!(
                    "[link] → I ns={ns} final={is_final} in_flight={}",
                    self.window.in_flight()
                );
            }

            // Single non-blocking acknowledgment check.
            if let Some((nr, _poll)) = self.poll_ack_frame()? {
                progressed = true;
                match self.window.on_ack(nr) {
                    AckOutcome::Advanced(n) => {
                        log::debug!("[link] ← RR nr={nr} (retired {n})");
                        self.log_window_state("window advanced");
                    }
                    AckOutcome::GoBackN(n) => {
                        log::debug!("[link] ← RR nr={nr} duplicate; going back {n}");
                        self.log_window_state("go-back-N");
                    }
                    AckOutcome::Ignored => {
                        log::warn!("[link] ← RR nr={nr} outside window; ignored");
                    }
                }
            } else if !progressed {
                tokio::time::sleep(ACK_POLL_DELAY).await;
            }
        }

        log::debug!(
            "[link] station {}: {total} fragment(s) delivered and acknowledged",
            self.address
        );
        Ok(ServiceOutcome::successful(0))
    }

    // -----------------------------------------------------------------------
    // Reception filter
    // -----------------------------------------------------------------------

    /// Block until a well-formed frame addressed to this station arrives.
    ///
    /// Frames that fail to decode or carry another station's address are
    /// discarded without surfacing to higher logic.  A closed channel ends
    /// the wait with [`LinkError::ChannelClosed`].
    async fn next_addressed_frame(&mut self) -> Result<Frame, LinkError> {
        loop {
            let Some(wire) = self.channel.receive().await? else {
                return Err(LinkError::ChannelClosed);
            };
            if let Some(frame) = self.screen_frame(&wire) {
                return Ok(frame);
            }
        }
    }

    /// Single non-blocking attempt at an addressed frame.
    fn poll_addressed_frame(&mut self) -> Result<Option<Frame>, LinkError> {
        let Some(wire) = self.channel.poll_receive()? else {
            return Ok(None);
        };
        Ok(self.screen_frame(&wire))
    }

    /// Decode a raw wire string and apply the address filter.
    fn screen_frame(&self, wire: &str) -> Option<Frame> {
        match Frame::decode(wire) {
            Ok(frame) if frame.address() == self.address => Some(frame),
            Ok(frame) => {
                log::trace!(
                    "[link] frame for station {} ignored (we are {})",
                    frame.address(),
                    self.address
                );
                None
            }
            Err(e) => {
                log::warn!("[link] undecodable frame discarded: {e}");
                None
            }
        }
    }

    /// Block until a receiver-ready frame addressed to this station arrives;
    /// returns its `(N(R), poll/final)` pair.  Non-RR frames are discarded.
    async fn next_ack_frame(&mut self) -> Result<(u8, bool), LinkError> {
        loop {
            let frame = self.next_addressed_frame().await?;
            match frame {
                Frame::Supervisory { nr, poll_final, .. } => return Ok((nr, poll_final)),
                other => log::trace!("[link] expected RR, discarded {other}"),
            }
        }
    }

    /// Single non-blocking attempt at a receiver-ready frame.
    fn poll_ack_frame(&mut self) -> Result<Option<(u8, bool)>, LinkError> {
        match self.poll_addressed_frame()? {
            Some(Frame::Supervisory { nr, poll_final, .. }) => Ok(Some((nr, poll_final))),
            Some(other) => {
                log::trace!("[link] expected RR, discarded {other}");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Log the window counters after a state change.
    fn log_window_state(&self, msg: &str) {
        log::debug!(
            "[link] station {}: {msg}: v(s)={} window lhs={} rhs={} buffered={}",
            self.address,
            self.window.vs(),
            self.window.left_edge(),
            self.window.rhs(),
            self.window.in_flight()
        );
    }
}
