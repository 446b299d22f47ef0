//! Channel transport abstraction.
//!
//! The link engine never touches sockets directly; it talks to a
//! [`FrameChannel`], which moves whole frames (opaque wire strings) between
//! stations.  Two implementations exist:
//! - [`UdpChannel`] (here) carries one frame per datagram over a connected
//!   UDP socket.
//! - [`crate::simulator::LinkedChannel`] is an in-process pair with fault
//!   injection, used by the tests.
//!
//! All protocol logic lives elsewhere; this layer owns only frame I/O.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

/// Largest datagram a channel will accept: FLAG + address + control +
/// 64 bytes of bit-encoded information + FLAG, with headroom.
const MAX_FRAME_BYTES: usize = 1024;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Underlying I/O error from the OS.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation on a channel that has been closed locally.
    #[error("channel is closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// FrameChannel
// ---------------------------------------------------------------------------

/// A frame-oriented transport between two stations.
///
/// `receive` distinguishes "channel closed" (`Ok(None)`) from transport
/// faults (`Err`); `poll_receive` makes a single non-blocking attempt and
/// reports an empty channel as `Ok(None)`.
#[allow(async_fn_in_trait)]
pub trait FrameChannel {
    /// Send one frame to the peer.
    async fn transmit(&mut self, frame: &str) -> Result<(), ChannelError>;

    /// Block until the next frame arrives.  `Ok(None)` means the channel
    /// was closed and no further frames will ever arrive.
    async fn receive(&mut self) -> Result<Option<String>, ChannelError>;

    /// Single non-blocking receive attempt.  `Ok(None)` means no frame is
    /// available right now.
    fn poll_receive(&mut self) -> Result<Option<String>, ChannelError>;

    /// Release the underlying transport; subsequent operations fail or
    /// report closure.
    fn close(&mut self);
}

// ---------------------------------------------------------------------------
// UdpChannel
// ---------------------------------------------------------------------------

/// A frame channel carried over a connected UDP socket, one datagram per
/// frame.
#[derive(Debug)]
pub struct UdpChannel {
    /// Address this socket is bound to (filled in after the OS assigns an
    /// ephemeral port).
    pub local_addr: SocketAddr,
    socket: UdpSocket,
    closed: bool,
}

impl UdpChannel {
    /// Bind to `local_addr` and connect to the peer station at `peer`.
    ///
    /// Passing a port of 0 lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr, peer: SocketAddr) -> Result<Self, ChannelError> {
        let socket = UdpSocket::bind(local_addr).await?;
        socket.connect(peer).await?;
        let local_addr = socket.local_addr()?;
        Ok(Self {
            local_addr,
            socket,
            closed: false,
        })
    }
}

impl FrameChannel for UdpChannel {
    async fn transmit(&mut self, frame: &str) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        self.socket.send(frame.as_bytes()).await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<String>, ChannelError> {
        if self.closed {
            return Ok(None);
        }
        let mut buf = vec![0u8; MAX_FRAME_BYTES];
        let n = self.socket.recv(&mut buf).await?;
        buf.truncate(n);
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    fn poll_receive(&mut self) -> Result<Option<String>, ChannelError> {
        if self.closed {
            return Ok(None);
        }
        let mut buf = vec![0u8; MAX_FRAME_BYTES];
        match self.socket.try_recv(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
