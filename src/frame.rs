//! Wire-format definitions for HDLC frames.
//!
//! Every unit exchanged between stations is a [`Frame`].  This module is
//! responsible for:
//! - Defining the on-wire bit layout (delimiters, address, control field,
//!   information field).
//! - Serialising a [`Frame`] into an ASCII bitstring ready for transmission.
//! - Deserialising a raw bitstring back into a [`Frame`], returning errors
//!   for malformed or truncated input.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! A frame is a string of `'0'`/`'1'` characters bounded by FLAG delimiters.
//! Bit offsets are fixed:
//!
//! ```text
//!  0        8        16       24                    len-8
//! +--------+--------+--------+---------------------+--------+
//! |  FLAG  |  ADDR  |  CTRL  |  INFO (I-frames)    |  FLAG  |
//! +--------+--------+--------+---------------------+--------+
//! ```
//!
//! The 8-bit control field distinguishes the three frame classes:
//!
//! ```text
//! I-frame:  0  N(S) N(S) N(S)  P/F  N(R) N(R) N(R)
//! S-frame:  1  0    SS   SS    P/F  N(R) N(R) N(R)
//! U-frame:  1  1    M1   M1    P/F  M2   M2   M2
//! ```
//!
//! Only the receiver-ready supervisory function (SS = 00) exists.  There is
//! no FCS and no bit stuffing; frames are exchanged verbatim as strings.

use std::fmt;

use thiserror::Error;

use crate::bits::{self, BitFieldError};

/// Sequence numbers are 3 bits wide; all N(S)/N(R) arithmetic is modulo 8.
pub const SEQ_MODULO: u8 = 8;

/// Largest information field, in bytes, before bit-encoding.
pub const MAX_INFO_BYTES: usize = 64;

/// Fixed bit offsets of each field within a serialised frame.
pub mod layout {
    /// Opening/closing delimiter.
    pub const FLAG: &str = "01111110";
    /// Delimiter width in bits.
    pub const FLAG_BITS: usize = 8;

    pub const ADR_START: usize = 8;
    pub const ADR_END: usize = 16;
    pub const ADR_SIZE_BITS: usize = 8;

    pub const CTRL_START: usize = 16;
    pub const CTRL_END: usize = 24;

    pub const NS_START: usize = 17;
    pub const NS_END: usize = 20;
    pub const PF_BIT: usize = 20;
    pub const NR_START: usize = 21;
    pub const NR_END: usize = 24;

    pub const SS_START: usize = 18;
    pub const SS_END: usize = 20;
    pub const M1_START: usize = 18;
    pub const M1_END: usize = 20;
    pub const M2_START: usize = 21;
    pub const M2_END: usize = 24;

    pub const INFO_START: usize = 24;

    /// Width of the sequence-number fields.
    pub const SEQ_SIZE_BITS: usize = 3;

    /// Smallest well-formed frame: FLAG + address + control + FLAG.
    pub const MIN_FRAME_BITS: usize = 32;

    /// Control-field type discriminators.
    pub const S_TYPE: &str = "10";
    pub const U_TYPE: &str = "11";

    /// Receiver-ready supervisory function bits.
    pub const RR_SS: &str = "00";
}

/// U-frame modifier codes, packed as `M1 << 3 | M2`.
pub mod modifier {
    /// Set normal response mode.
    pub const SNRM: u8 = 0b00_001;
    /// Disconnect.
    pub const DISC: u8 = 0b00_010;
    /// Unnumbered acknowledge.
    pub const UA: u8 = 0b00_110;
}

// ---------------------------------------------------------------------------
// Frame kinds and modifiers
// ---------------------------------------------------------------------------

/// The three HDLC frame classes, as read from the control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Information,
    Supervisory,
    Unnumbered,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameKind::Information => "I",
            FrameKind::Supervisory => "S",
            FrameKind::Unnumbered => "U",
        };
        write!(f, "{s}")
    }
}

/// U-frame modifier function.
///
/// Unknown modifier bit patterns decode to [`UnnumberedKind::Other`] so the
/// observed value can be reported back to the caller verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnnumberedKind {
    SetNormalResponseMode,
    Disconnect,
    UnnumberedAck,
    /// Unrecognised modifier, packed as `M1 << 3 | M2`.
    Other(u8),
}

impl UnnumberedKind {
    /// The packed 5-bit modifier code for this function.
    pub fn bits(self) -> u8 {
        match self {
            UnnumberedKind::SetNormalResponseMode => modifier::SNRM,
            UnnumberedKind::Disconnect => modifier::DISC,
            UnnumberedKind::UnnumberedAck => modifier::UA,
            UnnumberedKind::Other(bits) => bits & 0b11_111,
        }
    }

    /// Decode a packed 5-bit modifier code.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11_111 {
            modifier::SNRM => UnnumberedKind::SetNormalResponseMode,
            modifier::DISC => UnnumberedKind::Disconnect,
            modifier::UA => UnnumberedKind::UnnumberedAck,
            other => UnnumberedKind::Other(other),
        }
    }
}

impl fmt::Display for UnnumberedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnnumberedKind::SetNormalResponseMode => write!(f, "SNRM"),
            UnnumberedKind::Disconnect => write!(f, "DISC"),
            UnnumberedKind::UnnumberedAck => write!(f, "UA"),
            UnnumberedKind::Other(bits) => write!(f, "m={bits:#07b}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A parsed frame with typed fields.
///
/// Field values are plain integers and bytes; the bitstring representation
/// exists only on the wire, produced by [`Frame::encode`] and consumed by
/// [`Frame::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Connection-management frame carrying a modifier function.
    Unnumbered {
        address: u8,
        modifier: UnnumberedKind,
        poll_final: bool,
    },
    /// Receiver-ready acknowledgment/poll frame.
    Supervisory {
        address: u8,
        poll_final: bool,
        nr: u8,
    },
    /// Numbered data frame with a piggy-backed acknowledgment.
    Information {
        address: u8,
        ns: u8,
        poll_final: bool,
        nr: u8,
        payload: Vec<u8>,
    },
}

/// Errors that can arise when parsing a raw frame string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Frame shorter than the fixed header + delimiters.
    #[error("frame of {bits} bits is shorter than the {min}-bit minimum")]
    TooShort { bits: usize, min: usize },

    /// Frame does not start and end with the FLAG delimiter.
    #[error("frame is not bounded by FLAG delimiters")]
    MissingDelimiter,

    /// A fixed-width field failed to decode.
    #[error("bad bit field: {0}")]
    Field(#[from] BitFieldError),

    /// S-frame whose supervisory bits are not receiver-ready.
    #[error("unsupported supervisory function bits {0:?}")]
    UnsupportedSupervisory(String),

    /// Information field on a frame class that carries none.
    #[error("unexpected information field on a non-I frame")]
    UnexpectedInformation,

    /// Information field larger than [`MAX_INFO_BYTES`].
    #[error("information field of {bytes} bytes exceeds the {max}-byte maximum")]
    OversizedInformation { bytes: usize, max: usize },
}

impl Frame {
    /// The frame class of this frame.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Unnumbered { .. } => FrameKind::Unnumbered,
            Frame::Supervisory { .. } => FrameKind::Supervisory,
            Frame::Information { .. } => FrameKind::Information,
        }
    }

    /// Station address carried in the address field.
    pub fn address(&self) -> u8 {
        match self {
            Frame::Unnumbered { address, .. }
            | Frame::Supervisory { address, .. }
            | Frame::Information { address, .. } => *address,
        }
    }

    /// Poll/final bit.
    pub fn poll_final(&self) -> bool {
        match self {
            Frame::Unnumbered { poll_final, .. }
            | Frame::Supervisory { poll_final, .. }
            | Frame::Information { poll_final, .. } => *poll_final,
        }
    }

    /// Serialise this frame into its wire bitstring.
    pub fn encode(&self) -> String {
        let mut out = String::from(layout::FLAG);
        out.push_str(&bits::int_to_bits(
            u32::from(self.address()),
            layout::ADR_SIZE_BITS,
        ));
        match self {
            Frame::Unnumbered {
                modifier,
                poll_final,
                ..
            } => {
                let m = modifier.bits();
                out.push_str(layout::U_TYPE);
                out.push_str(&bits::int_to_bits(u32::from(m >> 3), 2));
                out.push(pf_char(*poll_final));
                out.push_str(&bits::int_to_bits(u32::from(m & 0b111), 3));
            }
            Frame::Supervisory {
                poll_final, nr, ..
            } => {
                debug_assert!(*nr < SEQ_MODULO);
                out.push_str(layout::S_TYPE);
                out.push_str(layout::RR_SS);
                out.push(pf_char(*poll_final));
                out.push_str(&bits::int_to_bits(u32::from(*nr), layout::SEQ_SIZE_BITS));
            }
            Frame::Information {
                ns,
                poll_final,
                nr,
                payload,
                ..
            } => {
                debug_assert!(*ns < SEQ_MODULO && *nr < SEQ_MODULO);
                debug_assert!(payload.len() <= MAX_INFO_BYTES);
                out.push('0');
                out.push_str(&bits::int_to_bits(u32::from(*ns), layout::SEQ_SIZE_BITS));
                out.push(pf_char(*poll_final));
                out.push_str(&bits::int_to_bits(u32::from(*nr), layout::SEQ_SIZE_BITS));
                out.push_str(&bits::bytes_to_bits(payload));
            }
        }
        out.push_str(layout::FLAG);
        out
    }

    /// Parse a [`Frame`] from a raw wire string.
    ///
    /// Returns [`Err`] if the string is shorter than [`layout::MIN_FRAME_BITS`],
    /// is not FLAG-delimited, contains non-binary characters, carries an
    /// information field on a non-I frame, or uses a supervisory function
    /// other than receiver-ready.
    pub fn decode(wire: &str) -> Result<Self, FrameError> {
        if !wire.chars().all(|c| c == '0' || c == '1') {
            let bad = wire
                .chars()
                .find(|c| *c != '0' && *c != '1')
                .unwrap_or('?');
            return Err(BitFieldError::NonBinaryDigit(bad).into());
        }
        if wire.len() < layout::MIN_FRAME_BITS {
            return Err(FrameError::TooShort {
                bits: wire.len(),
                min: layout::MIN_FRAME_BITS,
            });
        }
        if !wire.starts_with(layout::FLAG) || !wire.ends_with(layout::FLAG) {
            return Err(FrameError::MissingDelimiter);
        }

        let address = bits::bits_to_int(&wire[layout::ADR_START..layout::ADR_END])? as u8;
        let ctrl = &wire[layout::CTRL_START..layout::CTRL_END];
        let body_end = wire.len() - layout::FLAG_BITS;
        let info = &wire[layout::INFO_START..body_end];
        let poll_final = &wire[layout::PF_BIT..layout::PF_BIT + 1] == "1";

        if ctrl.starts_with('0') {
            let ns = bits::bits_to_int(&wire[layout::NS_START..layout::NS_END])? as u8;
            let nr = bits::bits_to_int(&wire[layout::NR_START..layout::NR_END])? as u8;
            let payload = bits::bits_to_bytes(info)?;
            if payload.len() > MAX_INFO_BYTES {
                return Err(FrameError::OversizedInformation {
                    bytes: payload.len(),
                    max: MAX_INFO_BYTES,
                });
            }
            return Ok(Frame::Information {
                address,
                ns,
                poll_final,
                nr,
                payload,
            });
        }

        if !info.is_empty() {
            return Err(FrameError::UnexpectedInformation);
        }

        if ctrl.starts_with(layout::S_TYPE) {
            let ss = &wire[layout::SS_START..layout::SS_END];
            if ss != layout::RR_SS {
                return Err(FrameError::UnsupportedSupervisory(ss.to_string()));
            }
            let nr = bits::bits_to_int(&wire[layout::NR_START..layout::NR_END])? as u8;
            return Ok(Frame::Supervisory {
                address,
                poll_final,
                nr,
            });
        }

        let m1 = bits::bits_to_int(&wire[layout::M1_START..layout::M1_END])? as u8;
        let m2 = bits::bits_to_int(&wire[layout::M2_START..layout::M2_END])? as u8;
        Ok(Frame::Unnumbered {
            address,
            modifier: UnnumberedKind::from_bits(m1 << 3 | m2),
            poll_final,
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Unnumbered {
                address,
                modifier,
                poll_final,
            } => write!(f, "U[adr={address} {modifier} p/f={}]", u8::from(*poll_final)),
            Frame::Supervisory {
                address,
                poll_final,
                nr,
            } => write!(f, "S[adr={address} RR p/f={} nr={nr}]", u8::from(*poll_final)),
            Frame::Information {
                address,
                ns,
                poll_final,
                nr,
                payload,
            } => write!(
                f,
                "I[adr={address} ns={ns} p/f={} nr={nr} len={}]",
                u8::from(*poll_final),
                payload.len()
            ),
        }
    }
}

fn pf_char(poll_final: bool) -> char {
    if poll_final {
        '1'
    } else {
        '0'
    }
}

/// Render a wire string with its fields separated by spaces, for log output.
///
/// Malformed strings are returned unchanged.
pub fn format_wire(wire: &str) -> String {
    if wire.len() < layout::MIN_FRAME_BITS {
        return wire.to_string();
    }
    let body_end = wire.len() - layout::FLAG_BITS;
    let segments = [
        &wire[..layout::ADR_START],
        &wire[layout::ADR_START..layout::ADR_END],
        &wire[layout::CTRL_START..layout::CTRL_END],
        &wire[layout::INFO_START..body_end],
        &wire[body_end..],
    ];
    segments
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
