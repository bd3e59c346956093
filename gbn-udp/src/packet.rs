//! Wire-format definitions for protocol segments.
//!
//! Every datagram exchanged between peers is a [`Segment`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (three header fields + payload).
//! - Serialising a [`Segment`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Segment`], returning errors
//!   for truncated input or an unknown type tag.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Segment Type                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Payload ... (DATA only)                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 12 bytes.

use std::fmt;

use thiserror::Error;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 12;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_KIND: usize = 8;

/// The closed set of segment types understood by both peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SegmentKind {
    /// Connection request.
    Syn = 0,
    /// Responder's answer to a SYN.
    SynAck = 1,
    /// Final handshake acknowledgement.
    Ack = 2,
    /// Application data unit.
    Data = 3,
    /// Cumulative acknowledgement of data.
    DataAck = 4,
    /// Close request.
    Fin = 5,
    /// Acknowledgement of a close request.
    FinAck = 6,
}

impl TryFrom<u32> for SegmentKind {
    type Error = PacketError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => Self::Syn,
            1 => Self::SynAck,
            2 => Self::Ack,
            3 => Self::Data,
            4 => Self::DataAck,
            5 => Self::Fin,
            6 => Self::FinAck,
            other => return Err(PacketError::UnknownKind(other)),
        })
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Syn => "SYN",
            Self::SynAck => "SYN-ACK",
            Self::Ack => "ACK",
            Self::Data => "DATA",
            Self::DataAck => "DATA-ACK",
            Self::Fin => "FIN",
            Self::FinAck => "FIN-ACK",
        };
        f.write_str(name)
    }
}

/// A complete protocol datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Sequence number of this segment.
    pub seq: u32,
    /// Acknowledgement number; meaning depends on `kind`.
    pub ack: u32,
    pub kind: SegmentKind,
    /// Raw payload, only ever non-empty for [`SegmentKind::Data`].
    pub payload: Vec<u8>,
}

impl Segment {
    /// Build a header-only segment.
    pub fn control(kind: SegmentKind, seq: u32, ack: u32) -> Self {
        Self {
            seq,
            ack,
            kind,
            payload: Vec::new(),
        }
    }

    /// Build a DATA segment. The acknowledgement field is unused and left 0.
    pub fn data(seq: u32, payload: Vec<u8>) -> Self {
        Self {
            seq,
            ack: 0,
            kind: SegmentKind::Data,
            payload,
        }
    }

    /// Serialise this segment into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];

        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.ack.to_be_bytes());
        buf[OFF_KIND..OFF_KIND + 4].copy_from_slice(&(self.kind as u32).to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        buf
    }

    /// Parse a [`Segment`] from a raw byte slice.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`], or
    /// - the type field is not one of the seven defined [`SegmentKind`]s.
    ///
    /// Everything past the header is taken as payload.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }

        let seq = read_u32(buf, OFF_SEQ);
        let ack = read_u32(buf, OFF_ACK);
        let kind = SegmentKind::try_from(read_u32(buf, OFF_KIND))?;

        Ok(Segment {
            seq,
            ack,
            kind,
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} seq={} ack={}", self.kind, self.seq, self.ack)?;
        if !self.payload.is_empty() {
            write!(f, " len={}", self.payload.len())?;
        }
        f.write_str("]")
    }
}

#[inline]
fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer shorter than the fixed header size.
    #[error("datagram of {0} bytes is too short to contain a header")]
    BufferTooShort(usize),
    /// Type field outside the defined enumeration.
    #[error("unknown segment type {0}")]
    UnknownKind(u32),
}
