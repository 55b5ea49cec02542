//! Wire formats exchanged between nodes
//!
//! Every message starts with a one-byte type discriminator followed by a
//! fixed-size payload. All multi-byte fields are big-endian.
//!
//! ```text
//! type  message           payload
//!  1    Hello             x u64, y u64                                   16 B
//!  2    Position          dst x,y u64; updated u32; rec x,y u64;
//!                         in_rec u8; last x,y u64                        53 B
//!  3    DirectoryHello    anchor u32; x,y u64                            20 B
//!  4    DirectoryUpdate   node u32; x,y u64; speed u32                   24 B
//!  5    DirectoryQuery    requester u32; anchor u32; target u32          12 B
//!  6    DirectoryReply    requester u32; target u32; x,y u64             24 B
//!  7    AnchorLookup      anchor u32; target u32; lookup u32             12 B
//!  8    AnchorAnswer      anchor u32; target u32; found u8; x,y u64      25 B
//! ```
//!
//! Decoding consumes exactly one message from the buffer and leaves any
//! trailing bytes (for example the datagram behind a Position header) in
//! place.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::geometry::Position;
use crate::identity::NodeId;

/// Size of the type discriminator
pub const TYPE_LEN: usize = 1;

/// Discriminator of a wire message
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[repr(u8)]
pub enum MessageKind {
    #[display("hello")]
    Hello = 1,
    #[display("position")]
    Position = 2,
    #[display("directory-hello")]
    DirectoryHello = 3,
    #[display("directory-update")]
    DirectoryUpdate = 4,
    #[display("directory-query")]
    DirectoryQuery = 5,
    #[display("directory-reply")]
    DirectoryReply = 6,
    #[display("anchor-lookup")]
    AnchorLookup = 7,
    #[display("anchor-answer")]
    AnchorAnswer = 8,
}

impl MessageKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Hello),
            2 => Some(Self::Position),
            3 => Some(Self::DirectoryHello),
            4 => Some(Self::DirectoryUpdate),
            5 => Some(Self::DirectoryQuery),
            6 => Some(Self::DirectoryReply),
            7 => Some(Self::AnchorLookup),
            8 => Some(Self::AnchorAnswer),
            _ => None,
        }
    }

    /// Fixed payload size, excluding the type byte
    pub const fn payload_len(&self) -> usize {
        match self {
            Self::Hello => 16,
            Self::Position => 53,
            Self::DirectoryHello => 20,
            Self::DirectoryUpdate => 24,
            Self::DirectoryQuery => 12,
            Self::DirectoryReply => 24,
            Self::AnchorLookup => 12,
            Self::AnchorAnswer => 25,
        }
    }

    /// Full encoded size including the type byte
    pub const fn wire_len(&self) -> usize {
        TYPE_LEN + self.payload_len()
    }

    /// Whether this kind belongs to the location directory protocol
    pub fn is_directory(&self) -> bool {
        !matches!(self, Self::Hello | Self::Position)
    }
}

/// A position as carried on the wire, in whole metres
///
/// Negative or non-finite coordinates clamp to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WirePoint {
    pub x: u64,
    pub y: u64,
}

impl WirePoint {
    pub const fn new(x: u64, y: u64) -> Self {
        Self { x, y }
    }

    pub fn to_position(self) -> Position {
        Position::new(self.x as f64, self.y as f64)
    }

    fn put(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.x);
        buf.put_u64(self.y);
    }

    fn get(buf: &mut impl Buf) -> Self {
        let x = buf.get_u64();
        let y = buf.get_u64();
        Self { x, y }
    }
}

impl From<Position> for WirePoint {
    fn from(p: Position) -> Self {
        // `as` saturates: negatives and NaN become 0
        Self {
            x: p.x as u64,
            y: p.y as u64,
        }
    }
}

/// Forwarding-layer neighbor announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hello {
    pub origin: WirePoint,
}

/// Per-packet greedy/recovery routing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionHeader {
    /// Last known position of the destination
    pub destination: WirePoint,
    /// Sample time of `destination`, whole seconds
    pub updated: u32,
    /// Where the packet entered recovery mode
    pub recovery: WirePoint,
    pub in_recovery: bool,
    /// Position of the node that last forwarded the packet
    pub previous_hop: WirePoint,
}

/// Anchor announcing itself to a mobile node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryHello {
    pub anchor: NodeId,
    pub position: WirePoint,
}

/// Mobile node registering its position and speed with its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryUpdate {
    pub node: NodeId,
    pub position: WirePoint,
    pub speed: u32,
}

/// Request for the position of `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryQuery {
    pub requester: NodeId,
    pub anchor: NodeId,
    pub target: NodeId,
}

/// Answer to a [`DirectoryQuery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryReply {
    pub requester: NodeId,
    pub target: NodeId,
    pub position: WirePoint,
}

/// Anchor asking another anchor for its cached knowledge of `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorLookup {
    pub anchor: NodeId,
    pub target: NodeId,
    pub lookup_id: u32,
}

/// Answer to an [`AnchorLookup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorAnswer {
    pub anchor: NodeId,
    pub target: NodeId,
    pub found: bool,
    pub position: WirePoint,
}

/// Any message that can appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Hello(Hello),
    Position(PositionHeader),
    DirectoryHello(DirectoryHello),
    DirectoryUpdate(DirectoryUpdate),
    DirectoryQuery(DirectoryQuery),
    DirectoryReply(DirectoryReply),
    AnchorLookup(AnchorLookup),
    AnchorAnswer(AnchorAnswer),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Hello(_) => MessageKind::Hello,
            Self::Position(_) => MessageKind::Position,
            Self::DirectoryHello(_) => MessageKind::DirectoryHello,
            Self::DirectoryUpdate(_) => MessageKind::DirectoryUpdate,
            Self::DirectoryQuery(_) => MessageKind::DirectoryQuery,
            Self::DirectoryReply(_) => MessageKind::DirectoryReply,
            Self::AnchorLookup(_) => MessageKind::AnchorLookup,
            Self::AnchorAnswer(_) => MessageKind::AnchorAnswer,
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.kind().wire_len()
    }

    /// Encode into a fresh buffer
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Append the encoded message to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u8(self.kind() as u8);

        match self {
            Self::Hello(m) => m.origin.put(buf),
            Self::Position(m) => {
                m.destination.put(buf);
                buf.put_u32(m.updated);
                m.recovery.put(buf);
                buf.put_u8(u8::from(m.in_recovery));
                m.previous_hop.put(buf);
            }
            Self::DirectoryHello(m) => {
                buf.put_u32(m.anchor.as_u32());
                m.position.put(buf);
            }
            Self::DirectoryUpdate(m) => {
                buf.put_u32(m.node.as_u32());
                m.position.put(buf);
                buf.put_u32(m.speed);
            }
            Self::DirectoryQuery(m) => {
                buf.put_u32(m.requester.as_u32());
                buf.put_u32(m.anchor.as_u32());
                buf.put_u32(m.target.as_u32());
            }
            Self::DirectoryReply(m) => {
                buf.put_u32(m.requester.as_u32());
                buf.put_u32(m.target.as_u32());
                m.position.put(buf);
            }
            Self::AnchorLookup(m) => {
                buf.put_u32(m.anchor.as_u32());
                buf.put_u32(m.target.as_u32());
                buf.put_u32(m.lookup_id);
            }
            Self::AnchorAnswer(m) => {
                buf.put_u32(m.anchor.as_u32());
                buf.put_u32(m.target.as_u32());
                buf.put_u8(u8::from(m.found));
                m.position.put(buf);
            }
        }

        debug_assert_eq!(
            buf.len() - start,
            self.encoded_len(),
            "encoded size of {} does not match its wire format",
            self.kind()
        );
    }

    /// Decode one message from the front of `buf`
    ///
    /// On success exactly [`MessageKind::wire_len`] bytes are consumed. On
    /// failure the buffer position is unspecified and the packet should be
    /// dropped.
    pub fn decode(buf: &mut impl Buf) -> Result<Message, DecodeError> {
        if !buf.has_remaining() {
            return Err(DecodeError::Empty);
        }

        let tag = buf.get_u8();
        let kind = MessageKind::from_u8(tag).ok_or(DecodeError::UnknownType(tag))?;

        if buf.remaining() < kind.payload_len() {
            return Err(DecodeError::Truncated {
                kind,
                expected: kind.wire_len(),
                actual: TYPE_LEN + buf.remaining(),
            });
        }

        let message = match kind {
            MessageKind::Hello => Self::Hello(Hello {
                origin: WirePoint::get(buf),
            }),
            MessageKind::Position => Self::Position(PositionHeader {
                destination: WirePoint::get(buf),
                updated: buf.get_u32(),
                recovery: WirePoint::get(buf),
                in_recovery: buf.get_u8() != 0,
                previous_hop: WirePoint::get(buf),
            }),
            MessageKind::DirectoryHello => Self::DirectoryHello(DirectoryHello {
                anchor: NodeId(buf.get_u32()),
                position: WirePoint::get(buf),
            }),
            MessageKind::DirectoryUpdate => Self::DirectoryUpdate(DirectoryUpdate {
                node: NodeId(buf.get_u32()),
                position: WirePoint::get(buf),
                speed: buf.get_u32(),
            }),
            MessageKind::DirectoryQuery => Self::DirectoryQuery(DirectoryQuery {
                requester: NodeId(buf.get_u32()),
                anchor: NodeId(buf.get_u32()),
                target: NodeId(buf.get_u32()),
            }),
            MessageKind::DirectoryReply => Self::DirectoryReply(DirectoryReply {
                requester: NodeId(buf.get_u32()),
                target: NodeId(buf.get_u32()),
                position: WirePoint::get(buf),
            }),
            MessageKind::AnchorLookup => Self::AnchorLookup(AnchorLookup {
                anchor: NodeId(buf.get_u32()),
                target: NodeId(buf.get_u32()),
                lookup_id: buf.get_u32(),
            }),
            MessageKind::AnchorAnswer => Self::AnchorAnswer(AnchorAnswer {
                anchor: NodeId(buf.get_u32()),
                target: NodeId(buf.get_u32()),
                found: buf.get_u8() != 0,
                position: WirePoint::get(buf),
            }),
        };

        Ok(message)
    }
}
