//! Routed datagrams
//!
//! A routed frame is a Position header followed by a fixed
//! [`DatagramHeader`] and the payload. The datagram header plays the role
//! of the IP header: it names the original source, the final destination
//! and the upper-layer port at the destination.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::DecodeError;
use crate::identity::NodeId;
use crate::wire::{Message, MessageKind, PositionHeader};

/// Hop limit given to newly originated datagrams
pub const DEFAULT_TTL: u8 = 64;

/// End-to-end addressing of a routed packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    /// Identifier unique per source, for tracing
    pub id: u32,
    pub source: NodeId,
    pub destination: NodeId,
    /// Upper-layer port at the destination
    pub port: u16,
    pub ttl: u8,
}

impl DatagramHeader {
    /// Encoded size in bytes
    pub const LEN: usize = 15;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.id);
        buf.put_u32(self.source.as_u32());
        buf.put_u32(self.destination.as_u32());
        buf.put_u16(self.port);
        buf.put_u8(self.ttl);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, DecodeError> {
        if buf.remaining() < Self::LEN {
            return Err(DecodeError::Truncated {
                kind: MessageKind::Position,
                expected: Self::LEN,
                actual: buf.remaining(),
            });
        }
        Ok(Self {
            id: buf.get_u32(),
            source: NodeId(buf.get_u32()),
            destination: NodeId(buf.get_u32()),
            port: buf.get_u16(),
            ttl: buf.get_u8(),
        })
    }
}

/// A packet travelling through the forwarding layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub header: DatagramHeader,
    pub payload: Bytes,
}

impl Datagram {
    pub fn new(
        id: u32,
        source: NodeId,
        destination: NodeId,
        port: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            header: DatagramHeader {
                id,
                source,
                destination,
                port,
                ttl: DEFAULT_TTL,
            },
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> u32 {
        self.header.id
    }

    pub fn source(&self) -> NodeId {
        self.header.source
    }

    pub fn destination(&self) -> NodeId {
        self.header.destination
    }

    pub fn port(&self) -> u16 {
        self.header.port
    }
}

/// Build a routed frame: Position header, datagram header, payload
pub fn encode_routed(position: &PositionHeader, datagram: &Datagram) -> Bytes {
    let mut buf = BytesMut::with_capacity(
        MessageKind::Position.wire_len() + DatagramHeader::LEN + datagram.payload.len(),
    );
    Message::Position(*position).encode_into(&mut buf);
    datagram.header.encode_into(&mut buf);
    buf.put_slice(&datagram.payload);
    buf.freeze()
}

/// Split the remainder of a routed frame (after its Position header)
pub fn decode_datagram(mut buf: Bytes) -> Result<Datagram, DecodeError> {
    let header = DatagramHeader::decode(&mut buf)?;
    Ok(Datagram {
        header,
        payload: buf,
    })
}
