//! Deferred output queue
//!
//! Packets whose destination position is still being resolved wait here.
//! The queue is bounded by count and by age; a full queue evicts its
//! oldest packet.

use std::collections::VecDeque;
use std::time::Duration;

use meridian_core::{Datagram, NodeId};

/// A buffered outbound packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPacket {
    pub datagram: Datagram,
    pub queued_at: Duration,
}

impl QueuedPacket {
    pub fn destination(&self) -> NodeId {
        self.datagram.destination()
    }
}

/// FIFO of packets waiting for a destination position
#[derive(Debug, Clone)]
pub struct DeferredQueue {
    packets: VecDeque<QueuedPacket>,
    capacity: usize,
    max_age: Duration,
}

impl DeferredQueue {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            packets: VecDeque::with_capacity(capacity),
            capacity,
            max_age,
        }
    }

    /// Buffer a packet
    ///
    /// Returns the packet evicted to make room, if the queue was full.
    pub fn push(&mut self, datagram: Datagram, now: Duration) -> Option<QueuedPacket> {
        if self.capacity == 0 {
            return Some(QueuedPacket {
                datagram,
                queued_at: now,
            });
        }

        let evicted = if self.packets.len() >= self.capacity {
            self.packets.pop_front()
        } else {
            None
        };
        self.packets.push_back(QueuedPacket {
            datagram,
            queued_at: now,
        });
        evicted
    }

    /// Remove and return packets that have waited too long
    pub fn expire(&mut self, now: Duration) -> Vec<QueuedPacket> {
        let max_age = self.max_age;
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .packets
            .drain(..)
            .partition(|p| now.saturating_sub(p.queued_at) >= max_age);
        self.packets = kept.into();
        expired
    }

    /// Distinct destinations in arrival order
    pub fn destinations(&self) -> Vec<NodeId> {
        let mut seen = Vec::new();
        for packet in &self.packets {
            let dst = packet.destination();
            if !seen.contains(&dst) {
                seen.push(dst);
            }
        }
        seen
    }

    /// Remove and return every packet for `destination`, oldest first
    pub fn take_for(&mut self, destination: NodeId) -> Vec<QueuedPacket> {
        let (taken, kept): (Vec<_>, Vec<_>) = self
            .packets
            .drain(..)
            .partition(|p| p.destination() == destination);
        self.packets = kept.into();
        taken
    }

    pub fn has_packets_for(&self, destination: NodeId) -> bool {
        self.packets.iter().any(|p| p.destination() == destination)
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedPacket> {
        self.packets.iter()
    }
}
