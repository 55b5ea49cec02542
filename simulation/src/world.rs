//! Discrete-event world
//!
//! The [`World`] owns every simulated node and implements the collaborators
//! a router needs:
//!
//! - **Scheduler**: one binary heap of events ordered by time, then by
//!   insertion; timer tokens can be cancelled
//! - **Radio**: unit disk with a fixed range and link delay. A broadcast
//!   reaches every node in range of the sender; a unicast to a node out of
//!   range comes back to the sender as a link failure
//! - **Mobility**: positions computed from each node's [`Mobility`] model
//! - **Oracle**: true positions, for location error statistics only
//!
//! Routers are built when the world starts, so every node sees the full
//! anchor list regardless of the order nodes were added in.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashSet};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use meridian_core::{
    AnchorInfo, Clock, NodeId, Oracle, Position, Registry, Role, RoutingEvent, Scheduler, Timer,
    TimerToken, Transport, TransportError, DATA_PORT,
};
use meridian_logging::NodeContext;
use meridian_routing::{GeoRouter, NodeEnv};

use crate::config::SimConfig;
use crate::mobility::Mobility;
use crate::stats::SimStats;

/// Something that happens at a point in simulated time
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// A router timer fires
    Timer { node: NodeId, timer: Timer },

    /// A frame arrives at `to`
    Frame {
        from: NodeId,
        to: NodeId,
        payload: Bytes,
        port: u16,
    },

    /// `node` learns that its frame to `neighbor` was not received
    LinkFailure { node: NodeId, neighbor: NodeId },

    /// Application traffic: `from` sends a data packet to `to`
    Send {
        from: NodeId,
        to: NodeId,
        payload: Bytes,
    },
}

#[derive(Debug)]
struct Scheduled {
    at: Duration,
    seq: u64,
    event: WorldEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed: the heap pops the earliest event first
    fn cmp(&self, other: &Self) -> Ordering {
        other.at.cmp(&self.at).then(other.seq.cmp(&self.seq))
    }
}

/// Pending events, earliest first
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
    cancelled: HashSet<u64>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: Duration, event: WorldEvent) -> TimerToken {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled { at, seq, event });
        TimerToken(seq)
    }

    /// Cancel a pending event; unknown or fired tokens are ignored
    pub fn cancel(&mut self, token: TimerToken) {
        if self.heap.iter().any(|s| s.seq == token.0) {
            self.cancelled.insert(token.0);
        }
    }

    /// Time of the next live event
    pub fn peek_time(&mut self) -> Option<Duration> {
        while let Some(next) = self.heap.peek() {
            if self.cancelled.remove(&next.seq) {
                self.heap.pop();
                continue;
            }
            return Some(next.at);
        }
        None
    }

    pub fn pop(&mut self) -> Option<(Duration, WorldEvent)> {
        while let Some(next) = self.heap.pop() {
            if self.cancelled.remove(&next.seq) {
                continue;
            }
            return Some((next.at, next.event));
        }
        None
    }

    pub fn len(&self) -> usize {
        self.heap.len() - self.cancelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A routing event attributed to the node that recorded it
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedEvent {
    pub node: NodeId,
    pub event: RoutingEvent,
}

/// A simulated node
pub struct SimNode {
    pub role: Role,
    pub mobility: Mobility,
    pub router: GeoRouter,
}

struct PendingNode {
    id: NodeId,
    role: Role,
    mobility: Mobility,
}

struct NodeRegistry {
    id: NodeId,
    role: Role,
    anchors: Vec<AnchorInfo>,
}

impl Registry for NodeRegistry {
    fn local_id(&self) -> NodeId {
        self.id
    }

    fn role(&self) -> Role {
        self.role
    }

    fn anchors(&self) -> Vec<AnchorInfo> {
        self.anchors.clone()
    }
}

/// Scheduler view of the world for one node
struct NodeScheduler<'a> {
    now: Duration,
    node: NodeId,
    queue: &'a mut EventQueue,
}

impl Clock for NodeScheduler<'_> {
    fn now(&self) -> Duration {
        self.now
    }
}

impl Scheduler for NodeScheduler<'_> {
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerToken {
        self.queue.push(
            self.now + delay,
            WorldEvent::Timer {
                node: self.node,
                timer,
            },
        )
    }

    fn cancel(&mut self, token: TimerToken) {
        self.queue.cancel(token);
    }
}

struct OutgoingFrame {
    destination: NodeId,
    payload: Bytes,
    port: u16,
}

/// Collects frames; the world puts them on the air once the handler returns
struct BufferedTransport<'a> {
    frames: &'a mut Vec<OutgoingFrame>,
}

impl Transport for BufferedTransport<'_> {
    fn send(&mut self, payload: Bytes, destination: NodeId, port: u16) -> Result<(), TransportError> {
        self.frames.push(OutgoingFrame {
            destination,
            payload,
            port,
        });
        Ok(())
    }
}

struct WorldOracle<'a> {
    nodes: &'a BTreeMap<NodeId, SimNode>,
    now: Duration,
    own: (NodeId, Position),
}

impl Oracle for WorldOracle<'_> {
    fn true_position(&self, id: NodeId) -> Option<Position> {
        if id == self.own.0 {
            return Some(self.own.1);
        }
        self.nodes.get(&id).map(|n| n.mobility.position_at(self.now))
    }
}

/// Discrete-event simulation of a set of nodes
pub struct World {
    config: SimConfig,
    now: Duration,
    queue: EventQueue,
    pending: Vec<PendingNode>,
    anchors: Vec<AnchorInfo>,
    nodes: BTreeMap<NodeId, SimNode>,
    stats: SimStats,
    log: Vec<LoggedEvent>,
    frames_sent: u64,
    started: bool,
}

impl World {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            now: Duration::ZERO,
            queue: EventQueue::new(),
            pending: Vec::new(),
            anchors: Vec::new(),
            nodes: BTreeMap::new(),
            stats: SimStats::default(),
            log: Vec::new(),
            frames_sent: 0,
            started: false,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Add a fixed anchor
    pub fn add_anchor(&mut self, id: NodeId, position: Position) {
        self.anchors.push(AnchorInfo { id, position });
        self.pending.push(PendingNode {
            id,
            role: Role::Anchor,
            mobility: Mobility::Static { position },
        });
    }

    /// Add a mobile node
    pub fn add_mobile(&mut self, id: NodeId, mobility: Mobility) {
        self.pending.push(PendingNode {
            id,
            role: Role::Mobile,
            mobility,
        });
    }

    /// Schedule a data packet from `from` to `to`
    pub fn send_at(&mut self, at: Duration, from: NodeId, to: NodeId, payload: impl Into<Bytes>) {
        self.queue.push(
            at,
            WorldEvent::Send {
                from,
                to,
                payload: payload.into(),
            },
        );
    }

    /// Build the routers and start them at the current time
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let router_config = self.config.effective_router();
        for pending in std::mem::take(&mut self.pending) {
            let registry = NodeRegistry {
                id: pending.id,
                role: pending.role,
                anchors: self.anchors.clone(),
            };
            let seed = self.config.seed ^ u64::from(pending.id.as_u32());
            let node = SimNode {
                role: pending.role,
                mobility: pending.mobility,
                router: GeoRouter::with_seed(&registry, router_config, seed),
            };
            if self.nodes.insert(pending.id, node).is_some() {
                warn!(node = %pending.id, "Duplicate node id, replacing");
            }
        }

        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            self.with_node(id, |router, env| router.start(env));
        }
        info!(
            nodes = self.nodes.len(),
            anchors = self.anchors.len(),
            "World started"
        );
    }

    /// Process events up to and including `until`
    pub fn run_until(&mut self, until: Duration) {
        self.start();
        while let Some(at) = self.queue.peek_time() {
            if at > until {
                break;
            }
            let Some((at, event)) = self.queue.pop() else {
                break;
            };
            self.now = at;
            self.dispatch(event);
        }
        self.now = self.now.max(until);
    }

    /// Run for the configured duration
    pub fn run(&mut self) {
        self.run_until(self.config.duration);
        debug!(now = ?self.now, frames = self.frames_sent, "Run complete");
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Every routing event recorded so far
    pub fn events(&self) -> &[LoggedEvent] {
        &self.log
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn router(&self, id: NodeId) -> Option<&GeoRouter> {
        self.nodes.get(&id).map(|n| &n.router)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn position_of(&self, id: NodeId) -> Option<Position> {
        self.nodes.get(&id).map(|n| n.mobility.position_at(self.now))
    }

    fn dispatch(&mut self, event: WorldEvent) {
        match event {
            WorldEvent::Timer { node, timer } => {
                self.with_node(node, |router, env| router.on_timer(timer, env));
            }
            WorldEvent::Frame {
                from,
                to,
                payload,
                port,
            } => {
                self.with_node(to, |router, env| router.on_receive(payload, from, port, env));
            }
            WorldEvent::LinkFailure { node, neighbor } => {
                self.with_node(node, |router, env| router.on_link_failure(neighbor, env));
            }
            WorldEvent::Send { from, to, payload } => {
                let sent = self.with_node(from, |router, env| {
                    router.send(to, DATA_PORT, payload, env)
                });
                if sent.is_none() {
                    warn!(%from, "Traffic from unknown node");
                }
            }
        }
    }

    /// Run a handler on one node with the world as its environment
    fn with_node<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut GeoRouter, &mut NodeEnv<'_>) -> R,
    ) -> Option<R> {
        let mut node = self.nodes.remove(&id)?;
        let now = self.now;
        let kinematics = node.mobility.kinematics(now);
        let mut frames = Vec::new();

        let result = {
            let _entered = NodeContext::new(id, node.role).span().entered();
            let mut scheduler = NodeScheduler {
                now,
                node: id,
                queue: &mut self.queue,
            };
            let mut transport = BufferedTransport {
                frames: &mut frames,
            };
            let oracle = WorldOracle {
                nodes: &self.nodes,
                now,
                own: (id, kinematics.position),
            };
            let mut env =
                NodeEnv::new(&mut scheduler, &mut transport, &kinematics).with_oracle(&oracle);
            f(&mut node.router, &mut env)
        };

        let events = node.router.drain_events();
        self.nodes.insert(id, node);

        for event in events {
            self.stats.record(&event);
            self.log.push(LoggedEvent { node: id, event });
        }
        for frame in frames {
            self.put_on_air(id, frame);
        }
        Some(result)
    }

    fn put_on_air(&mut self, from: NodeId, frame: OutgoingFrame) {
        let Some(origin) = self.position_of(from) else {
            return;
        };
        let range = self.config.radio_range;
        let arrival = self.now + self.config.link_delay;
        self.frames_sent += 1;
        trace!(
            %from,
            to = %frame.destination,
            len = frame.payload.len(),
            head = %hex::encode(&frame.payload[..frame.payload.len().min(8)]),
            "Frame on air"
        );

        let in_range = |node: &SimNode| node.mobility.position_at(self.now).distance_to(&origin) <= range;

        if frame.destination.is_broadcast() {
            let receivers: Vec<NodeId> = self
                .nodes
                .iter()
                .filter(|(id, node)| **id != from && in_range(node))
                .map(|(id, _)| *id)
                .collect();
            for to in receivers {
                self.queue.push(
                    arrival,
                    WorldEvent::Frame {
                        from,
                        to,
                        payload: frame.payload.clone(),
                        port: frame.port,
                    },
                );
            }
            return;
        }

        let reachable = self.nodes.get(&frame.destination).is_some_and(in_range);
        let event = if reachable {
            WorldEvent::Frame {
                from,
                to: frame.destination,
                payload: frame.payload,
                port: frame.port,
            }
        } else {
            trace!(%from, to = %frame.destination, "Unicast out of range");
            WorldEvent::LinkFailure {
                node: from,
                neighbor: frame.destination,
            }
        };
        self.queue.push(arrival, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::Velocity;

    fn make_id(n: u32) -> NodeId {
        NodeId::host(n)
    }

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_event_queue_order_and_cancel() {
        let mut queue = EventQueue::new();
        let node = make_id(1);
        let late = queue.push(millis(20), WorldEvent::Timer { node, timer: Timer::Hello });
        queue.push(millis(10), WorldEvent::Timer { node, timer: Timer::QueueRecheck });
        queue.push(millis(10), WorldEvent::Timer { node, timer: Timer::Hello });

        queue.cancel(late);
        assert_eq!(queue.len(), 2);

        let (at, first) = queue.pop().unwrap();
        assert_eq!(at, millis(10));
        assert_eq!(first, WorldEvent::Timer { node, timer: Timer::QueueRecheck });
        let (_, second) = queue.pop().unwrap();
        assert_eq!(second, WorldEvent::Timer { node, timer: Timer::Hello });
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());

        // Cancelling a fired token is a no-op
        queue.cancel(late);
        assert!(queue.peek_time().is_none());
    }

    #[test]
    fn test_hellos_reach_only_nodes_in_range() {
        let mut world = World::new(SimConfig::default());
        world.add_mobile(make_id(1), Mobility::fixed(0.0, 0.0));
        world.add_mobile(make_id(2), Mobility::fixed(200.0, 0.0));
        world.add_mobile(make_id(3), Mobility::fixed(1000.0, 0.0));
        world.run_until(millis(900));

        let neighbors = world.router(make_id(1)).unwrap().neighbors();
        assert!(neighbors.is_neighbor(make_id(2)));
        assert!(!neighbors.is_neighbor(make_id(3)));
        assert!(world.router(make_id(3)).unwrap().neighbors().is_empty());
        assert!(world.frames_sent() >= 3);
    }

    #[test]
    fn test_unicast_out_of_range_reports_link_failure() {
        let mut world = World::new(SimConfig::default());
        world.add_mobile(make_id(1), Mobility::fixed(0.0, 0.0));
        world.add_mobile(
            make_id(2),
            Mobility::moving(Position::new(100.0, 0.0), Velocity::new(150.0, 0.0)),
        );
        world.send_at(millis(1800), make_id(1), make_id(2), &b"late"[..]);
        world.run_until(millis(1900));

        assert!(world.events().iter().any(|e| e.node == make_id(1)
            && matches!(e.event, RoutingEvent::NeighborLost { neighbor, .. } if neighbor == make_id(2))));
        assert_eq!(world.stats().packets_delivered, 0);
        assert_eq!(world.stats().neighbors_lost, 1);
    }

    #[test]
    fn test_oracle_sees_true_positions() {
        let mut world = World::new(SimConfig::default());
        world.add_mobile(
            make_id(1),
            Mobility::moving(Position::new(0.0, 0.0), Velocity::new(10.0, 0.0)),
        );
        world.run_until(Duration::from_secs(2));
        assert_eq!(world.position_of(make_id(1)), Some(Position::new(20.0, 0.0)));

        let oracle = WorldOracle {
            nodes: &world.nodes,
            now: world.now(),
            own: (make_id(9), Position::ORIGIN),
        };
        assert_eq!(oracle.true_position(make_id(1)), Some(Position::new(20.0, 0.0)));
        assert_eq!(oracle.true_position(make_id(9)), Some(Position::ORIGIN));
        assert_eq!(oracle.true_position(make_id(5)), None);
    }
}
