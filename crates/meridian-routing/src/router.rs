//! Geographic router
//!
//! The [`GeoRouter`] is the per-node forwarding engine. It owns the
//! neighbor table, the location directory strategy picked from the node's
//! role, and the deferred output queue. Everything it needs from the
//! outside world comes in through a [`NodeEnv`] on each call.
//!
//! ## Forwarding Algorithm
//!
//! 1. **DIRECT**: If the destination is a neighbor (or an anchor within
//!    coverage range), hand the packet to it
//! 2. **GREEDY**: Otherwise forward to the neighbor strictly closer to the
//!    destination position than this node
//! 3. **RECOVERY**: If no neighbor makes progress, walk the face of the
//!    neighbor graph with the right-hand rule until a node closer than the
//!    recovery entry point is reached
//! 4. **DEFER**: If the destination position is unknown, buffer the packet
//!    while the location directory searches for it

use std::time::Duration;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use meridian_core::{
    decode_datagram, encode_routed, Datagram, DropReason, ForwardDecision, ForwardMode, Hello,
    Message, NodeId, Oracle, Position, PositionHeader, PositionSource, Registry, Role,
    RoutingEvent, Scheduler, Timer, TimerToken, Transport, WirePoint, DATA_PORT, DEFAULT_TTL,
    DIRECTORY_PORT, FORWARDING_PORT,
};
use meridian_location::{directory_for, DirectoryContext, DirectoryProtocol, Outbox};

use crate::config::RouterConfig;
use crate::error::{ForwardError, RoutingError, RoutingResult};
use crate::neighbor::NeighborTable;
use crate::queue::DeferredQueue;

/// Collaborators available to a router while it handles one input
pub struct NodeEnv<'a> {
    pub scheduler: &'a mut dyn Scheduler,
    pub transport: &'a mut dyn Transport,
    pub mobility: &'a dyn PositionSource,
    /// Ground truth, for accuracy logging only
    pub oracle: Option<&'a dyn Oracle>,
}

impl<'a> NodeEnv<'a> {
    pub fn new(
        scheduler: &'a mut dyn Scheduler,
        transport: &'a mut dyn Transport,
        mobility: &'a dyn PositionSource,
    ) -> Self {
        Self {
            scheduler,
            transport,
            mobility,
            oracle: None,
        }
    }

    pub fn with_oracle(mut self, oracle: &'a dyn Oracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn position(&self) -> Position {
        self.mobility.current_position()
    }
}

/// Per-node geographic forwarding engine
pub struct GeoRouter {
    id: NodeId,
    role: Role,
    config: RouterConfig,
    neighbors: NeighborTable,
    directory: Box<dyn DirectoryProtocol>,
    outbox: Outbox,
    queue: DeferredQueue,
    rng: StdRng,
    hello_timer: Option<TimerToken>,
    recheck_timer: Option<TimerToken>,
    next_packet_id: u32,
    events: Vec<RoutingEvent>,
}

impl GeoRouter {
    /// Create a router for the node described by `registry`
    ///
    /// The hello jitter is seeded from the node id, so runs are repeatable.
    pub fn new(registry: &dyn Registry, config: RouterConfig) -> Self {
        let seed = u64::from(registry.local_id().as_u32());
        Self::with_seed(registry, config, seed)
    }

    /// Create a router with an explicit jitter seed
    pub fn with_seed(registry: &dyn Registry, config: RouterConfig, seed: u64) -> Self {
        Self {
            id: registry.local_id(),
            role: registry.role(),
            config,
            neighbors: NeighborTable::new(config.neighbors),
            directory: directory_for(registry, config.directory),
            outbox: Outbox::new(),
            queue: DeferredQueue::new(config.queue_capacity, config.queue_max_age),
            rng: StdRng::seed_from_u64(seed),
            hello_timer: None,
            recheck_timer: None,
            next_packet_id: 0,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get a reference to the neighbor table
    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    /// Get a reference to the location directory
    pub fn directory(&self) -> &dyn DirectoryProtocol {
        self.directory.as_ref()
    }

    /// Get a reference to the deferred queue
    pub fn queue(&self) -> &DeferredQueue {
        &self.queue
    }

    /// Take the events recorded since the last call
    pub fn drain_events(&mut self) -> Vec<RoutingEvent> {
        std::mem::take(&mut self.events)
    }

    /// Schedule the first hello (mobile nodes only)
    pub fn start(&mut self, env: &mut NodeEnv<'_>) {
        if self.role.is_anchor() {
            debug!(node = %self.id, "Anchor started, no periodic hello");
            return;
        }
        let half = self.config.hello_interval.as_secs_f64() / 2.0;
        let delay = Duration::from_secs_f64(self.rng.random_range(0.0..=half));
        self.hello_timer = Some(env.scheduler.schedule(delay, Timer::Hello));
        debug!(node = %self.id, first_hello = ?delay, "Router started");
    }

    /// Cancel all pending timers
    pub fn stop(&mut self, env: &mut NodeEnv<'_>) {
        if let Some(token) = self.hello_timer.take() {
            env.scheduler.cancel(token);
        }
        if let Some(token) = self.recheck_timer.take() {
            env.scheduler.cancel(token);
        }
    }

    /// A timer registered by this router fired
    pub fn on_timer(&mut self, timer: Timer, env: &mut NodeEnv<'_>) {
        match timer {
            Timer::Hello => {
                self.hello_timer = None;
                self.send_hello(env);
                let interval = self.config.hello_interval.as_secs_f64();
                let delay = interval + self.rng.random_range(-interval / 2.0..=interval / 2.0);
                self.hello_timer = Some(
                    env.scheduler
                        .schedule(Duration::from_secs_f64(delay.max(0.0)), Timer::Hello),
                );
            }
            Timer::QueueRecheck => {
                self.recheck_timer = None;
                self.recheck_queue(env);
                if !self.queue.is_empty() {
                    self.schedule_recheck(env);
                }
            }
        }
        self.flush_directory(env);
    }

    /// Originate a datagram; returns its packet id
    pub fn send(
        &mut self,
        destination: NodeId,
        port: u16,
        payload: impl Into<Bytes>,
        env: &mut NodeEnv<'_>,
    ) -> u32 {
        let id = self.next_id();
        let datagram = Datagram::new(id, self.id, destination, port, payload);
        self.events.push(RoutingEvent::Originated {
            packet_id: id,
            destination,
            at: env.now(),
        });
        trace!(node = %self.id, packet = id, %destination, port, "Originating packet");

        self.route_output(datagram, env);
        self.flush_directory(env);
        id
    }

    /// A link frame arrived from `link_source`
    pub fn on_receive(
        &mut self,
        frame: Bytes,
        link_source: NodeId,
        port: u16,
        env: &mut NodeEnv<'_>,
    ) {
        if let Err(err) = self.handle_frame(frame, link_source, port, env) {
            debug!(node = %self.id, from = %link_source, error = %err, "Dropping frame");
            self.events.push(RoutingEvent::dropped(
                None,
                DropReason::Malformed,
                env.now(),
            ));
        }
        self.flush_directory(env);
    }

    /// The link layer could not deliver a frame to `neighbor`
    pub fn on_link_failure(&mut self, neighbor: NodeId, env: &mut NodeEnv<'_>) {
        if self.neighbors.remove(neighbor).is_some() {
            debug!(node = %self.id, %neighbor, "Neighbor lost after link failure");
            self.events.push(RoutingEvent::NeighborLost {
                neighbor,
                at: env.now(),
            });
        }
    }

    /// Next-hop decision for a packet to `destination`
    ///
    /// `header` carries the packet's target position and recovery state; it
    /// is rewritten for the next hop when the decision is to forward.
    pub fn decide(
        &mut self,
        destination: NodeId,
        header: &mut PositionHeader,
        env: &NodeEnv<'_>,
    ) -> ForwardDecision {
        let me = env.position();
        let now = env.now();
        self.neighbors.purge(me, self.role, now);

        if let Some(position) = self.direct_position(destination, me) {
            header.destination = WirePoint::from(position);
            header.in_recovery = false;
            header.previous_hop = WirePoint::from(me);
            return ForwardDecision::direct(destination);
        }

        // Neighbors advertise whole metres; compare at the same resolution
        let here = WirePoint::from(me).to_position();
        let target = header.destination.to_position();
        let entry_distance = header.recovery.to_position().distance_to(&target);
        if header.in_recovery && here.distance_to(&target) < entry_distance {
            debug!(node = %self.id, %destination, "Leaving recovery");
            header.in_recovery = false;
        }

        if !header.in_recovery {
            self.refresh_destination(destination, header, now);
            let target = header.destination.to_position();

            if let Some(next_hop) = self.neighbors.best_neighbor(target, here) {
                header.previous_hop = WirePoint::from(me);
                return ForwardDecision::greedy(next_hop);
            }

            debug!(node = %self.id, %destination, %me, "No greedy progress, entering recovery");
            header.in_recovery = true;
            header.recovery = WirePoint::from(me);
            header.previous_hop = WirePoint::from(me);
        }

        let reference = if header.previous_hop == WirePoint::from(me) {
            header.destination.to_position()
        } else {
            header.previous_hop.to_position()
        };

        match self.neighbors.best_angle(reference, here) {
            Some(next_hop) => {
                header.previous_hop = WirePoint::from(me);
                ForwardDecision::recovery(next_hop)
            }
            None => ForwardDecision::drop(ForwardError::NoRoute.into()),
        }
    }

    fn handle_frame(
        &mut self,
        mut frame: Bytes,
        link_source: NodeId,
        port: u16,
        env: &mut NodeEnv<'_>,
    ) -> RoutingResult<()> {
        if port != FORWARDING_PORT {
            trace!(node = %self.id, port, "Frame on unknown port");
        }

        let now = env.now();
        match Message::decode(&mut frame)? {
            Message::Hello(hello) => {
                let position = hello.origin.to_position();
                trace!(node = %self.id, neighbor = %link_source, %position, "Hello");
                self.neighbors.upsert(link_source, position, now);

                let mut ctx = Self::context(&mut self.outbox, env);
                self.directory.on_hello(link_source, position, &mut ctx);
            }
            Message::Position(header) => {
                self.neighbors
                    .upsert(link_source, header.previous_hop.to_position(), now);
                let datagram = decode_datagram(frame)?;
                self.on_datagram(header, datagram, env)?;
            }
            other => {
                return Err(RoutingError::Decode(
                    meridian_core::DecodeError::UnexpectedKind(other.kind()),
                ));
            }
        }
        Ok(())
    }

    fn on_datagram(
        &mut self,
        header: PositionHeader,
        datagram: Datagram,
        env: &mut NodeEnv<'_>,
    ) -> RoutingResult<()> {
        let destination = datagram.destination();
        if destination.is_broadcast() || destination == self.id {
            return self.deliver(datagram, env);
        }
        self.forward(header, datagram, env);
        Ok(())
    }

    fn deliver(&mut self, datagram: Datagram, env: &mut NodeEnv<'_>) -> RoutingResult<()> {
        let now = env.now();
        match datagram.port() {
            DIRECTORY_PORT => {
                let mut ctx = Self::context(&mut self.outbox, env);
                self.directory
                    .handle_datagram(datagram.source(), datagram.payload, &mut ctx)?;
            }
            port => {
                let hops = DEFAULT_TTL.saturating_sub(datagram.header.ttl);
                if port != DATA_PORT {
                    trace!(node = %self.id, port, "Delivering to non-data port");
                }
                debug!(
                    node = %self.id,
                    packet = datagram.id(),
                    source = %datagram.source(),
                    hops,
                    "Delivered"
                );
                self.events.push(RoutingEvent::Delivered {
                    packet_id: datagram.id(),
                    source: datagram.source(),
                    hops,
                    at: now,
                });
            }
        }
        Ok(())
    }

    /// Route a datagram that starts at this node
    fn route_output(&mut self, datagram: Datagram, env: &mut NodeEnv<'_>) {
        let destination = datagram.destination();
        let me = env.position();

        if destination.is_broadcast() {
            let header = PositionHeader {
                destination: WirePoint::from(me),
                updated: 0,
                recovery: WirePoint::default(),
                in_recovery: false,
                previous_hop: WirePoint::from(me),
            };
            self.transmit(header, datagram, NodeId::BROADCAST, ForwardMode::Direct, env);
            return;
        }

        if destination == self.id {
            if let Err(err) = self.deliver(datagram, env) {
                debug!(node = %self.id, error = %err, "Local delivery failed");
            }
            return;
        }

        self.neighbors.purge(me, self.role, env.now());
        let position = match self.direct_position(destination, me) {
            Some(position) => position,
            None => {
                let mut ctx = Self::context(&mut self.outbox, env);
                self.directory.resolve(destination, &mut ctx)
            }
        };

        if !position.is_valid() {
            self.defer(datagram, env);
            return;
        }

        let header = PositionHeader {
            destination: WirePoint::from(position),
            updated: self.update_secs(destination),
            recovery: WirePoint::default(),
            in_recovery: false,
            previous_hop: WirePoint::from(me),
        };
        self.forward(header, datagram, env);
    }

    /// Pick the next hop and transmit, or drop
    fn forward(&mut self, mut header: PositionHeader, datagram: Datagram, env: &mut NodeEnv<'_>) {
        match self.decide(datagram.destination(), &mut header, env) {
            ForwardDecision::Forward { next_hop, mode } => {
                self.transmit(header, datagram, next_hop, mode, env);
            }
            ForwardDecision::Defer => self.defer(datagram, env),
            ForwardDecision::Drop { reason } => {
                debug!(
                    node = %self.id,
                    packet = datagram.id(),
                    destination = %datagram.destination(),
                    %reason,
                    "Dropping packet"
                );
                self.events
                    .push(RoutingEvent::dropped(Some(datagram.id()), reason, env.now()));
            }
        }
    }

    fn transmit(
        &mut self,
        header: PositionHeader,
        mut datagram: Datagram,
        next_hop: NodeId,
        mode: ForwardMode,
        env: &mut NodeEnv<'_>,
    ) {
        let now = env.now();
        if datagram.header.ttl == 0 {
            debug!(node = %self.id, packet = datagram.id(), "TTL expired");
            self.events.push(RoutingEvent::dropped(
                Some(datagram.id()),
                ForwardError::TtlExpired.into(),
                now,
            ));
            return;
        }
        datagram.header.ttl -= 1;

        let frame = encode_routed(&header, &datagram);
        match env.transport.send(frame, next_hop, FORWARDING_PORT) {
            Ok(()) => {
                trace!(
                    node = %self.id,
                    packet = datagram.id(),
                    %next_hop,
                    %mode,
                    ttl = datagram.header.ttl,
                    "Forwarded"
                );
                self.events
                    .push(RoutingEvent::forwarded(datagram.id(), next_hop, mode, now));
            }
            Err(err) => {
                warn!(node = %self.id, %next_hop, error = %err, "Transmit failed");
                if !next_hop.is_broadcast() && self.neighbors.remove(next_hop).is_some() {
                    self.events.push(RoutingEvent::NeighborLost {
                        neighbor: next_hop,
                        at: now,
                    });
                }
                self.events.push(RoutingEvent::dropped(
                    Some(datagram.id()),
                    DropReason::NoRoute,
                    now,
                ));
            }
        }
    }

    fn defer(&mut self, datagram: Datagram, env: &mut NodeEnv<'_>) {
        let now = env.now();
        let (packet_id, destination) = (datagram.id(), datagram.destination());

        if let Some(evicted) = self.queue.push(datagram, now) {
            debug!(node = %self.id, packet = evicted.datagram.id(), "Deferred queue overflow");
            self.events.push(RoutingEvent::dropped(
                Some(evicted.datagram.id()),
                ForwardError::QueueOverflow.into(),
                now,
            ));
        }
        if self.queue.has_packets_for(destination) {
            trace!(node = %self.id, packet = packet_id, %destination, "Deferred");
            self.events.push(RoutingEvent::Deferred {
                packet_id,
                destination,
                at: now,
            });
        }
        if self.recheck_timer.is_none() && !self.queue.is_empty() {
            self.schedule_recheck(env);
        }
    }

    fn schedule_recheck(&mut self, env: &mut NodeEnv<'_>) {
        let token = env
            .scheduler
            .schedule(self.config.queue_recheck_interval, Timer::QueueRecheck);
        self.recheck_timer = Some(token);
    }

    /// Release, keep or drop deferred packets
    fn recheck_queue(&mut self, env: &mut NodeEnv<'_>) {
        let now = env.now();
        for expired in self.queue.expire(now) {
            debug!(node = %self.id, packet = expired.datagram.id(), "Deferred packet expired");
            self.events.push(RoutingEvent::dropped(
                Some(expired.datagram.id()),
                ForwardError::QueueExpired.into(),
                now,
            ));
        }

        let me = env.position();
        self.neighbors.purge(me, self.role, now);

        for destination in self.queue.destinations() {
            if self.directory.is_in_search(destination, now) {
                continue;
            }

            let packets = self.queue.take_for(destination);
            let reachable = self.direct_position(destination, me).is_some()
                || self.directory.has_position(destination, now);

            if !reachable {
                debug!(
                    node = %self.id,
                    %destination,
                    packets = packets.len(),
                    "Location search failed"
                );
                self.events.push(RoutingEvent::SearchTimedOut {
                    target: destination,
                    at: now,
                });
                for packet in packets {
                    self.events.push(RoutingEvent::dropped(
                        Some(packet.datagram.id()),
                        ForwardError::SearchTimeout.into(),
                        now,
                    ));
                }
                continue;
            }

            trace!(node = %self.id, %destination, packets = packets.len(), "Releasing deferred packets");
            for packet in packets {
                self.route_output(packet.datagram, env);
            }
        }
    }

    fn send_hello(&mut self, env: &mut NodeEnv<'_>) {
        let position = env.position();
        let frame = Message::Hello(Hello {
            origin: WirePoint::from(position),
        })
        .encode();
        match env.transport.send(frame, NodeId::BROADCAST, FORWARDING_PORT) {
            Ok(()) => trace!(node = %self.id, %position, "Hello sent"),
            Err(err) => warn!(node = %self.id, error = %err, "Hello not sent"),
        }
    }

    /// Route everything the directory queued, until it stops producing
    fn flush_directory(&mut self, env: &mut NodeEnv<'_>) {
        loop {
            self.events.extend(self.outbox.take_events());
            let messages = self.outbox.take_messages();
            if messages.is_empty() {
                break;
            }
            for outgoing in messages {
                let id = self.next_id();
                trace!(
                    node = %self.id,
                    kind = %outgoing.message.kind(),
                    destination = %outgoing.destination,
                    "Directory message"
                );
                let datagram = Datagram::new(
                    id,
                    self.id,
                    outgoing.destination,
                    DIRECTORY_PORT,
                    outgoing.message.encode(),
                );
                self.route_output(datagram, env);
            }
        }
    }

    /// Position of `destination` if it can be reached in one hop
    ///
    /// Anchors send no periodic hello; a registered anchor within coverage
    /// range counts as a neighbor.
    fn direct_position(&self, destination: NodeId, me: Position) -> Option<Position> {
        if let Some(entry) = self.neighbors.get(destination) {
            return Some(entry.position);
        }
        let coverage = self.config.neighbors.anchor_range;
        self.directory
            .anchor_position(destination)
            .filter(|position| position.distance_to(&me) <= coverage)
    }

    /// Use a fresher local sample of the destination position
    fn refresh_destination(&self, destination: NodeId, header: &mut PositionHeader, now: Duration) {
        let local = self.update_secs(destination);
        if local > header.updated {
            let position = self.directory.cached_position(destination, now);
            if position.is_valid() {
                trace!(node = %self.id, %destination, %position, "Refreshing destination position");
                header.destination = WirePoint::from(position);
                header.updated = local;
            }
        }
    }

    /// Sample time of the local knowledge of `id`, whole seconds
    fn update_secs(&self, id: NodeId) -> u32 {
        self.directory
            .table()
            .update_time(id)
            .map(|t| u32::try_from(t.as_secs()).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }

    fn context<'a>(outbox: &'a mut Outbox, env: &'a NodeEnv<'_>) -> DirectoryContext<'a> {
        DirectoryContext::new(env.now(), env.position(), outbox)
            .with_velocity(env.mobility.current_velocity())
            .with_oracle(env.oracle)
    }

    fn next_id(&mut self) -> u32 {
        self.next_packet_id = self.next_packet_id.wrapping_add(1);
        self.next_packet_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::mock::{
        ManualScheduler, RecordingTransport, SentFrame, StaticMobility, StaticRegistry,
    };
    use meridian_core::{Clock, DatagramHeader, DirectoryHello, Position};

    fn make_id(n: u32) -> NodeId {
        NodeId::host(n)
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    struct Harness {
        router: GeoRouter,
        scheduler: ManualScheduler,
        transport: RecordingTransport,
        mobility: StaticMobility,
    }

    impl Harness {
        fn new(registry: StaticRegistry, position: Position) -> Self {
            Self {
                router: GeoRouter::new(&registry, RouterConfig::default()),
                scheduler: ManualScheduler::new(),
                transport: RecordingTransport::new(),
                mobility: StaticMobility::at(position),
            }
        }

        fn mobile(n: u32, position: Position) -> Self {
            let registry = StaticRegistry::new(make_id(n), Role::Mobile)
                .with_anchor(make_id(50), Position::new(1000.0, 500.0));
            Self::new(registry, position)
        }

        fn run<R>(&mut self, f: impl FnOnce(&mut GeoRouter, &mut NodeEnv<'_>) -> R) -> R {
            let mut env = NodeEnv::new(&mut self.scheduler, &mut self.transport, &self.mobility);
            f(&mut self.router, &mut env)
        }

        fn hear(&mut self, from: u32, x: u64, y: u64) {
            let frame = Message::Hello(Hello {
                origin: WirePoint::new(x, y),
            })
            .encode();
            self.run(|router, env| router.on_receive(frame, make_id(from), FORWARDING_PORT, env));
        }

        fn fire_due(&mut self) {
            for timer in self.scheduler.take_due() {
                self.run(|router, env| router.on_timer(timer, env));
            }
        }
    }

    fn decode_routed(frame: &SentFrame) -> (PositionHeader, Datagram) {
        let mut buf = frame.payload.clone();
        let Message::Position(header) = Message::decode(&mut buf).unwrap() else {
            panic!("not a routed frame");
        };
        (header, decode_datagram(buf).unwrap())
    }

    fn routed_frame(header: PositionHeader, datagram: &Datagram) -> Bytes {
        encode_routed(&header, datagram)
    }

    fn greedy_header(destination: WirePoint, previous_hop: WirePoint) -> PositionHeader {
        PositionHeader {
            destination,
            updated: 0,
            recovery: WirePoint::default(),
            in_recovery: false,
            previous_hop,
        }
    }

    #[test]
    fn test_start_schedules_jittered_hello() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.run(|router, env| router.start(env));

        let pending = h.scheduler.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].timer, Timer::Hello);
        assert!(pending[0].fire_at <= Duration::from_millis(500));
    }

    #[test]
    fn test_anchor_sends_no_periodic_hello() {
        let registry = StaticRegistry::new(make_id(50), Role::Anchor)
            .with_anchor(make_id(50), Position::new(500.0, 500.0));
        let mut h = Harness::new(registry, Position::new(500.0, 500.0));
        h.run(|router, env| router.start(env));
        assert!(h.scheduler.pending().is_empty());
    }

    #[test]
    fn test_hello_broadcast_and_rescheduled() {
        let mut h = Harness::mobile(1, Position::new(120.0, 80.0));
        h.run(|router, env| router.start(env));
        h.scheduler.advance(Duration::from_millis(500));
        h.fire_due();

        let sent = h.transport.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, NodeId::BROADCAST);
        assert_eq!(sent[0].port, FORWARDING_PORT);
        let mut buf = sent[0].payload.clone();
        assert_eq!(
            Message::decode(&mut buf).unwrap(),
            Message::Hello(Hello {
                origin: WirePoint::new(120, 80)
            })
        );

        let next = h.scheduler.pending();
        assert_eq!(next.len(), 1);
        let delay = next[0].fire_at - h.scheduler.now();
        assert!(delay >= Duration::from_millis(500) && delay <= Duration::from_millis(1500));
    }

    #[test]
    fn test_stop_cancels_timers() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.run(|router, env| router.start(env));
        h.run(|router, env| router.stop(env));
        assert!(h.scheduler.pending().is_empty());
    }

    #[test]
    fn test_hello_populates_neighbors() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.hear(2, 600, 500);
        let entry = h.router.neighbors().get(make_id(2)).unwrap();
        assert_eq!(entry.position, Position::new(600.0, 500.0));
        assert!(h.router.directory().table().contains(make_id(2)));
    }

    #[test]
    fn test_send_greedy_toward_anchor() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.hear(2, 600, 500);
        h.hear(3, 500, 600);

        let id = h.run(|router, env| router.send(make_id(50), DATA_PORT, &b"ping"[..], env));

        let sent = h.transport.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, make_id(2));
        let (header, datagram) = decode_routed(&sent[0]);
        assert_eq!(header.destination, WirePoint::new(1000, 500));
        assert!(!header.in_recovery);
        assert_eq!(header.previous_hop, WirePoint::new(500, 500));
        assert_eq!(datagram.id(), id);
        assert_eq!(datagram.header.ttl, DEFAULT_TTL - 1);
        assert_eq!(&datagram.payload[..], b"ping");

        let events = h.router.drain_events();
        assert!(matches!(events[0], RoutingEvent::Originated { .. }));
        assert!(events.contains(&RoutingEvent::forwarded(
            id,
            make_id(2),
            ForwardMode::Greedy,
            Duration::ZERO
        )));
    }

    #[test]
    fn test_send_direct_to_neighbor() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.hear(2, 600, 500);
        let id = h.run(|router, env| router.send(make_id(2), DATA_PORT, &b"hi"[..], env));

        let sent = h.transport.take();
        assert_eq!(sent[0].destination, make_id(2));
        assert!(h.router.drain_events().contains(&RoutingEvent::forwarded(
            id,
            make_id(2),
            ForwardMode::Direct,
            Duration::ZERO
        )));
    }

    #[test]
    fn test_unknown_destination_deferred_then_times_out() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        let id = h.run(|router, env| router.send(make_id(9), DATA_PORT, &b"x"[..], env));

        assert!(h.transport.take().is_empty());
        assert_eq!(h.router.queue().len(), 1);
        assert!(h.scheduler.is_pending(Timer::QueueRecheck));
        assert!(h.router.drain_events().contains(&RoutingEvent::Deferred {
            packet_id: id,
            destination: make_id(9),
            at: Duration::ZERO,
        }));

        for _ in 0..12 {
            h.scheduler.advance(Duration::from_millis(500));
            h.fire_due();
        }

        let events = h.router.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, RoutingEvent::SearchTimedOut { target, .. } if *target == make_id(9))));
        assert!(events.iter().any(|e| matches!(
            e,
            RoutingEvent::Dropped { packet_id: Some(p), reason: DropReason::SearchTimeout, .. } if *p == id
        )));
        assert!(h.router.queue().is_empty());
        assert!(!h.scheduler.is_pending(Timer::QueueRecheck));
    }

    #[test]
    fn test_deferred_packet_released_when_destination_heard() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.run(|router, env| router.send(make_id(9), DATA_PORT, &b"x"[..], env));
        h.hear(9, 550, 500);

        h.scheduler.advance(Duration::from_millis(500));
        h.fire_due();

        let sent = h.transport.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, make_id(9));
        assert!(h.router.queue().is_empty());
    }

    #[test]
    fn test_transit_enters_recovery() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.hear(2, 450, 550);
        h.hear(3, 450, 450);

        let datagram = Datagram::new(7, make_id(3), make_id(9), DATA_PORT, &b"p"[..]);
        let header = greedy_header(WirePoint::new(700, 500), WirePoint::new(450, 450));
        let frame = routed_frame(header, &datagram);
        h.run(|router, env| router.on_receive(frame, make_id(3), FORWARDING_PORT, env));

        let sent = h.transport.take();
        assert_eq!(sent.len(), 1);
        // Reference is the destination (bearing 0); 2 is at 135 degrees, 3 at 225
        assert_eq!(sent[0].destination, make_id(2));
        let (header, datagram) = decode_routed(&sent[0]);
        assert!(header.in_recovery);
        assert_eq!(header.recovery, WirePoint::new(500, 500));
        assert_eq!(header.previous_hop, WirePoint::new(500, 500));
        assert_eq!(datagram.id(), 7);
    }

    #[test]
    fn test_recovery_uses_previous_hop_as_reference() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.hear(2, 450, 550);
        h.hear(3, 450, 450);
        h.hear(4, 550, 450);

        let datagram = Datagram::new(7, make_id(3), make_id(9), DATA_PORT, &b"p"[..]);
        let header = PositionHeader {
            destination: WirePoint::new(900, 500),
            updated: 0,
            recovery: WirePoint::new(700, 500),
            in_recovery: true,
            previous_hop: WirePoint::new(450, 450),
        };
        let frame = routed_frame(header, &datagram);
        h.run(|router, env| router.on_receive(frame, make_id(3), FORWARDING_PORT, env));

        // Reference bearing 225 degrees; next counterclockwise is 4 at 315
        let sent = h.transport.take();
        assert_eq!(sent[0].destination, make_id(4));
        let (header, _) = decode_routed(&sent[0]);
        assert!(header.in_recovery);
        assert_eq!(header.recovery, WirePoint::new(700, 500));
    }

    fn decide_toward_origin(h: &mut Harness) -> ForwardDecision {
        let mut header = greedy_header(WirePoint::new(0, 0), WirePoint::new(300, 0));
        h.run(|router, env| router.decide(make_id(9), &mut header, env))
    }

    #[test]
    fn test_truncated_neighbor_is_not_greedy_progress() {
        // Both nodes advertise (100, 0) to each other
        let mut a = Harness::mobile(1, Position::new(100.7, 0.0));
        let mut b = Harness::mobile(2, Position::new(100.3, 0.0));
        a.hear(2, 100, 0);
        b.hear(1, 100, 0);

        for h in [&mut a, &mut b] {
            let decision = decide_toward_origin(h);
            assert!(decision.is_recovery());
        }
    }

    #[test]
    fn test_greedy_hop_keeps_recovery_fields() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.hear(2, 600, 500);

        let mut header = PositionHeader {
            destination: WirePoint::new(900, 500),
            updated: 0,
            recovery: WirePoint::new(450, 500),
            in_recovery: false,
            previous_hop: WirePoint::new(400, 500),
        };
        let decision = h.run(|router, env| router.decide(make_id(9), &mut header, env));

        assert_eq!(decision.next_hop(), Some(make_id(2)));
        assert!(!decision.is_recovery());
        assert_eq!(header.recovery, WirePoint::new(450, 500));
        assert_eq!(header.previous_hop, WirePoint::new(500, 500));
    }

    #[test]
    fn test_no_neighbors_drops_no_route() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        let id = h.run(|router, env| router.send(make_id(50), DATA_PORT, &b"x"[..], env));

        assert!(h.transport.take().is_empty());
        assert!(h.router.drain_events().contains(&RoutingEvent::dropped(
            Some(id),
            DropReason::NoRoute,
            Duration::ZERO
        )));
    }

    #[test]
    fn test_ttl_expired() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.hear(2, 600, 500);

        let mut datagram = Datagram::new(7, make_id(8), make_id(2), DATA_PORT, &b"p"[..]);
        datagram.header.ttl = 0;
        let frame = routed_frame(
            greedy_header(WirePoint::new(600, 500), WirePoint::new(400, 500)),
            &datagram,
        );
        h.run(|router, env| router.on_receive(frame, make_id(8), FORWARDING_PORT, env));

        assert!(h.transport.take().is_empty());
        assert!(h.router.drain_events().contains(&RoutingEvent::dropped(
            Some(7),
            DropReason::TtlExpired,
            Duration::ZERO
        )));
    }

    #[test]
    fn test_transmit_failure_removes_neighbor() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.hear(2, 600, 500);
        h.transport.set_unreachable(make_id(2));

        let id = h.run(|router, env| router.send(make_id(2), DATA_PORT, &b"x"[..], env));

        assert!(!h.router.neighbors().is_neighbor(make_id(2)));
        let events = h.router.drain_events();
        assert!(events.contains(&RoutingEvent::NeighborLost {
            neighbor: make_id(2),
            at: Duration::ZERO
        }));
        assert!(events.contains(&RoutingEvent::dropped(
            Some(id),
            DropReason::NoRoute,
            Duration::ZERO
        )));
    }

    #[test]
    fn test_link_failure_removes_neighbor() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        h.hear(2, 600, 500);
        h.run(|router, env| router.on_link_failure(make_id(2), env));
        assert!(h.router.neighbors().is_empty());

        // A second report for the same neighbor is quiet
        h.run(|router, env| router.on_link_failure(make_id(2), env));
        let lost = h
            .router
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, RoutingEvent::NeighborLost { .. }))
            .count();
        assert_eq!(lost, 1);
    }

    #[test]
    fn test_malformed_frame_dropped() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        let frame = Bytes::from_static(&[42, 1, 2]);
        h.run(|router, env| router.on_receive(frame, make_id(2), FORWARDING_PORT, env));
        assert_eq!(
            h.router.drain_events(),
            vec![RoutingEvent::dropped(None, DropReason::Malformed, Duration::ZERO)]
        );
    }

    #[test]
    fn test_delivery_counts_hops() {
        let mut h = Harness::mobile(1, Position::new(500.0, 500.0));
        let mut datagram = Datagram::new(7, make_id(8), make_id(1), DATA_PORT, &b"p"[..]);
        datagram.header.ttl = DEFAULT_TTL - 4;
        let frame = routed_frame(
            greedy_header(WirePoint::new(500, 500), WirePoint::new(450, 500)),
            &datagram,
        );
        h.scheduler.set_now(secs(3));
        h.run(|router, env| router.on_receive(frame, make_id(8), FORWARDING_PORT, env));

        assert!(h.router.drain_events().contains(&RoutingEvent::Delivered {
            packet_id: 7,
            source: make_id(8),
            hops: 4,
            at: secs(3),
        }));
        // The link source became a neighbor at its announced position
        assert_eq!(
            h.router.neighbors().get(make_id(8)).unwrap().position,
            Position::new(450.0, 500.0)
        );
    }

    #[test]
    fn test_anchor_greets_new_mobile() {
        let registry = StaticRegistry::new(make_id(50), Role::Anchor)
            .with_anchor(make_id(50), Position::new(500.0, 500.0));
        let mut h = Harness::new(registry, Position::new(500.0, 500.0));
        h.hear(5, 600, 600);

        let sent = h.transport.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, make_id(5));
        let (_, datagram) = decode_routed(&sent[0]);
        assert_eq!(
            datagram.header,
            DatagramHeader {
                id: datagram.id(),
                source: make_id(50),
                destination: make_id(5),
                port: DIRECTORY_PORT,
                ttl: DEFAULT_TTL - 1,
            }
        );
        let mut payload = datagram.payload.clone();
        assert_eq!(
            Message::decode(&mut payload).unwrap(),
            Message::DirectoryHello(DirectoryHello {
                anchor: make_id(50),
                position: WirePoint::new(500, 500),
            })
        );
    }

    #[test]
    fn test_anchor_in_coverage_reached_directly() {
        let mut h = Harness::mobile(1, Position::new(800.0, 500.0));
        let id = h.run(|router, env| router.send(make_id(50), DATA_PORT, &b"x"[..], env));

        let sent = h.transport.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, make_id(50));
        assert!(h.router.drain_events().contains(&RoutingEvent::forwarded(
            id,
            make_id(50),
            ForwardMode::Direct,
            Duration::ZERO
        )));
    }
}
