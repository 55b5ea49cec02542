//! In-memory collaborators for testing
//!
//! Hand-driven implementations of the collaborator traits. Tests advance
//! time explicitly and inspect every frame a node tried to send.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_core::mock::{ManualScheduler, RecordingTransport, StaticMobility};
//!
//! let mut scheduler = ManualScheduler::new();
//! let mut transport = RecordingTransport::new();
//! let mobility = StaticMobility::at(Position::new(0.0, 0.0));
//!
//! router.start(&mut env);
//! scheduler.advance(Duration::from_secs(1));
//! for timer in scheduler.take_due() {
//!     router.on_timer(timer, &mut env);
//! }
//! assert_eq!(transport.sent.len(), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use bytes::Bytes;

use crate::error::TransportError;
use crate::geometry::{Position, Velocity};
use crate::identity::{NodeId, Role};
use crate::traits::{
    AnchorInfo, Clock, Oracle, PositionSource, Registry, Scheduler, Timer, TimerToken, Transport,
};

/// A timer registered with [`ManualScheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub token: TimerToken,
    pub fire_at: Duration,
    pub timer: Timer,
}

/// Scheduler whose clock only moves when told to
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_token: u64,
    pending: Vec<ScheduledTimer>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at `now`
    pub fn at(now: Duration) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    pub fn set_now(&mut self, now: Duration) {
        self.now = now;
    }

    /// Timers still waiting to fire, earliest first
    pub fn pending(&self) -> Vec<ScheduledTimer> {
        let mut pending = self.pending.clone();
        pending.sort_by_key(|t| (t.fire_at, t.token));
        pending
    }

    /// Whether a timer of this kind is waiting
    pub fn is_pending(&self, timer: Timer) -> bool {
        self.pending.iter().any(|t| t.timer == timer)
    }

    /// Remove and return every timer due at the current time
    pub fn take_due(&mut self) -> Vec<Timer> {
        let now = self.now;
        let (due, rest): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|t| t.fire_at <= now);
        self.pending = rest;

        let mut due = due;
        due.sort_by_key(|t| (t.fire_at, t.token));
        due.into_iter().map(|t| t.timer).collect()
    }
}

impl Clock for ManualScheduler {
    fn now(&self) -> Duration {
        self.now
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerToken {
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.pending.push(ScheduledTimer {
            token,
            fire_at: self.now + delay,
            timer,
        });
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        self.pending.retain(|t| t.token != token);
    }
}

/// A frame handed to [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub payload: Bytes,
    pub destination: NodeId,
    pub port: u16,
}

/// Transport that records frames instead of delivering them
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<SentFrame>,
    unreachable: HashSet<NodeId>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends to `id` fail
    pub fn set_unreachable(&mut self, id: NodeId) {
        self.unreachable.insert(id);
    }

    /// Remove and return everything sent so far
    pub fn take(&mut self) -> Vec<SentFrame> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, payload: Bytes, destination: NodeId, port: u16) -> Result<(), TransportError> {
        if self.unreachable.contains(&destination) {
            return Err(TransportError::Unreachable(destination));
        }
        self.sent.push(SentFrame {
            payload,
            destination,
            port,
        });
        Ok(())
    }
}

/// Fixed position and velocity
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticMobility {
    pub position: Position,
    pub velocity: Velocity,
}

impl StaticMobility {
    pub fn at(position: Position) -> Self {
        Self {
            position,
            velocity: Velocity::ZERO,
        }
    }

    pub fn moving(position: Position, velocity: Velocity) -> Self {
        Self { position, velocity }
    }
}

impl PositionSource for StaticMobility {
    fn current_position(&self) -> Position {
        self.position
    }

    fn current_velocity(&self) -> Velocity {
        self.velocity
    }
}

/// Registry backed by plain values
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    pub id: NodeId,
    pub role: Role,
    pub anchors: Vec<AnchorInfo>,
}

impl StaticRegistry {
    pub fn new(id: NodeId, role: Role) -> Self {
        Self {
            id,
            role,
            anchors: Vec::new(),
        }
    }

    pub fn with_anchor(mut self, id: NodeId, position: Position) -> Self {
        self.anchors.push(AnchorInfo { id, position });
        self
    }
}

impl Registry for StaticRegistry {
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

/// Oracle backed by a map of true positions
#[derive(Debug, Clone, Default)]
pub struct MapOracle {
    pub positions: HashMap<NodeId, Position>,
}

impl MapOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: NodeId, position: Position) -> Self {
        self.positions.insert(id, position);
        self
    }
}

impl Oracle for MapOracle {
    fn true_position(&self, id: NodeId) -> Option<Position> {
        self.positions.get(&id).copied()
    }
}
