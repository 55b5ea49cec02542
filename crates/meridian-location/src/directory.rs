//! Location directory protocol
//!
//! Anchors act as per-area directories; mobile nodes register with the
//! nearest anchor and ask it for the positions of others. The behavior of
//! each role lives behind the [`DirectoryProtocol`] trait and is picked
//! once, from the node's role, by [`directory_for`].
//!
//! Handlers never call the forwarding layer. Messages to send and events to
//! report are appended to an [`Outbox`] that the caller drains afterwards.
//!
//! ## Search lifecycle
//!
//! ```text
//! Unknown --resolve miss--> Searching --reply--> Known
//!    ^                          |
//!    +------ max search time ---+
//! ```

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use meridian_core::{
    AnchorInfo, Message, NodeId, Oracle, Position, Registry, Role, RoutingEvent, Velocity,
};

use crate::anchor::AnchorDirectory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::mobile::MobileDirectory;
use crate::table::LocationTable;

/// Timing of the location directory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Age at which a location entry is discarded
    pub table_lifetime: Duration,
    /// How long a query may stay unanswered
    pub max_search_time: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            table_lifetime: Duration::from_secs(5),
            max_search_time: Duration::from_secs(5),
        }
    }
}

impl DirectoryConfig {
    pub fn with_table_lifetime(mut self, lifetime: Duration) -> Self {
        self.table_lifetime = lifetime;
        self
    }

    pub fn with_max_search_time(mut self, max: Duration) -> Self {
        self.max_search_time = max;
        self
    }
}

/// A directory message waiting to be routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outgoing {
    pub destination: NodeId,
    pub message: Message,
}

/// Messages and events produced by directory handlers
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Outgoing>,
    events: Vec<RoutingEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `message` for delivery to `destination`
    pub fn send(&mut self, destination: NodeId, message: Message) {
        self.messages.push(Outgoing {
            destination,
            message,
        });
    }

    pub fn record(&mut self, event: RoutingEvent) {
        self.events.push(event);
    }

    pub fn messages(&self) -> &[Outgoing] {
        &self.messages
    }

    pub fn events(&self) -> &[RoutingEvent] {
        &self.events
    }

    pub fn take_messages(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.messages)
    }

    pub fn take_events(&mut self) -> Vec<RoutingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.events.is_empty()
    }
}

/// What a handler may see of the node and its surroundings
pub struct DirectoryContext<'a> {
    pub now: Duration,
    /// The node's own position
    pub position: Position,
    /// The node's own velocity
    pub velocity: Velocity,
    /// Ground truth, for accuracy logging only
    pub oracle: Option<&'a dyn Oracle>,
    pub outbox: &'a mut Outbox,
}

impl<'a> DirectoryContext<'a> {
    pub fn new(now: Duration, position: Position, outbox: &'a mut Outbox) -> Self {
        Self {
            now,
            position,
            velocity: Velocity::ZERO,
            oracle: None,
            outbox,
        }
    }

    pub fn with_velocity(mut self, velocity: Velocity) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_oracle(mut self, oracle: Option<&'a dyn Oracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Distance between `predicted` and the true position of `id`
    pub fn location_error(&self, id: NodeId, predicted: Position) -> Option<f64> {
        let truth = self.oracle?.true_position(id)?;
        Some(predicted.distance_to(&truth))
    }
}

/// Role-specific behavior of the location directory
pub trait DirectoryProtocol {
    fn role(&self) -> Role;

    fn local_id(&self) -> NodeId;

    fn config(&self) -> &DirectoryConfig;

    fn table(&self) -> &LocationTable;

    fn table_mut(&mut self) -> &mut LocationTable;

    /// All anchors of the deployment
    fn anchors(&self) -> &[AnchorInfo];

    /// Position of `id` for forwarding, starting a search on a miss
    ///
    /// Returns [`Position::INVALID`] while the position is unknown.
    fn resolve(&mut self, id: NodeId, ctx: &mut DirectoryContext<'_>) -> Position;

    /// Handle one decoded directory message from `source`
    fn handle_message(
        &mut self,
        source: NodeId,
        message: Message,
        ctx: &mut DirectoryContext<'_>,
    ) -> DirectoryResult<()>;

    /// A forwarding-layer hello was received from a neighbor
    fn on_hello(&mut self, from: NodeId, position: Position, ctx: &mut DirectoryContext<'_>) {
        self.observe_neighbor(from, position, ctx.now);
    }

    /// Decode a directory datagram payload and handle it
    fn handle_datagram(
        &mut self,
        source: NodeId,
        mut payload: Bytes,
        ctx: &mut DirectoryContext<'_>,
    ) -> DirectoryResult<()> {
        let message = Message::decode(&mut payload)?;
        if !message.kind().is_directory() {
            return Err(DirectoryError::UnexpectedMessage {
                role: self.role(),
                kind: message.kind(),
            });
        }
        self.handle_message(source, message, ctx)
    }

    /// Position of a registered anchor
    fn anchor_position(&self, id: NodeId) -> Option<Position> {
        self.anchors()
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.position)
    }

    /// Whether a query for `id` is still outstanding
    ///
    /// An entry older than the max search time is deleted, so the next
    /// lookup starts a fresh search.
    fn is_in_search(&mut self, id: NodeId, now: Duration) -> bool {
        let max = self.config().max_search_time;
        let table = self.table_mut();
        let expired = match table.entry(id) {
            Some(entry) => entry.age(now) > max,
            None => return false,
        };
        if expired {
            table.delete(id);
            return false;
        }
        table.is_searching(id)
    }

    /// Whether a usable position for `id` is known
    fn has_position(&self, id: NodeId, now: Duration) -> bool {
        if self.anchor_position(id).is_some() {
            return true;
        }
        let lifetime = self.table().lifetime();
        self.table().entry(id).is_some_and(|entry| {
            !entry.searching && entry.position.is_valid() && entry.age(now) <= lifetime
        })
    }

    /// Predicted position of `id` without starting a search
    fn cached_position(&self, id: NodeId, now: Duration) -> Position {
        self.anchor_position(id)
            .unwrap_or_else(|| self.table().get_position(id, now))
    }

    /// Cache a position overheard from a forwarding hello
    ///
    /// An existing entry keeps its speed and sequence number. A pending
    /// search for the neighbor is satisfied by the observation.
    fn observe_neighbor(&mut self, id: NodeId, position: Position, now: Duration) {
        if id == self.local_id() || !position.is_valid() {
            return;
        }
        let table = self.table_mut();
        let known = table.entry(id).is_some_and(|e| !e.searching);
        if !known || !table.refresh_position(id, position, now) {
            table.upsert(id, position, 0.0, false, 0, now);
        }
    }
}

/// Build the directory strategy for the role in `registry`
pub fn directory_for(registry: &dyn Registry, config: DirectoryConfig) -> Box<dyn DirectoryProtocol> {
    match registry.role() {
        Role::Anchor => Box::new(AnchorDirectory::new(
            registry.local_id(),
            registry.anchors(),
            config,
        )),
        Role::Mobile => Box::new(MobileDirectory::new(
            registry.local_id(),
            registry.anchors(),
            config,
        )),
    }
}
