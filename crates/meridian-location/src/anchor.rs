//! Anchor side of the location directory
//!
//! An anchor stores the positions reported by the mobile nodes registered
//! with it and answers queries from its table. When a query misses, the
//! anchor asks every other anchor for its cached knowledge of the target
//! with an [`AnchorLookup`] and relays the first positive answer to the
//! waiting requesters.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use meridian_core::{
    AnchorAnswer, AnchorInfo, AnchorLookup, DirectoryHello, DirectoryReply, Message, NodeId,
    Position, Role, RoutingEvent, WirePoint,
};
use tracing::{debug, trace};

use crate::directory::{DirectoryConfig, DirectoryContext, DirectoryProtocol};
use crate::error::DirectoryResult;
use crate::table::LocationTable;

/// An anchor-to-anchor search in progress
#[derive(Debug, Clone)]
struct PendingSearch {
    /// Nodes waiting for a DirectoryReply
    requesters: Vec<NodeId>,
    /// Anchors that have not answered yet
    awaiting: HashSet<NodeId>,
    lookup_id: u32,
}

/// Directory strategy of an anchor
#[derive(Debug, Clone)]
pub struct AnchorDirectory {
    id: NodeId,
    anchors: Vec<AnchorInfo>,
    table: LocationTable,
    config: DirectoryConfig,
    pending: HashMap<NodeId, PendingSearch>,
    next_lookup: u32,
}

impl AnchorDirectory {
    pub fn new(id: NodeId, anchors: Vec<AnchorInfo>, config: DirectoryConfig) -> Self {
        Self {
            id,
            anchors,
            table: LocationTable::new(config.table_lifetime),
            config,
            pending: HashMap::new(),
            next_lookup: 0,
        }
    }

    /// Whether an anchor-to-anchor search for `target` is running
    pub fn is_searching_anchors(&self, target: NodeId) -> bool {
        self.pending.contains_key(&target)
    }

    /// Nodes waiting for the position of `target`
    pub fn pending_requesters(&self, target: NodeId) -> Vec<NodeId> {
        self.pending
            .get(&target)
            .map(|s| s.requesters.clone())
            .unwrap_or_default()
    }

    fn other_anchors(&self) -> Vec<NodeId> {
        self.anchors
            .iter()
            .map(|a| a.id)
            .filter(|id| *id != self.id)
            .collect()
    }

    /// Predicted position of `id` if the table holds a usable sample
    fn known_position(&self, id: NodeId, now: Duration) -> Option<Position> {
        if let Some(position) = self.anchor_position(id) {
            return Some(position);
        }
        self.table
            .entry(id)
            .filter(|e| !e.searching && e.position.is_valid())
            .filter(|e| e.age(now) <= self.table.lifetime())
            .map(|e| e.predict(now))
    }

    fn purge(&mut self, now: Duration) {
        self.table.purge(now);
        let table = &self.table;
        self.pending.retain(|target, _| table.is_searching(*target));
    }

    fn start_search(
        &mut self,
        target: NodeId,
        requester: Option<NodeId>,
        ctx: &mut DirectoryContext<'_>,
    ) {
        if let Some(search) = self.pending.get_mut(&target) {
            if let Some(r) = requester {
                if !search.requesters.contains(&r) {
                    search.requesters.push(r);
                }
            }
            trace!(
                node = %self.id,
                %target,
                lookup = search.lookup_id,
                "Search already running"
            );
            return;
        }

        if !self.table.is_searching(target) {
            self.table
                .upsert(target, Position::INVALID, 0.0, true, 0, ctx.now);
        }

        let others = self.other_anchors();
        if others.is_empty() {
            debug!(node = %self.id, %target, "No other anchor to ask");
            return;
        }

        self.next_lookup = self.next_lookup.wrapping_add(1);
        let lookup_id = self.next_lookup;
        for anchor in &others {
            ctx.outbox.send(
                *anchor,
                Message::AnchorLookup(AnchorLookup {
                    anchor: self.id,
                    target,
                    lookup_id,
                }),
            );
            ctx.outbox.record(RoutingEvent::QueryIssued {
                target,
                anchor: *anchor,
                at: ctx.now,
            });
        }
        debug!(
            node = %self.id,
            %target,
            lookup = lookup_id,
            asked = others.len(),
            "Anchor search started"
        );

        self.pending.insert(
            target,
            PendingSearch {
                requesters: requester.into_iter().collect(),
                awaiting: others.into_iter().collect(),
                lookup_id,
            },
        );
    }

    /// Send the now-known position of `target` to everyone waiting for it
    fn answer_pending(&mut self, target: NodeId, ctx: &mut DirectoryContext<'_>) {
        let Some(search) = self.pending.remove(&target) else {
            return;
        };
        let position = self.table.get_position(target, ctx.now);
        for requester in &search.requesters {
            ctx.outbox.send(
                *requester,
                Message::DirectoryReply(DirectoryReply {
                    requester: *requester,
                    target,
                    position: WirePoint::from(position),
                }),
            );
        }

        let error = ctx.location_error(target, position);
        debug!(
            node = %self.id,
            %target,
            %position,
            requesters = search.requesters.len(),
            error = ?error,
            "Anchor search resolved"
        );
        ctx.outbox.record(RoutingEvent::LocationResolved {
            target,
            error,
            at: ctx.now,
        });
    }

    fn on_query(&mut self, requester: NodeId, target: NodeId, ctx: &mut DirectoryContext<'_>) {
        self.purge(ctx.now);

        match self.known_position(target, ctx.now) {
            Some(position) => {
                trace!(node = %self.id, %requester, %target, %position, "Answering query");
                ctx.outbox.send(
                    requester,
                    Message::DirectoryReply(DirectoryReply {
                        requester,
                        target,
                        position: WirePoint::from(position),
                    }),
                );
            }
            None => self.start_search(target, Some(requester), ctx),
        }
    }

    fn on_lookup(&mut self, lookup: AnchorLookup, ctx: &mut DirectoryContext<'_>) {
        self.purge(ctx.now);

        let known = self.known_position(lookup.target, ctx.now);
        trace!(
            node = %self.id,
            asker = %lookup.anchor,
            target = %lookup.target,
            lookup = lookup.lookup_id,
            found = known.is_some(),
            "Answering anchor lookup"
        );
        ctx.outbox.send(
            lookup.anchor,
            Message::AnchorAnswer(AnchorAnswer {
                anchor: self.id,
                target: lookup.target,
                found: known.is_some(),
                position: known.map(WirePoint::from).unwrap_or_default(),
            }),
        );
    }

    fn on_answer(&mut self, answer: AnchorAnswer, ctx: &mut DirectoryContext<'_>) {
        if answer.found {
            if self.known_position(answer.target, ctx.now).is_none() {
                self.table.upsert(
                    answer.target,
                    answer.position.to_position(),
                    0.0,
                    false,
                    0,
                    ctx.now,
                );
            }
            self.answer_pending(answer.target, ctx);
            return;
        }

        let Some(search) = self.pending.get_mut(&answer.target) else {
            trace!(node = %self.id, target = %answer.target, "Late negative answer");
            return;
        };
        search.awaiting.remove(&answer.anchor);
        if search.awaiting.is_empty() {
            self.pending.remove(&answer.target);
            if self.table.is_searching(answer.target) {
                self.table.delete(answer.target);
            }
            debug!(node = %self.id, target = %answer.target, "No anchor knows the target");
        }
    }
}

impl DirectoryProtocol for AnchorDirectory {
    fn role(&self) -> Role {
        Role::Anchor
    }

    fn local_id(&self) -> NodeId {
        self.id
    }

    fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    fn table(&self) -> &LocationTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut LocationTable {
        &mut self.table
    }

    fn anchors(&self) -> &[AnchorInfo] {
        &self.anchors
    }

    fn on_hello(&mut self, from: NodeId, position: Position, ctx: &mut DirectoryContext<'_>) {
        self.observe_neighbor(from, position, ctx.now);

        if self.anchor_position(from).is_some() {
            return;
        }
        if self.table.seq(from).unwrap_or(0) >= 1 {
            return;
        }

        trace!(node = %self.id, neighbor = %from, "Greeting unregistered node");
        ctx.outbox.send(
            from,
            Message::DirectoryHello(DirectoryHello {
                anchor: self.id,
                position: WirePoint::from(ctx.position),
            }),
        );
    }

    fn resolve(&mut self, id: NodeId, ctx: &mut DirectoryContext<'_>) -> Position {
        if let Some(position) = self.anchor_position(id) {
            return position;
        }

        if let Some(entry) = self.table.entry(id).copied() {
            if entry.age(ctx.now) > self.table.lifetime() {
                self.table.delete(id);
            } else if entry.searching {
                return Position::INVALID;
            } else {
                return entry.predict(ctx.now);
            }
        }

        self.start_search(id, None, ctx);
        Position::INVALID
    }

    fn handle_message(
        &mut self,
        source: NodeId,
        message: Message,
        ctx: &mut DirectoryContext<'_>,
    ) -> DirectoryResult<()> {
        match message {
            Message::DirectoryUpdate(update) => {
                trace!(
                    node = %self.id,
                    mobile = %update.node,
                    speed = update.speed,
                    "Registration update"
                );
                self.table.upsert(
                    update.node,
                    update.position.to_position(),
                    f64::from(update.speed),
                    false,
                    1,
                    ctx.now,
                );
                self.answer_pending(update.node, ctx);
            }
            Message::DirectoryQuery(query) => self.on_query(query.requester, query.target, ctx),
            Message::AnchorLookup(lookup) => self.on_lookup(lookup, ctx),
            Message::AnchorAnswer(answer) => self.on_answer(answer, ctx),
            other => {
                trace!(
                    node = %self.id,
                    %source,
                    kind = %other.kind(),
                    "Ignoring directory message on anchor"
                );
            }
        }
        Ok(())
    }
}
