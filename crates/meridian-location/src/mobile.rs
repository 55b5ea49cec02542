//! Mobile side of the location directory
//!
//! A mobile node binds to the anchor that last greeted it with a
//! DirectoryHello, keeps that anchor informed of its position and speed,
//! and sends its queries there.

use meridian_core::{
    AnchorInfo, DirectoryQuery, DirectoryReply, DirectoryUpdate, Message, NodeId, Position, Role,
    RoutingEvent, WirePoint,
};
use tracing::{debug, trace, warn};

use crate::directory::{DirectoryConfig, DirectoryContext, DirectoryProtocol};
use crate::error::DirectoryResult;
use crate::table::LocationTable;

/// Directory strategy of a mobile node
#[derive(Debug, Clone)]
pub struct MobileDirectory {
    id: NodeId,
    anchors: Vec<AnchorInfo>,
    /// Anchor this node is registered with
    bound: Option<AnchorInfo>,
    table: LocationTable,
    config: DirectoryConfig,
}

impl MobileDirectory {
    pub fn new(id: NodeId, anchors: Vec<AnchorInfo>, config: DirectoryConfig) -> Self {
        Self {
            id,
            anchors,
            bound: None,
            table: LocationTable::new(config.table_lifetime),
            config,
        }
    }

    /// The anchor this node currently registers with
    pub fn bound_anchor(&self) -> Option<AnchorInfo> {
        self.bound
    }

    fn on_directory_hello(&mut self, anchor: AnchorInfo, ctx: &mut DirectoryContext<'_>) {
        if self.bound.map(|b| b.id) != Some(anchor.id) {
            debug!(
                node = %self.id,
                anchor = %anchor.id,
                previous = ?self.bound.map(|b| b.id),
                "Binding to anchor"
            );
            self.bound = Some(anchor);
        }

        let speed = ctx.velocity.speed().round();
        ctx.outbox.send(
            anchor.id,
            Message::DirectoryUpdate(DirectoryUpdate {
                node: self.id,
                position: WirePoint::from(ctx.position),
                speed: speed as u32,
            }),
        );
        trace!(node = %self.id, anchor = %anchor.id, speed, "Sent directory update");
    }

    fn on_reply(&mut self, reply: DirectoryReply, ctx: &mut DirectoryContext<'_>) {
        if reply.requester != self.id {
            debug!(
                node = %self.id,
                requester = %reply.requester,
                "Reply addressed to another requester"
            );
        }

        if !self.table.is_searching(reply.target) {
            warn!(
                node = %self.id,
                target = %reply.target,
                "Unexpected reply with no outstanding search"
            );
        }

        let position = reply.position.to_position();
        self.table
            .upsert(reply.target, position, 0.0, false, 0, ctx.now);

        let error = ctx.location_error(reply.target, position);
        debug!(
            node = %self.id,
            target = %reply.target,
            %position,
            error = ?error,
            "Location resolved"
        );
        ctx.outbox.record(RoutingEvent::LocationResolved {
            target: reply.target,
            error,
            at: ctx.now,
        });
    }
}

impl DirectoryProtocol for MobileDirectory {
    fn role(&self) -> Role {
        Role::Mobile
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

    fn resolve(&mut self, id: NodeId, ctx: &mut DirectoryContext<'_>) -> Position {
        if let Some(bound) = self.bound.filter(|b| b.id == id) {
            return bound.position;
        }
        if let Some(position) = self.anchor_position(id) {
            return position;
        }

        let now = ctx.now;
        if let Some(entry) = self.table.entry(id).copied() {
            if entry.age(now) > self.table.lifetime() {
                trace!(node = %self.id, target = %id, "Deleting stale location entry");
                self.table.delete(id);
            } else if entry.searching {
                return Position::INVALID;
            } else {
                return entry.predict(now);
            }
        }

        self.table.upsert(id, Position::INVALID, 0.0, true, 1, now);

        match self.bound {
            Some(anchor) => {
                ctx.outbox.send(
                    anchor.id,
                    Message::DirectoryQuery(DirectoryQuery {
                        requester: self.id,
                        anchor: anchor.id,
                        target: id,
                    }),
                );
                ctx.outbox.record(RoutingEvent::QueryIssued {
                    target: id,
                    anchor: anchor.id,
                    at: now,
                });
                debug!(node = %self.id, target = %id, anchor = %anchor.id, "Query issued");
            }
            None => {
                debug!(node = %self.id, target = %id, "No anchor bound, search will time out");
            }
        }

        Position::INVALID
    }

    fn handle_message(
        &mut self,
        source: NodeId,
        message: Message,
        ctx: &mut DirectoryContext<'_>,
    ) -> DirectoryResult<()> {
        match message {
            Message::DirectoryHello(hello) => {
                let anchor = AnchorInfo {
                    id: hello.anchor,
                    position: hello.position.to_position(),
                };
                self.on_directory_hello(anchor, ctx);
            }
            Message::DirectoryReply(reply) => self.on_reply(reply, ctx),
            other => {
                trace!(
                    node = %self.id,
                    %source,
                    kind = %other.kind(),
                    "Ignoring directory message on mobile node"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::mock::MapOracle;
    use meridian_core::{DirectoryHello, Velocity};
    use std::time::Duration;

    use crate::directory::Outbox;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn make_mobile() -> MobileDirectory {
        MobileDirectory::new(
            NodeId::host(10),
            vec![AnchorInfo {
                id: NodeId::host(1),
                position: Position::new(0.0, 0.0),
            }],
            DirectoryConfig::default(),
        )
    }

    fn greet(dir: &mut MobileDirectory, anchor: u32, outbox: &mut Outbox) {
        let mut ctx = DirectoryContext::new(secs(0), Position::new(50.0, 0.0), outbox)
            .with_velocity(Velocity::new(3.0, 4.0));
        dir.handle_message(
            NodeId::host(anchor),
            Message::DirectoryHello(DirectoryHello {
                anchor: NodeId::host(anchor),
                position: WirePoint::new(0, 0),
            }),
            &mut ctx,
        )
        .unwrap();
    }

    #[test]
    fn test_miss_issues_single_query() {
        let mut dir = make_mobile();
        let mut outbox = Outbox::new();
        greet(&mut dir, 1, &mut outbox);
        outbox.take_messages();

        let target = NodeId::host(20);
        let mut ctx = DirectoryContext::new(secs(1), Position::ORIGIN, &mut outbox);
        assert_eq!(dir.resolve(target, &mut ctx), Position::INVALID);
        assert_eq!(dir.resolve(target, &mut ctx), Position::INVALID);

        let sent = outbox.take_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, NodeId::host(1));
        assert_eq!(
            sent[0].message,
            Message::DirectoryQuery(DirectoryQuery {
                requester: NodeId::host(10),
                anchor: NodeId::host(1),
                target,
            })
        );
        assert!(dir.table().is_searching(target));
        assert_eq!(dir.table().seq(target), Some(1));
        assert!(matches!(
            outbox.events()[0],
            RoutingEvent::QueryIssued { .. }
        ));
    }

    #[test]
    fn test_unbound_miss_sends_nothing() {
        let mut dir = make_mobile();
        let mut outbox = Outbox::new();
        let mut ctx = DirectoryContext::new(secs(0), Position::ORIGIN, &mut outbox);
        assert_eq!(dir.resolve(NodeId::host(20), &mut ctx), Position::INVALID);
        assert!(outbox.messages().is_empty());
        assert!(dir.table().is_searching(NodeId::host(20)));
    }

    #[test]
    fn test_anchor_positions_known() {
        let mut dir = make_mobile();
        let mut outbox = Outbox::new();
        let mut ctx = DirectoryContext::new(secs(0), Position::ORIGIN, &mut outbox);
        assert_eq!(dir.resolve(NodeId::host(1), &mut ctx), Position::new(0.0, 0.0));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_rebind_sends_update_with_speed() {
        let mut dir = make_mobile();
        let mut outbox = Outbox::new();
        dir.table_mut()
            .upsert(NodeId::host(20), Position::ORIGIN, 0.0, false, 1, secs(0));

        greet(&mut dir, 1, &mut outbox);
        assert_eq!(dir.bound_anchor().map(|a| a.id), Some(NodeId::host(1)));

        let sent = outbox.take_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].message,
            Message::DirectoryUpdate(DirectoryUpdate {
                node: NodeId::host(10),
                position: WirePoint::new(50, 0),
                speed: 5,
            })
        );

        // Same anchor again: no rebind, still one update
        greet(&mut dir, 1, &mut outbox);
        assert_eq!(outbox.take_messages().len(), 1);

        greet(&mut dir, 2, &mut outbox);
        assert_eq!(dir.bound_anchor().map(|a| a.id), Some(NodeId::host(2)));
        assert_eq!(outbox.take_messages()[0].destination, NodeId::host(2));
        // Learned positions survive a change of anchor
        assert!(dir.table().contains(NodeId::host(20)));
        assert!(!dir.table().contains(NodeId::host(10)));
    }

    #[test]
    fn test_reply_resolves_search() {
        let mut dir = make_mobile();
        let mut outbox = Outbox::new();
        greet(&mut dir, 1, &mut outbox);

        let target = NodeId::host(20);
        let oracle = MapOracle::new().with(target, Position::new(28.0, 24.0));
        let mut ctx = DirectoryContext::new(secs(1), Position::ORIGIN, &mut outbox)
            .with_oracle(Some(&oracle));
        dir.resolve(target, &mut ctx);

        dir.handle_message(
            NodeId::host(1),
            Message::DirectoryReply(DirectoryReply {
                requester: NodeId::host(10),
                target,
                position: WirePoint::new(25, 20),
            }),
            &mut ctx,
        )
        .unwrap();

        assert!(!dir.table().is_searching(target));
        assert!(dir.has_position(target, secs(2)));
        assert_eq!(dir.resolve(target, &mut ctx), Position::new(25.0, 20.0));

        let resolved = outbox
            .events()
            .iter()
            .find_map(|e| match e {
                RoutingEvent::LocationResolved { error, .. } => Some(*error),
                _ => None,
            })
            .unwrap();
        assert_eq!(resolved, Some(5.0));
    }

    #[test]
    fn test_unexpected_reply_accepted() {
        let mut dir = make_mobile();
        let mut outbox = Outbox::new();
        let mut ctx = DirectoryContext::new(secs(0), Position::ORIGIN, &mut outbox);
        let target = NodeId::host(30);

        dir.handle_message(
            NodeId::host(1),
            Message::DirectoryReply(DirectoryReply {
                requester: NodeId::host(10),
                target,
                position: WirePoint::new(7, 7),
            }),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(dir.table().get_position(target, secs(0)), Position::new(7.0, 7.0));
    }

    #[test]
    fn test_stale_entry_requeried() {
        let mut dir = make_mobile();
        let mut outbox = Outbox::new();
        greet(&mut dir, 1, &mut outbox);
        outbox.take_messages();

        let target = NodeId::host(20);
        dir.table_mut()
            .upsert(target, Position::new(1.0, 1.0), 0.0, false, 0, secs(0));

        let mut ctx = DirectoryContext::new(secs(5), Position::ORIGIN, &mut outbox);
        assert_eq!(dir.resolve(target, &mut ctx), Position::new(1.0, 1.0));
        assert!(outbox.messages().is_empty());

        let mut ctx = DirectoryContext::new(secs(6), Position::ORIGIN, &mut outbox);
        assert_eq!(dir.resolve(target, &mut ctx), Position::INVALID);
        assert_eq!(outbox.messages().len(), 1);
    }
}
