//! Node context injection
//!
//! A simulation runs many nodes on one thread. [`NodeContext`] names the
//! node currently handling an input so every event emitted meanwhile is
//! attributed to it, either through a `node` span or through the
//! thread-local [`NodeContextGuard`].

use std::cell::RefCell;

use meridian_core::{NodeId, Role};
use tracing::Span;

/// Identity of the node whose input is being handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeContext {
    pub id: NodeId,
    pub role: Role,
}

impl NodeContext {
    pub fn new(id: NodeId, role: Role) -> Self {
        Self { id, role }
    }

    /// A `node` span carrying the node id and role
    ///
    /// ```ignore
    /// let _entered = NodeContext::new(id, Role::Mobile).span().entered();
    /// router.on_receive(frame, from, port, &mut env);
    /// ```
    pub fn span(&self) -> Span {
        tracing::debug_span!("node", node = %self.id, role = %self.role)
    }
}

thread_local! {
    static NODE_CONTEXT: RefCell<Option<NodeContext>> = const { RefCell::new(None) };
}

/// RAII guard for the current node
///
/// Creating the guard sets the node for the current thread; dropping it
/// restores the previous one.
pub struct NodeContextGuard {
    previous: Option<NodeContext>,
}

impl NodeContextGuard {
    pub fn new(context: NodeContext) -> Self {
        let previous = NODE_CONTEXT.with(|ctx| ctx.borrow_mut().replace(context));
        Self { previous }
    }

    /// Get the current node context (if any)
    pub fn current() -> Option<NodeContext> {
        NODE_CONTEXT.with(|ctx| *ctx.borrow())
    }

    /// Get the current node id (if set)
    pub fn current_node() -> Option<NodeId> {
        Self::current().map(|ctx| ctx.id)
    }
}

impl Drop for NodeContextGuard {
    fn drop(&mut self) {
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a node context set
///
/// ```ignore
/// with_node_context!(NodeContext::new(id, Role::Anchor), {
///     tracing::info!("Anchor ready");
/// });
/// ```
#[macro_export]
macro_rules! with_node_context {
    ($context:expr, $body:block) => {{
        let _guard = $crate::context::NodeContextGuard::new($context);
        $body
    }};
}
