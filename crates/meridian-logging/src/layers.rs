//! Custom tracing layers for Meridian
//!
//! This module provides the layer that records the active node on new
//! spans and the JSONL formatter used for file output.

use tracing::{Subscriber, span};
use tracing_subscriber::{
    fmt::format::{Format, Json, JsonFields},
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::config::JsonlConfig;
use crate::context::{NodeContext, NodeContextGuard};

/// Layer that attaches the active [`NodeContext`] to new spans
///
/// The context is stored as a span extension so later layers and
/// formatters can read which node opened the span.
pub struct NodeContextLayer;

impl NodeContextLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NodeContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone, Copy)]
pub struct NodeContextExtension {
    pub context: NodeContext,
}

impl<S> Layer<S> for NodeContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(context) = NodeContextGuard::current() {
                span.extensions_mut().insert(NodeContextExtension { context });
            }
        }
    }
}

/// Create a JSONL formatting layer
pub fn jsonl_layer<S, W>(
    writer: W,
    config: &JsonlConfig,
) -> tracing_subscriber::fmt::Layer<S, JsonFields, Format<Json>, W>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(config.span_list)
        .flatten_event(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_writer(writer)
}
