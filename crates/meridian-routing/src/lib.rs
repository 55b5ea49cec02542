//! # Meridian Routing
//!
//! Position-based forwarding for Meridian nodes.
//!
//! Each node forwards greedily toward the destination position and falls
//! back to perimeter traversal with the right-hand rule when it reaches a
//! local maximum. Destination positions come from the location directory;
//! packets wait in a bounded queue while a search is outstanding.
//!
//! ## Core Components
//!
//! - [`GeoRouter`]: per-node engine driven by frames, timers and sends
//! - [`NodeEnv`]: the scheduler, transport and kinematics of one call
//! - [`NeighborTable`]: one-hop neighbors with greedy and angular selection
//! - [`DeferredQueue`]: packets waiting for a destination position
//! - [`RouterConfig`]: timing, range and queue limits
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_routing::{GeoRouter, NodeEnv, RouterConfig};
//!
//! let mut router = GeoRouter::new(&registry, RouterConfig::default());
//! let mut env = NodeEnv::new(&mut scheduler, &mut transport, &mobility);
//! router.start(&mut env);
//!
//! // Frames from the link layer
//! router.on_receive(frame, link_source, FORWARDING_PORT, &mut env);
//!
//! // Application data
//! router.send(destination, DATA_PORT, payload, &mut env);
//!
//! for event in router.drain_events() {
//!     // Feed statistics
//! }
//! ```

pub mod config;
pub mod error;
pub mod neighbor;
pub mod queue;
pub mod router;

pub use config::RouterConfig;
pub use error::{ForwardError, RoutingError, RoutingResult};
pub use neighbor::{NeighborEntry, NeighborTable, PurgePolicy};
pub use queue::{DeferredQueue, QueuedPacket};
pub use router::{GeoRouter, NodeEnv};
