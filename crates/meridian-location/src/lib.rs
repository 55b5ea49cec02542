//! # Meridian Location
//!
//! Location table and location directory for Meridian.
//!
//! Forwarding needs the position of a destination it only knows by
//! address. Each node keeps a [`LocationTable`] of recent samples and
//! resolves misses through the location directory: mobile nodes register
//! with an anchor and send it their queries, anchors answer from their
//! tables and ask each other when they miss.
//!
//! ## Core Components
//!
//! - [`LocationTable`]: per-node cache with dead-reckoning prediction
//! - [`DirectoryProtocol`]: the directory operations the router uses
//! - [`MobileDirectory`]: binding, registration updates and queries
//! - [`AnchorDirectory`]: registration store, query answers and anchor search
//! - [`Outbox`]: messages and events produced by a handler
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_location::{directory_for, DirectoryConfig, DirectoryContext, Outbox};
//!
//! let mut directory = directory_for(&registry, DirectoryConfig::default());
//! let mut outbox = Outbox::new();
//! let mut ctx = DirectoryContext::new(now, my_position, &mut outbox);
//!
//! let position = directory.resolve(destination, &mut ctx);
//! if !position.is_valid() {
//!     // A query may have been queued in the outbox; buffer the packet
//! }
//! for outgoing in outbox.take_messages() {
//!     // route `outgoing.message` to `outgoing.destination`
//! }
//! ```

pub mod anchor;
pub mod directory;
pub mod error;
pub mod mobile;
pub mod table;

pub use anchor::AnchorDirectory;
pub use directory::{
    directory_for, DirectoryConfig, DirectoryContext, DirectoryProtocol, Outbox, Outgoing,
};
pub use error::{DirectoryError, DirectoryResult};
pub use mobile::MobileDirectory;
pub use table::{LocationEntry, LocationTable};
