//! Persistence sessions and the nested-write orchestrator for Sidepost.
//!
//! A [`Proxy`] is the unit-of-work for one top-level write: it parses a
//! [`WriteDocument`] into a tree of write nodes (resolving temp-ids against the
//! document's `included` list), then walks that tree in dependency order,
//! running lifecycle hooks and delegating storage to an
//! [`Adapter`](sidepost_core::Adapter).
//!
//! # Design Philosophy
//!
//! - **Children owning a foreign key persist after their parent**; parents
//!   referenced by a foreign key persist before their owner. Ids always exist
//!   by the time something needs to store them.
//! - **Validation failures are data, not exceptions**: they attach to the
//!   failing record, fail the aggregate boolean, and leave the rest of the
//!   graph inspectable. Committed nodes are never rolled back.
//! - **Hook and payload mistakes are loud**: typecast errors, unknown
//!   attributes, and hook failures abort the call with `Err`.
//!
//! # Example
//!
//! ```ignore
//! let doc: WriteDocument = serde_json::from_value(body)?;
//! let mut proxy = Proxy::new(&resources, &types, &mut adapter, &doc)?;
//! let ok = proxy.save()?;
//! if !ok {
//!     for message in proxy.root().unwrap().all_error_messages() {
//!         eprintln!("{message}");
//!     }
//! }
//! ```

pub mod orchestrator;
pub mod payload;
pub mod proxy;

pub use orchestrator::{NodeState, PersistedNode};
pub use payload::{
    RelationshipValue, ResourceIdentifier, WriteDocument, WriteMethod, WriteResource,
};
pub use proxy::{Proxy, ProxyConfig};
