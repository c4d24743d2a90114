//! Sidepost: declarative persistence of nested resource graphs.
//!
//! Sidepost takes JSON:API-shaped write documents (a root resource plus a
//! tree of nested create/update/destroy fragments correlated by temp-ids) and
//! persists the whole graph in dependency order: targets referenced by a
//! foreign key before their owner, children storing the owner's id after it.
//! Along the way it coerces attributes against a declared type system, runs
//! before/after/around lifecycle hooks at each node, and aggregates
//! validation failures from any depth into one inspectable result graph.
//!
//! Storage itself stays behind the [`Adapter`] trait: Sidepost owns ordering,
//! hooks, and validation contracts, never schema or queries.
//!
//! # Quick start
//!
//! ```
//! use sidepost::prelude::*;
//! use serde_json::json;
//!
//! let mut resources = ResourceRegistry::new();
//! resources.insert(
//!     ResourceDef::builder("employees")
//!         .attribute(AttributeInfo::new("id", "integer"))
//!         .attribute(AttributeInfo::new("first_name", "string"))
//!         .build(),
//! );
//! let types = TypeRegistry::with_builtins();
//! let mut adapter = MemoryAdapter::new();
//!
//! let document = WriteDocument::from_json(json!({
//!     "data": {
//!         "type": "employees",
//!         "attributes": { "first_name": "Jane" }
//!     }
//! })).unwrap();
//!
//! let mut proxy = Proxy::new(&resources, &types, &mut adapter, &document).unwrap();
//! assert!(proxy.save().unwrap());
//! assert_eq!(adapter.count("employees"), 1);
//! ```
//!
//! The implementation is split across `sidepost-core` (vocabulary and
//! contracts) and `sidepost-graph` (sessions and the orchestrator); this crate
//! re-exports the public surface so applications depend on one name.

pub use sidepost_core::{
    Action, Adapter, AdapterResponse, AttributeInfo, AttributeTable, ConfigError, Error,
    FieldValidationError, HookPoint, HookScope, HookSet, LinkInfo, RawAttributes, Record,
    RelationshipInfo, RelationshipKind, ResourceBuilder, ResourceDef, ResourceRegistry, Result,
    TypeEntry, TypeRegistry, ValidationErrors, Value, coerce_attributes,
};
pub use sidepost_core::hooks::{AroundAttributesHook, AroundDestroyHook, AroundSaveHook};

pub use sidepost_graph::{
    NodeState, PersistedNode, Proxy, ProxyConfig, RelationshipValue, ResourceIdentifier,
    WriteDocument, WriteMethod, WriteResource,
};

#[cfg(feature = "memory")]
pub use sidepost_memory::MemoryAdapter;

/// Everything an application typically needs in one import.
pub mod prelude {
    pub use crate::{
        Action, Adapter, AdapterResponse, AroundAttributesHook, AroundDestroyHook, AroundSaveHook,
        AttributeInfo, ConfigError, Error, HookScope, LinkInfo, NodeState, PersistedNode, Proxy,
        ProxyConfig, Record, RelationshipInfo, ResourceDef, ResourceRegistry, Result, TypeEntry,
        TypeRegistry, ValidationErrors, Value, WriteDocument, WriteMethod,
    };

    #[cfg(feature = "memory")]
    pub use crate::MemoryAdapter;
}
