//! Core types and traits for Sidepost.
//!
//! `sidepost-core` is the **foundation layer** for the entire ecosystem. It defines
//! the vocabulary every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: [`Adapter`] is the seam between the persistence pipeline
//!   and whatever actually stores records (SQL, HTTP, memory, ...).
//! - **Data model**: [`Value`] and [`Record`] represent attribute values and the
//!   dynamic model instances flowing through a write.
//! - **Configuration**: [`ResourceDef`] (built via [`ResourceBuilder`]) bundles an
//!   attribute table, a relationship graph, and a lifecycle hook set into one
//!   immutable, shareable definition.
//! - **Typecasting**: [`TypeRegistry`] maps type tags to write/read/params
//!   coercions applied to every incoming attribute.
//!
//! # Who Uses This Crate
//!
//! - `sidepost-graph` consumes resource definitions and the adapter contract to
//!   orchestrate nested writes.
//! - Adapter crates (`sidepost-memory`, external backends) implement [`Adapter`]
//!   and operate on [`Record`]/[`Value`].
//!
//! Most applications should use the `sidepost` facade; reach for `sidepost-core`
//! directly when writing adapters or advanced integrations.

pub mod action;
pub mod adapter;
pub mod attributes;
pub mod error;
pub mod hooks;
pub mod record;
pub mod relationships;
pub mod resource;
pub mod types;
pub mod value;

pub use action::Action;
pub use adapter::{Adapter, AdapterResponse};
pub use attributes::{AttributeInfo, AttributeTable, coerce_attributes};
pub use error::{ConfigError, Error, FieldValidationError, Result, ValidationErrors};
pub use hooks::{
    AroundAttributesHook, AroundDestroyHook, AroundSaveHook, HookPoint, HookScope, HookSet,
};
pub use record::Record;
pub use relationships::{LinkInfo, RelationshipInfo, RelationshipKind};
pub use resource::{ResourceBuilder, ResourceDef, ResourceRegistry};
pub use types::{TypeEntry, TypeRegistry};
pub use value::{RawAttributes, Value};
