//! The storage adapter contract.
//!
//! The pipeline never talks to storage directly: every create/update/destroy/
//! find is delegated through [`Adapter`]. Implementations translate between
//! [`Record`]s and whatever the backend speaks (SQL rows, HTTP resources, an
//! in-memory map, ...).
//!
//! Calls are synchronous. Domain validation failures are **not** errors: they
//! come back as [`AdapterResponse::Invalid`] and the orchestrator records them
//! on the affected record. `Err` is reserved for hard faults (connection lost,
//! missing row on update, ...), which abort the whole persistence call.

use std::collections::BTreeMap;

use crate::error::{Result, ValidationErrors};
use crate::record::Record;
use crate::value::Value;

/// Outcome of a create/update/destroy delegation.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterResponse {
    /// The write went through; the returned record is the authoritative
    /// post-write state (including any generated identity).
    Persisted(Record),
    /// The backend rejected the write on domain grounds.
    Invalid(ValidationErrors),
}

impl AdapterResponse {
    /// True for [`AdapterResponse::Persisted`].
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        matches!(self, AdapterResponse::Persisted(_))
    }
}

/// Storage collaborator implemented per backend.
pub trait Adapter {
    /// Insert a new record and return its persisted state.
    fn create(&mut self, resource: &str, attributes: &BTreeMap<String, Value>)
    -> Result<AdapterResponse>;

    /// Apply `attributes` to the record identified by `id`.
    fn update(
        &mut self,
        resource: &str,
        id: &Value,
        attributes: &BTreeMap<String, Value>,
    ) -> Result<AdapterResponse>;

    /// Delete the record identified by `id`, returning its last state.
    fn destroy(&mut self, resource: &str, id: &Value) -> Result<AdapterResponse>;

    /// Fetch a record by id, or `None` when absent.
    fn find(&mut self, resource: &str, id: &Value) -> Result<Option<Record>>;
}
