//! In-memory reference adapter for Sidepost.
//!
//! [`MemoryAdapter`] implements the [`Adapter`] contract over plain maps:
//! auto-incrementing integer ids per resource, cloned-on-write storage (so
//! mutating a returned record never changes the stored row), and declarative
//! required-attribute rules for exercising validation failures.
//!
//! It backs the integration tests and works as a scratch backend for examples;
//! production deployments implement [`Adapter`] against their real storage.
//!
//! # Example
//!
//! ```
//! use sidepost_memory::MemoryAdapter;
//!
//! let mut adapter = MemoryAdapter::new();
//! adapter.require_attribute("positions", "title", "can't be blank");
//! assert_eq!(adapter.count("positions"), 0);
//! ```

use std::collections::{BTreeMap, HashMap};

use sidepost_core::{Adapter, AdapterResponse, Error, Record, Result, ValidationErrors, Value};

/// A required-attribute rule: the attribute must be present and non-null.
#[derive(Debug, Clone)]
struct RequiredRule {
    attribute: String,
    message: String,
}

/// Map-backed [`Adapter`] with per-resource auto-increment ids.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    tables: HashMap<String, BTreeMap<i64, BTreeMap<String, Value>>>,
    next_ids: HashMap<String, i64>,
    required: HashMap<String, Vec<RequiredRule>>,
}

impl MemoryAdapter {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `attribute` must be present and non-null when writing
    /// `resource`; violations come back as [`AdapterResponse::Invalid`].
    pub fn require_attribute(
        &mut self,
        resource: impl Into<String>,
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.required
            .entry(resource.into())
            .or_default()
            .push(RequiredRule {
                attribute: attribute.into(),
                message: message.into(),
            });
    }

    /// Number of rows stored for `resource`.
    #[must_use]
    pub fn count(&self, resource: &str) -> usize {
        self.tables.get(resource).map_or(0, BTreeMap::len)
    }

    /// All rows for `resource` as records, in id order.
    #[must_use]
    pub fn all(&self, resource: &str) -> Vec<Record> {
        let Some(table) = self.tables.get(resource) else {
            return Vec::new();
        };
        table
            .values()
            .map(|row| record_from_row(resource, row))
            .collect()
    }

    fn validate(&self, resource: &str, row: &BTreeMap<String, Value>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Some(rules) = self.required.get(resource) {
            for rule in rules {
                let missing = match row.get(&rule.attribute) {
                    None => true,
                    Some(value) => value.is_null(),
                };
                if missing {
                    errors.add(rule.attribute.clone(), rule.message.clone());
                }
            }
        }
        errors
    }

    fn numeric_id(id: &Value) -> Result<i64> {
        match id {
            Value::Int(i) => Ok(*i),
            Value::Text(s) => s
                .parse::<i64>()
                .map_err(|e| Error::Adapter(format!("non-numeric id `{s}`: {e}"))),
            other => Err(Error::Adapter(format!(
                "unsupported id value {other:?} for memory adapter"
            ))),
        }
    }
}

fn record_from_row(resource: &str, row: &BTreeMap<String, Value>) -> Record {
    let mut record = Record::new(resource);
    for (name, value) in row {
        record.set(name.clone(), value.clone());
    }
    record
}

impl Adapter for MemoryAdapter {
    fn create(
        &mut self,
        resource: &str,
        attributes: &BTreeMap<String, Value>,
    ) -> Result<AdapterResponse> {
        let mut row = attributes.clone();
        let errors = self.validate(resource, &row);
        if !errors.is_empty() {
            tracing::debug!(resource = %resource, count = errors.len(), "Rejecting create");
            return Ok(AdapterResponse::Invalid(errors));
        }

        let next = self.next_ids.entry(resource.to_string()).or_insert(0);
        *next += 1;
        let id = *next;
        row.insert("id".to_string(), Value::Int(id));

        self.tables
            .entry(resource.to_string())
            .or_default()
            .insert(id, row.clone());

        tracing::debug!(resource = %resource, id, "Created row");
        Ok(AdapterResponse::Persisted(record_from_row(resource, &row)))
    }

    fn update(
        &mut self,
        resource: &str,
        id: &Value,
        attributes: &BTreeMap<String, Value>,
    ) -> Result<AdapterResponse> {
        let key = Self::numeric_id(id)?;
        let current = self
            .tables
            .get(resource)
            .and_then(|table| table.get(&key))
            .cloned()
            .ok_or_else(|| Error::Adapter(format!("no `{resource}` row with id {key}")))?;

        let mut merged = current;
        for (name, value) in attributes {
            merged.insert(name.clone(), value.clone());
        }
        merged.insert("id".to_string(), Value::Int(key));

        let errors = self.validate(resource, &merged);
        if !errors.is_empty() {
            tracing::debug!(resource = %resource, id = key, count = errors.len(), "Rejecting update");
            return Ok(AdapterResponse::Invalid(errors));
        }

        if let Some(table) = self.tables.get_mut(resource) {
            table.insert(key, merged.clone());
        }
        tracing::debug!(resource = %resource, id = key, "Updated row");
        Ok(AdapterResponse::Persisted(record_from_row(resource, &merged)))
    }

    fn destroy(&mut self, resource: &str, id: &Value) -> Result<AdapterResponse> {
        let key = Self::numeric_id(id)?;
        let row = self
            .tables
            .get_mut(resource)
            .and_then(|table| table.remove(&key))
            .ok_or_else(|| Error::Adapter(format!("no `{resource}` row with id {key}")))?;
        tracing::debug!(resource = %resource, id = key, "Destroyed row");
        Ok(AdapterResponse::Persisted(record_from_row(resource, &row)))
    }

    fn find(&mut self, resource: &str, id: &Value) -> Result<Option<Record>> {
        let key = Self::numeric_id(id)?;
        Ok(self
            .tables
            .get(resource)
            .and_then(|table| table.get(&key))
            .map(|row| record_from_row(resource, row)))
    }
}
