//! Dynamic record instances.
//!
//! A [`Record`] is the model instance flowing through a persistence call:
//! an attribute map plus the resource name and, after a failed save, the
//! validation messages the adapter reported. The pipeline is oblivious to the
//! caller's real domain types; adapters translate at the boundary.

use std::collections::BTreeMap;

use crate::error::ValidationErrors;
use crate::value::Value;

/// A dynamically-typed model instance for one resource.
///
/// # Example
///
/// ```
/// use sidepost_core::record::Record;
/// use sidepost_core::value::Value;
///
/// let mut record = Record::new("employees");
/// record.set("name", Value::Text("Jane".to_string()));
///
/// assert_eq!(record.get("name").and_then(Value::as_str), Some("Jane"));
/// assert!(record.is_valid());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    resource: String,
    values: BTreeMap<String, Value>,
    errors: Vec<String>,
}

impl Record {
    /// Create an empty record for the given resource.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            values: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// The resource this record belongs to.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Set an attribute value.
    pub fn set(&mut self, attribute: impl Into<String>, value: Value) {
        self.values.insert(attribute.into(), value);
    }

    /// Get an attribute value.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    /// Remove an attribute value, returning it.
    pub fn remove(&mut self, attribute: &str) -> Option<Value> {
        self.values.remove(attribute)
    }

    /// Whether an attribute has a value set.
    #[must_use]
    pub fn has(&self, attribute: &str) -> bool {
        self.values.contains_key(attribute)
    }

    /// All attribute values, sorted by name.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// The identity value under the conventional `id` attribute.
    ///
    /// Resources with a different id attribute go through
    /// [`Record::get`] with the configured name instead.
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.values.get("id")
    }

    /// Validation messages recorded against this record. Empty unless the
    /// adapter rejected a save.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Append a validation message.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Fold adapter-reported validation failures into this record's messages.
    pub fn merge_validation_errors(&mut self, errors: &ValidationErrors) {
        self.errors.extend(errors.full_messages());
    }

    /// True when no validation messages are attached.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_basic() {
        let mut record = Record::new("positions");
        record.set("title", Value::Text("engineer".into()));
        assert_eq!(record.resource(), "positions");
        assert!(record.has("title"));
        assert!(!record.has("id"));
        assert_eq!(record.id(), None);
    }

    #[test]
    fn test_merge_validation_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "can't be blank");
        let mut record = Record::new("positions");
        record.merge_validation_errors(&errors);
        assert!(!record.is_valid());
        assert_eq!(record.errors(), ["title can't be blank"]);
    }

    #[test]
    fn test_remove_returns_value() {
        let mut record = Record::new("positions");
        record.set("rank", Value::Int(3));
        assert_eq!(record.remove("rank"), Some(Value::Int(3)));
        assert_eq!(record.remove("rank"), None);
    }
}
