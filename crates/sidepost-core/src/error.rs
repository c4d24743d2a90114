//! Error taxonomy for the persistence pipeline.
//!
//! Two channels exist and never mix:
//!
//! - **Hard errors** ([`Error`], [`ConfigError`]) indicate programmer or payload
//!   mistakes: unknown attributes, failed typecasts, misregistered hooks,
//!   malformed documents. They surface as `Err` immediately.
//! - **Validation failures** ([`ValidationErrors`]) are adapter-reported domain
//!   outcomes. They never surface as `Err`; the orchestrator records them on the
//!   affected [`Record`](crate::record::Record) and folds them into the aggregate
//!   boolean result.

use serde::Serialize;
use thiserror::Error;

use crate::action::Action;
use crate::hooks::HookPoint;

/// Convenience alias used across all sidepost crates.
pub type Result<T> = std::result::Result<T, Error>;

/// A hard failure that aborts the enclosing persistence call.
#[derive(Error, Debug)]
pub enum Error {
    /// Payload named an attribute the resource does not declare.
    #[error("unknown attribute `{attribute}` on resource `{resource}`")]
    UnknownAttribute {
        /// Resource whose table was consulted.
        resource: String,
        /// Offending attribute name.
        attribute: String,
    },

    /// Payload wrote to an attribute that is not writable for this action.
    #[error("attribute `{attribute}` on resource `{resource}` is not writable on {action}")]
    UnwritableAttribute {
        /// Resource whose table was consulted.
        resource: String,
        /// Offending attribute name.
        attribute: String,
        /// Action the write was attempted under.
        action: Action,
    },

    /// A value could not be coerced to its declared type.
    #[error("typecast failed for attribute `{attribute}` with value `{value}`: {cause}")]
    Typecast {
        /// Attribute being coerced.
        attribute: String,
        /// Raw input, rendered for the message.
        value: String,
        /// Wrapped underlying parse/shape error.
        cause: String,
    },

    /// A lifecycle hook returned an error; propagated uncaught.
    #[error("hook `{hook}` failed: {message}")]
    Hook {
        /// Name or point of the failing hook.
        hook: String,
        /// Application-supplied failure message.
        message: String,
    },

    /// The parsed write document is malformed (dangling temp-id, missing id,
    /// unknown relationship, depth guard exceeded).
    #[error("invalid write payload: {0}")]
    Payload(String),

    /// The storage adapter failed outside of domain validation.
    #[error("adapter error: {0}")]
    Adapter(String),

    /// A registration-time configuration error reached the pipeline.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Build a [`Error::Typecast`] wrapping `cause`, rendering the raw input.
    pub fn typecast(
        attribute: impl Into<String>,
        value: &serde_json::Value,
        cause: impl std::fmt::Display,
    ) -> Self {
        Error::Typecast {
            attribute: attribute.into(),
            value: value.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Programmer errors caught while assembling resource definitions or registries.
///
/// These are returned at registration time, before any persistence attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An around hook was registered without a name. Around hooks must name a
    /// concrete implementation so the continuation has an explicit target; a
    /// bare closure cannot be given one after the fact.
    #[error(
        "around hook for {point} on resource `{resource}` was registered without a name; \
         register it with `named(...)` so the continuation has an explicit target"
    )]
    AnonymousAroundHook {
        /// Resource being configured.
        resource: String,
        /// Lifecycle point of the rejected hook.
        point: HookPoint,
    },

    /// A second around hook was registered for a point that already has one.
    #[error("around hook for {point} on resource `{resource}` is already registered as `{existing}`")]
    DuplicateAroundHook {
        /// Resource being configured.
        resource: String,
        /// Lifecycle point of the rejected hook.
        point: HookPoint,
        /// Name of the hook already in place.
        existing: String,
    },

    /// A type tag was referenced that the registry does not contain.
    #[error("unknown type tag `{0}`")]
    UnknownType(String),

    /// A resource name was referenced that the registry does not contain.
    #[error("unknown resource `{0}`")]
    UnknownResource(String),
}

/// One adapter-reported validation message, bound to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValidationError {
    /// Field (attribute) the message applies to.
    pub field: String,
    /// Human-readable message, e.g. `"can't be blank"`.
    pub message: String,
}

/// Ordered collection of adapter-reported validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldValidationError>,
}

impl ValidationErrors {
    /// An empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message for `field`, preserving insertion order.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// True when no messages were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate messages in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldValidationError> {
        self.errors.iter()
    }

    /// Render as `"field message"` strings, in insertion order.
    #[must_use]
    pub fn full_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{} {}", e.field, e.message))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typecast_message_names_attribute_and_value() {
        let err = Error::typecast("age", &serde_json::json!("abc"), "invalid digit");
        let msg = err.to_string();
        assert!(msg.contains("age"));
        assert!(msg.contains("abc"));
        assert!(msg.contains("invalid digit"));
    }

    #[test]
    fn test_unwritable_message_names_action() {
        let err = Error::UnwritableAttribute {
            resource: "posts".into(),
            attribute: "slug".into(),
            action: Action::Update,
        };
        assert!(err.to_string().contains("not writable on update"));
    }

    #[test]
    fn test_validation_errors_preserve_order() {
        let mut errs = ValidationErrors::new();
        errs.add("title", "can't be blank");
        errs.add("title", "is too short");
        errs.add("rank", "must be positive");
        assert_eq!(errs.len(), 3);
        assert_eq!(
            errs.full_messages(),
            vec![
                "title can't be blank",
                "title is too short",
                "rank must be positive"
            ]
        );
    }

    #[test]
    fn test_config_error_converts_into_error() {
        let err: Error = ConfigError::UnknownType("tristate".into()).into();
        assert!(err.to_string().contains("tristate"));
    }
}
