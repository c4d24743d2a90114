//! Attribute declarations and the per-resource attribute table.
//!
//! Every attribute a payload may write must be declared here first: the table
//! is consulted before any value reaches a record, so unknown or non-writable
//! attributes fail before any model mutation occurs.

use crate::action::Action;
use crate::error::{Error, Result};
use crate::types::TypeRegistry;
use crate::value::{RawAttributes, Value};

/// Declaration of a single attribute on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    /// Attribute name as it appears in payloads.
    pub name: &'static str,
    /// Type tag resolved through the [`TypeRegistry`](crate::types::TypeRegistry).
    pub type_tag: &'static str,
    /// Whether the attribute accepts writes at all.
    pub writable: bool,
    /// When set, writes are permitted only under these actions.
    pub only: Option<&'static [Action]>,
    /// When set, writes are rejected under these actions.
    pub except: Option<&'static [Action]>,
}

impl AttributeInfo {
    /// Declare a writable attribute with no action scoping.
    #[must_use]
    pub const fn new(name: &'static str, type_tag: &'static str) -> Self {
        Self {
            name,
            type_tag,
            writable: true,
            only: None,
            except: None,
        }
    }

    /// Enable/disable writes entirely.
    #[must_use]
    pub const fn writable(mut self, value: bool) -> Self {
        self.writable = value;
        self
    }

    /// Restrict writes to the given actions.
    #[must_use]
    pub const fn only(mut self, actions: &'static [Action]) -> Self {
        self.only = Some(actions);
        self
    }

    /// Forbid writes under the given actions.
    #[must_use]
    pub const fn except(mut self, actions: &'static [Action]) -> Self {
        self.except = Some(actions);
        self
    }

    /// Whether a write under `action` is permitted by this declaration.
    #[must_use]
    pub fn writable_for(&self, action: Action) -> bool {
        if !self.writable {
            return false;
        }
        if let Some(only) = self.only {
            if !only.contains(&action) {
                return false;
            }
        }
        if let Some(except) = self.except {
            if except.contains(&action) {
                return false;
            }
        }
        true
    }
}

/// Ordered set of attribute declarations for one resource.
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    attributes: Vec<AttributeInfo>,
}

impl AttributeTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. A redeclared name replaces the earlier entry.
    pub fn insert(&mut self, info: AttributeInfo) {
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.name == info.name) {
            *existing = info;
        } else {
            self.attributes.push(info);
        }
    }

    /// Look up a declaration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes.iter().map(|a| a.name)
    }

    /// Number of declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// True when nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Resolve `name` for a write under `action`, or fail with the specific
    /// violation (unknown vs. not writable). `resource` is only for messages.
    pub fn check_writable(
        &self,
        resource: &str,
        name: &str,
        action: Action,
    ) -> Result<&AttributeInfo> {
        let info = self.get(name).ok_or_else(|| Error::UnknownAttribute {
            resource: resource.to_string(),
            attribute: name.to_string(),
        })?;
        if !info.writable_for(action) {
            return Err(Error::UnwritableAttribute {
                resource: resource.to_string(),
                attribute: name.to_string(),
                action,
            });
        }
        Ok(info)
    }
}

/// Validate and coerce a whole raw attribute map for a write under `action`.
///
/// Either every key resolves and every value coerces, or the first failure is
/// returned and nothing is considered applied. Callers only assign to a record
/// after this returns `Ok`, so a record is never partially mutated.
pub fn coerce_attributes(
    resource: &str,
    table: &AttributeTable,
    types: &TypeRegistry,
    action: Action,
    raw: &RawAttributes,
) -> Result<Vec<(String, Value)>> {
    let mut coerced = Vec::with_capacity(raw.len());
    for (name, raw_value) in raw {
        let info = table.check_writable(resource, name, action)?;
        let value = types.coerce_write(info.type_tag, name, raw_value)?;
        coerced.push((name.clone(), value));
    }
    Ok(coerced)
}
