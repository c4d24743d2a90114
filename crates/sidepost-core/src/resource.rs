//! Resource definitions.
//!
//! A [`ResourceDef`] bundles everything the pipeline needs to know about one
//! resource: its attribute table, its relationship graph, and its lifecycle
//! hooks. Definitions are assembled through [`ResourceBuilder`] and immutable
//! once built, so they can be shared (`Arc`) across any number of concurrent
//! persistence sessions.
//!
//! # Example
//!
//! ```
//! use sidepost_core::attributes::AttributeInfo;
//! use sidepost_core::resource::ResourceDef;
//!
//! let employees = ResourceDef::builder("employees")
//!     .attribute(AttributeInfo::new("first_name", "string"))
//!     .attribute(AttributeInfo::new("age", "integer"))
//!     .build();
//!
//! assert_eq!(employees.name(), "employees");
//! assert!(employees.attributes().get("age").is_some());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::attributes::{AttributeInfo, AttributeTable};
use crate::error::ConfigError;
use crate::hooks::{
    AroundAttributesHook, AroundDestroyHook, AroundSaveHook, HookScope, HookSet, RawAttrsHookFn,
    RecordHookFn,
};
use crate::record::Record;
use crate::relationships::RelationshipInfo;
use crate::value::RawAttributes;

/// Immutable configuration for one resource.
#[derive(Debug)]
pub struct ResourceDef {
    name: &'static str,
    id_attribute: &'static str,
    attributes: AttributeTable,
    relationships: Vec<RelationshipInfo>,
    hooks: HookSet,
}

impl ResourceDef {
    /// Start building a definition for `name`.
    #[must_use]
    pub fn builder(name: &'static str) -> ResourceBuilder {
        ResourceBuilder {
            name,
            id_attribute: "id",
            attributes: AttributeTable::new(),
            relationships: Vec::new(),
            hooks: HookSet::new(),
        }
    }

    /// The registry name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The attribute holding a record's identity (default `"id"`).
    #[must_use]
    pub fn id_attribute(&self) -> &'static str {
        self.id_attribute
    }

    /// The attribute table.
    #[must_use]
    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    /// Declared relationships, in declaration order.
    #[must_use]
    pub fn relationships(&self) -> &[RelationshipInfo] {
        &self.relationships
    }

    /// Look up a relationship by payload name.
    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&RelationshipInfo> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// The lifecycle hooks.
    #[must_use]
    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }
}

/// Assembles an immutable [`ResourceDef`].
///
/// Infallible declarations chain by value; around-hook registrations return
/// `Result` because anonymous or duplicate around hooks are configuration
/// errors reported at the registration call itself.
#[derive(Debug)]
pub struct ResourceBuilder {
    name: &'static str,
    id_attribute: &'static str,
    attributes: AttributeTable,
    relationships: Vec<RelationshipInfo>,
    hooks: HookSet,
}

impl ResourceBuilder {
    /// Override the identity attribute (default `"id"`).
    #[must_use]
    pub fn id_attribute(mut self, name: &'static str) -> Self {
        self.id_attribute = name;
        self
    }

    /// Declare an attribute.
    #[must_use]
    pub fn attribute(mut self, info: AttributeInfo) -> Self {
        self.attributes.insert(info);
        self
    }

    /// Declare a relationship.
    #[must_use]
    pub fn relationship(mut self, info: RelationshipInfo) -> Self {
        self.relationships.push(info);
        self
    }

    /// Register a before_attributes hook.
    #[must_use]
    pub fn before_attributes<F>(mut self, scope: HookScope, f: F) -> Self
    where
        F: Fn(&mut RawAttributes) -> crate::error::Result<()> + Send + Sync + 'static,
    {
        let f: RawAttrsHookFn = Arc::new(f);
        self.hooks.add_before_attributes(scope, f);
        self
    }

    /// Register an after_attributes hook.
    #[must_use]
    pub fn after_attributes<F>(mut self, scope: HookScope, f: F) -> Self
    where
        F: Fn(&mut Record) -> crate::error::Result<()> + Send + Sync + 'static,
    {
        let f: RecordHookFn = Arc::new(f);
        self.hooks.add_after_attributes(scope, f);
        self
    }

    /// Register a before_save hook.
    #[must_use]
    pub fn before_save<F>(mut self, scope: HookScope, f: F) -> Self
    where
        F: Fn(&mut Record) -> crate::error::Result<()> + Send + Sync + 'static,
    {
        let f: RecordHookFn = Arc::new(f);
        self.hooks.add_before_save(scope, f);
        self
    }

    /// Register an after_save hook.
    #[must_use]
    pub fn after_save<F>(mut self, scope: HookScope, f: F) -> Self
    where
        F: Fn(&mut Record) -> crate::error::Result<()> + Send + Sync + 'static,
    {
        let f: RecordHookFn = Arc::new(f);
        self.hooks.add_after_save(scope, f);
        self
    }

    /// Register a before_destroy hook.
    #[must_use]
    pub fn before_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Record) -> crate::error::Result<()> + Send + Sync + 'static,
    {
        let f: RecordHookFn = Arc::new(f);
        self.hooks.add_before_destroy(f);
        self
    }

    /// Register an after_destroy hook.
    #[must_use]
    pub fn after_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Record) -> crate::error::Result<()> + Send + Sync + 'static,
    {
        let f: RecordHookFn = Arc::new(f);
        self.hooks.add_after_destroy(f);
        self
    }

    /// Register the around_attributes hook. Fails for anonymous or duplicate
    /// registrations.
    pub fn around_attributes(
        mut self,
        scope: HookScope,
        hook: AroundAttributesHook,
    ) -> Result<Self, ConfigError> {
        self.hooks.set_around_attributes(self.name, scope, hook)?;
        Ok(self)
    }

    /// Register the around_save hook. Fails for anonymous or duplicate
    /// registrations.
    pub fn around_save(
        mut self,
        scope: HookScope,
        hook: AroundSaveHook,
    ) -> Result<Self, ConfigError> {
        self.hooks.set_around_save(self.name, scope, hook)?;
        Ok(self)
    }

    /// Register the around_destroy hook. Fails for anonymous or duplicate
    /// registrations.
    pub fn around_destroy(mut self, hook: AroundDestroyHook) -> Result<Self, ConfigError> {
        self.hooks.set_around_destroy(self.name, hook)?;
        Ok(self)
    }

    /// Finish, producing a shareable immutable definition.
    #[must_use]
    pub fn build(self) -> Arc<ResourceDef> {
        Arc::new(ResourceDef {
            name: self.name,
            id_attribute: self.id_attribute,
            attributes: self.attributes,
            relationships: self.relationships,
            hooks: self.hooks,
        })
    }
}

/// Name → definition map used to resolve relationship targets.
///
/// Populate during setup, then share read-only.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: HashMap<&'static str, Arc<ResourceDef>>,
}

impl ResourceRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition under its own name.
    pub fn insert(&mut self, def: Arc<ResourceDef>) {
        self.resources.insert(def.name(), def);
    }

    /// Look up a definition.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ResourceDef>> {
        self.resources.get(name)
    }

    /// Look up a definition, failing with [`ConfigError::UnknownResource`].
    pub fn expect(&self, name: &str) -> Result<&Arc<ResourceDef>, ConfigError> {
        self.resources
            .get(name)
            .ok_or_else(|| ConfigError::UnknownResource(name.to_string()))
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
