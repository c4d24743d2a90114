//! The persistence session.
//!
//! A [`Proxy`] binds one parsed [`WriteDocument`] to a resource registry, a
//! type registry, and an adapter for the duration of a single top-level write.
//! Create one per request; it is not reused.
//!
//! The entry points ([`Proxy::save`], [`Proxy::update_attributes`],
//! [`Proxy::destroy`]) return the aggregate boolean outcome. Whatever happened,
//! the populated result graph stays on the proxy for inspection: a failed
//! nested create still exposes every record and its validation messages.

use sidepost_core::{Action, Adapter, Record, ResourceRegistry, Result, TypeRegistry};

use crate::orchestrator::{Orchestrator, PersistedNode};
use crate::payload::{self, WriteDocument, WriteNode};

/// Per-session knobs.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Emit the raw document at debug level while building the write tree.
    pub log_payloads: bool,
    /// Maximum relationship nesting before the document is rejected.
    pub max_depth: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            log_payloads: false,
            max_depth: 32,
        }
    }
}

/// One persistence session over one write document.
#[derive(Debug)]
pub struct Proxy<'a, A: Adapter> {
    resources: &'a ResourceRegistry,
    types: &'a TypeRegistry,
    adapter: &'a mut A,
    config: ProxyConfig,
    root_node: WriteNode,
    result: Option<PersistedNode>,
}

impl<'a, A: Adapter> Proxy<'a, A> {
    /// Build a session for `document` with default configuration.
    ///
    /// Fails fast on malformed documents (dangling temp-ids, unknown root
    /// resource, excessive depth) before any storage work.
    pub fn new(
        resources: &'a ResourceRegistry,
        types: &'a TypeRegistry,
        adapter: &'a mut A,
        document: &WriteDocument,
    ) -> Result<Self> {
        Self::with_config(resources, types, adapter, document, ProxyConfig::default())
    }

    /// Build a session with explicit configuration.
    pub fn with_config(
        resources: &'a ResourceRegistry,
        types: &'a TypeRegistry,
        adapter: &'a mut A,
        document: &WriteDocument,
        config: ProxyConfig,
    ) -> Result<Self> {
        if config.log_payloads {
            tracing::debug!(document = ?document, "Building write tree");
        }
        let root_node = payload::build_tree(document, config.max_depth)?;
        resources.expect(&root_node.resource_type)?;
        Ok(Self {
            resources,
            types,
            adapter,
            config,
            root_node,
            result: None,
        })
    }

    /// The action resolved for the root resource.
    #[must_use]
    pub fn action(&self) -> Action {
        self.root_node.action
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the write. Returns the aggregate outcome: `true` only if every
    /// node in the graph persisted (or destroyed) successfully.
    #[tracing::instrument(level = "debug", skip(self), fields(resource = %self.root_node.resource_type))]
    pub fn save(&mut self) -> Result<bool> {
        let result = {
            let mut orchestrator =
                Orchestrator::new(self.resources, self.types, &mut *self.adapter);
            orchestrator.persist(&self.root_node, None, &[])?
        };
        let succeeded = result.subtree_succeeded();

        tracing::info!(
            resource = %self.root_node.resource_type,
            action = %self.root_node.action,
            succeeded,
            "Persistence session finished"
        );

        self.result = Some(result);
        Ok(succeeded)
    }

    /// Alias for [`Proxy::save`] reading better at update call sites.
    pub fn update_attributes(&mut self) -> Result<bool> {
        self.save()
    }

    /// Force the root action to destroy, then run the write.
    pub fn destroy(&mut self) -> Result<bool> {
        self.root_node.action = Action::Destroy;
        self.save()
    }

    /// The result graph from the last run, if any.
    #[must_use]
    pub fn root(&self) -> Option<&PersistedNode> {
        self.result.as_ref()
    }

    /// The root record from the last run, if any.
    #[must_use]
    pub fn record(&self) -> Option<&Record> {
        self.result.as_ref().map(|node| &node.record)
    }

    /// Whether the last run succeeded in aggregate. `false` before any run.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result
            .as_ref()
            .is_some_and(PersistedNode::subtree_succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ProxyConfig::default();
        assert!(!config.log_payloads);
        assert_eq!(config.max_depth, 32);
    }
}
