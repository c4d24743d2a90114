//! The nested-write state machine.
//!
//! Walks a resolved write-node tree and drives each node through
//! `Pending → AttributesApplied → { Saved | Failed }` (or `Destroyed` for
//! destroy actions):
//!
//! 1. Relationships whose child owns the referenced id (belongs_to,
//!    polymorphic belongs_to) persist depth-first *before* the owner, and the
//!    resulting ids are folded into the owner's raw foreign-key attributes.
//!    Sibling failures are collected, not short-circuited, so every nested
//!    error surfaces in one pass.
//! 2. The owner's attributes are validated and coerced as a whole, bracketed
//!    by the attribute hooks.
//! 3. The save is delegated to the adapter, bracketed by the save hooks.
//!    Adapter-reported validation failures mark the node `Failed` and attach
//!    messages to its record; they never raise.
//! 4. Relationships whose child stores the owner's id (has_one, has_many,
//!    many_to_many) persist after a successful save, each child receiving the
//!    owner's id; many_to_many additionally writes a join record once both
//!    sides exist.
//!
//! Nodes already committed when a later sibling fails stay committed; the
//! aggregate result is the AND over every node.

use std::collections::HashMap;

use sidepost_core::{
    Action, Adapter, AdapterResponse, Error, LinkInfo, RawAttributes, Record, RelationshipInfo,
    RelationshipKind, ResourceDef, ResourceRegistry, Result, TypeRegistry, Value,
    coerce_attributes,
};

use crate::payload::{NodeRelationship, WriteNode};

/// Lifecycle state of one node in the persisted graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not yet processed (an ancestor failed before this node's turn).
    Pending,
    /// Attributes were validated and assigned; the save has not happened.
    AttributesApplied,
    /// The adapter accepted the write.
    Saved,
    /// The adapter rejected the write, or a dependency of this node failed.
    Failed,
    /// The record was deleted.
    Destroyed,
}

/// One node of the result graph attached to the proxy after a run.
#[derive(Debug, Clone)]
pub struct PersistedNode {
    /// Relationship this node was reached through (`None` for the root).
    pub relationship: Option<String>,
    /// Resource registry name.
    pub resource_type: String,
    /// Action the node was processed under.
    pub action: Action,
    /// Terminal (or pending) state.
    pub state: NodeState,
    /// The record, populated as far as processing got; failed saves carry
    /// their validation messages here.
    pub record: Record,
    /// Child nodes in processing order.
    pub children: Vec<PersistedNode>,
}

impl PersistedNode {
    /// True when this node reached `Saved` or `Destroyed`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.state, NodeState::Saved | NodeState::Destroyed)
    }

    /// True when this node and every descendant succeeded.
    #[must_use]
    pub fn subtree_succeeded(&self) -> bool {
        self.succeeded() && self.children.iter().all(PersistedNode::subtree_succeeded)
    }

    /// Children reached through the given relationship.
    pub fn children_for<'a>(
        &'a self,
        relationship: &'a str,
    ) -> impl Iterator<Item = &'a PersistedNode> + 'a {
        self.children
            .iter()
            .filter(move |c| c.relationship.as_deref() == Some(relationship))
    }

    /// Every validation message in this subtree, depth-first.
    #[must_use]
    pub fn all_error_messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = self.record.errors().to_vec();
        for child in &self.children {
            messages.extend(child.all_error_messages());
        }
        messages
    }
}

/// Walks one write tree against one adapter.
pub(crate) struct Orchestrator<'o, A: Adapter> {
    resources: &'o ResourceRegistry,
    types: &'o TypeRegistry,
    adapter: &'o mut A,
    /// Records already persisted under a temp-id this run; later references to
    /// the same temp-id reuse the record instead of persisting twice.
    temp_ids: HashMap<String, Record>,
}

impl<'o, A: Adapter> Orchestrator<'o, A> {
    pub(crate) fn new(
        resources: &'o ResourceRegistry,
        types: &'o TypeRegistry,
        adapter: &'o mut A,
    ) -> Self {
        Self {
            resources,
            types,
            adapter,
            temp_ids: HashMap::new(),
        }
    }

    /// Persist one node (and, recursively, its children).
    ///
    /// `inherited` carries foreign-key attributes folded in by the parent
    /// (e.g. the owner's id for a has_many child).
    pub(crate) fn persist(
        &mut self,
        node: &WriteNode,
        relationship: Option<&str>,
        inherited: &[(String, Value)],
    ) -> Result<PersistedNode> {
        if let Some(temp_id) = &node.temp_id {
            if let Some(existing) = self.temp_ids.get(temp_id) {
                tracing::debug!(temp_id = %temp_id, "Reusing record persisted earlier in this run");
                return Ok(PersistedNode {
                    relationship: relationship.map(str::to_string),
                    resource_type: node.resource_type.clone(),
                    action: node.action,
                    state: NodeState::Saved,
                    record: existing.clone(),
                    children: Vec::new(),
                });
            }
        }

        tracing::debug!(
            resource = %node.resource_type,
            action = %node.action,
            "Persisting node"
        );

        match node.action {
            Action::Destroy => self.destroy_node(node, relationship),
            Action::Create | Action::Update => self.write_node(node, relationship, inherited),
        }
    }

    fn write_node(
        &mut self,
        node: &WriteNode,
        relationship: Option<&str>,
        inherited: &[(String, Value)],
    ) -> Result<PersistedNode> {
        let def = self
            .resources
            .expect(&node.resource_type)
            .map_err(Error::Config)?
            .clone();
        let action = node.action;

        // Relationship names must resolve before any storage work happens.
        let mut rels: Vec<(RelationshipInfo, &NodeRelationship)> =
            Vec::with_capacity(node.relationships.len());
        for nr in &node.relationships {
            let info = def.relationship(&nr.name).copied().ok_or_else(|| {
                Error::Payload(format!(
                    "unknown relationship `{}` on resource `{}`",
                    nr.name,
                    def.name()
                ))
            })?;
            rels.push((info, nr));
        }

        let mut raw = node.attributes.clone();
        for (name, value) in inherited {
            raw.insert(name.clone(), value.to_json());
        }

        let mut children = Vec::new();
        let mut dependency_failed = false;

        // Step: persist id-owning targets first so their ids can be folded in.
        for (info, nr) in &rels {
            if !info.kind.child_persists_first() {
                continue;
            }
            for child in &nr.nodes {
                let result = self.persist(child, Some(nr.name.as_str()), &[])?;
                match result.state {
                    NodeState::Saved => {
                        let child_id = self.persisted_id(&result)?;
                        if let Some(local_key) = info.local_key {
                            raw.insert(local_key.to_string(), child_id.to_json());
                        }
                        if let Some(type_key) = info.type_key {
                            raw.insert(
                                type_key.to_string(),
                                Value::Text(result.resource_type.clone()).to_json(),
                            );
                        }
                    }
                    NodeState::Destroyed => {
                        if let Some(local_key) = info.local_key {
                            raw.insert(local_key.to_string(), serde_json::Value::Null);
                        }
                        if let Some(type_key) = info.type_key {
                            raw.insert(type_key.to_string(), serde_json::Value::Null);
                        }
                    }
                    _ => dependency_failed = true,
                }
                children.push(result);
            }
        }

        let base = match action {
            Action::Update => {
                let id = node.id.clone().ok_or_else(|| {
                    Error::Payload(format!("update on `{}` requires an id", def.name()))
                })?;
                self.adapter.find(def.name(), &id)?.ok_or_else(|| {
                    Error::Adapter(format!(
                        "record `{:?}` not found on `{}` for update",
                        id,
                        def.name()
                    ))
                })?
            }
            _ => Record::new(def.name()),
        };

        let record = self.apply_attributes(&def, action, base, raw)?;
        let mut state = NodeState::AttributesApplied;

        let record = if dependency_failed {
            state = NodeState::Failed;
            record
        } else {
            let saved = self.save_with_hooks(&def, action, node.id.as_ref(), record)?;
            state = if saved.is_valid() {
                NodeState::Saved
            } else {
                NodeState::Failed
            };
            saved
        };

        if state == NodeState::Saved {
            if let Some(temp_id) = &node.temp_id {
                self.temp_ids.insert(temp_id.clone(), record.clone());
            }

            let owner_id = record.get(def.id_attribute()).cloned().ok_or_else(|| {
                Error::Adapter(format!(
                    "adapter returned no `{}` for persisted `{}`",
                    def.id_attribute(),
                    def.name()
                ))
            })?;

            // Step: children that store the owner's id persist after it.
            for (info, nr) in &rels {
                if info.kind.child_persists_first() {
                    continue;
                }
                for child in &nr.nodes {
                    let inherited_fk: Vec<(String, Value)> = match info.remote_key {
                        Some(remote_key) if child.action.is_write() => {
                            vec![(remote_key.to_string(), owner_id.clone())]
                        }
                        _ => Vec::new(),
                    };
                    let mut result = self.persist(child, Some(nr.name.as_str()), &inherited_fk)?;

                    if info.kind == RelationshipKind::ManyToMany
                        && result.state == NodeState::Saved
                    {
                        if let Some(link) = info.link {
                            let child_id = self.persisted_id(&result)?;
                            self.link_records(link, &owner_id, &child_id, &mut result)?;
                        }
                    }
                    children.push(result);
                }
            }
        } else {
            // Children that never got their turn stay pending, but remain
            // visible in the result graph.
            for (info, nr) in &rels {
                if info.kind.child_persists_first() {
                    continue;
                }
                for child in &nr.nodes {
                    children.push(PersistedNode {
                        relationship: Some(nr.name.clone()),
                        resource_type: child.resource_type.clone(),
                        action: child.action,
                        state: NodeState::Pending,
                        record: Record::new(child.resource_type.clone()),
                        children: Vec::new(),
                    });
                }
            }
            if state == NodeState::Failed && !record.is_valid() {
                tracing::debug!(
                    resource = %def.name(),
                    errors = record.errors().len(),
                    "Node failed validation"
                );
            }
        }

        Ok(PersistedNode {
            relationship: relationship.map(str::to_string),
            resource_type: node.resource_type.clone(),
            action,
            state,
            record,
            children,
        })
    }

    fn destroy_node(
        &mut self,
        node: &WriteNode,
        relationship: Option<&str>,
    ) -> Result<PersistedNode> {
        let def = self
            .resources
            .expect(&node.resource_type)
            .map_err(Error::Config)?
            .clone();
        let id = node.id.clone().ok_or_else(|| {
            Error::Payload(format!("destroy on `{}` requires an id", def.name()))
        })?;

        let mut record = self.adapter.find(def.name(), &id)?.ok_or_else(|| {
            Error::Adapter(format!(
                "record `{:?}` not found on `{}` for destroy",
                id,
                def.name()
            ))
        })?;

        def.hooks().run_before_destroy(&mut record)?;

        let resource = def.name();
        let adapter = &mut *self.adapter;
        let mut op = |mut rec: Record| -> Result<Record> {
            match adapter.destroy(resource, &id)? {
                AdapterResponse::Persisted(_) => Ok(rec),
                AdapterResponse::Invalid(errors) => {
                    rec.merge_validation_errors(&errors);
                    Ok(rec)
                }
            }
        };

        let mut record = match def.hooks().around_destroy() {
            Some(hook) => hook.call(record, &mut op)?,
            None => op(record)?,
        };

        let state = if record.is_valid() {
            def.hooks().run_after_destroy(&mut record)?;
            NodeState::Destroyed
        } else {
            NodeState::Failed
        };

        Ok(PersistedNode {
            relationship: relationship.map(str::to_string),
            resource_type: node.resource_type.clone(),
            action: Action::Destroy,
            state,
            record,
            children: Vec::new(),
        })
    }

    /// Attribute pipeline: before hooks on the raw map, then whole-hash
    /// validation + coercion + assignment (wrapped by around_attributes), then
    /// after hooks on the record.
    fn apply_attributes(
        &self,
        def: &ResourceDef,
        action: Action,
        record: Record,
        mut raw: RawAttributes,
    ) -> Result<Record> {
        def.hooks().run_before_attributes(action, &mut raw)?;

        let types = self.types;
        let resource = def.name();
        let table = def.attributes();
        let mut slot = Some(record);
        let mut assign = move |raw: RawAttributes| -> Result<Record> {
            let mut record = slot.take().ok_or_else(|| Error::Hook {
                hook: "around_attributes".to_string(),
                message: "continuation invoked more than once".to_string(),
            })?;
            let coerced = coerce_attributes(resource, table, types, action, &raw)?;
            for (name, value) in coerced {
                record.set(name, value);
            }
            Ok(record)
        };

        let mut record = match def.hooks().around_attributes(action) {
            Some(hook) => hook.call(raw, &mut assign)?,
            None => assign(raw)?,
        };

        def.hooks().run_after_attributes(action, &mut record)?;
        Ok(record)
    }

    /// Save pipeline: before hooks, adapter delegation (wrapped by
    /// around_save), after hooks on success only.
    fn save_with_hooks(
        &mut self,
        def: &ResourceDef,
        action: Action,
        payload_id: Option<&Value>,
        mut record: Record,
    ) -> Result<Record> {
        def.hooks().run_before_save(action, &mut record)?;

        let resource = def.name();
        let id_attr = def.id_attribute();
        let is_create = action == Action::Create;
        let fallback_id = payload_id.cloned();
        let adapter = &mut *self.adapter;
        let mut op = |mut rec: Record| -> Result<Record> {
            let response = if is_create {
                adapter.create(resource, rec.attributes())?
            } else {
                let id = rec
                    .get(id_attr)
                    .cloned()
                    .or_else(|| fallback_id.clone())
                    .ok_or_else(|| {
                        Error::Payload(format!("update on `{resource}` requires an id"))
                    })?;
                adapter.update(resource, &id, rec.attributes())?
            };
            match response {
                AdapterResponse::Persisted(saved) => Ok(saved),
                AdapterResponse::Invalid(errors) => {
                    rec.merge_validation_errors(&errors);
                    Ok(rec)
                }
            }
        };

        let mut record = match def.hooks().around_save(action) {
            Some(hook) => {
                tracing::debug!(
                    hook = hook.name().unwrap_or_default(),
                    resource = %resource,
                    "Dispatching around_save"
                );
                hook.call(record, &mut op)?
            }
            None => op(record)?,
        };

        if record.is_valid() {
            def.hooks().run_after_save(action, &mut record)?;
        }
        Ok(record)
    }

    /// The id of a node's persisted record.
    fn persisted_id(&self, node: &PersistedNode) -> Result<Value> {
        let def = self
            .resources
            .expect(&node.resource_type)
            .map_err(Error::Config)?;
        node.record.get(def.id_attribute()).cloned().ok_or_else(|| {
            Error::Adapter(format!(
                "adapter returned no `{}` for persisted `{}`",
                def.id_attribute(),
                node.resource_type
            ))
        })
    }

    /// Write the join record tying a many_to_many pair together.
    fn link_records(
        &mut self,
        link: LinkInfo,
        owner_id: &Value,
        child_id: &Value,
        child: &mut PersistedNode,
    ) -> Result<()> {
        let mut attrs = std::collections::BTreeMap::new();
        attrs.insert(link.local_key.to_string(), owner_id.clone());
        attrs.insert(link.remote_key.to_string(), child_id.clone());
        match self.adapter.create(link.resource, &attrs)? {
            AdapterResponse::Persisted(_) => Ok(()),
            AdapterResponse::Invalid(errors) => {
                child.record.merge_validation_errors(&errors);
                child.state = NodeState::Failed;
                Ok(())
            }
        }
    }
}
