//! The parsed write document and its resolution into a write-node tree.
//!
//! A [`WriteDocument`] is the already-parsed wire payload: one root resource,
//! relationship references (single or list), and an `included` list carrying
//! the attributes of nested fragments. References point into `included` either
//! by temp-id (new records) or by id (existing records).
//!
//! Resolution is a single top-down pass: `included` is indexed once into an
//! arena keyed by temp-id/id, then the tree is built by following references.
//! A temp-id must resolve to exactly one included fragment of the matching
//! type; anything else is a payload error.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use sidepost_core::{Action, Error, RawAttributes, Result, Value};

/// A complete write payload: the root resource plus included fragments.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriteDocument {
    /// The root resource being written.
    pub data: WriteResource,
    /// Fragments referenced from `data` (or from other fragments).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<WriteResource>,
}

impl WriteDocument {
    /// Parse from a JSON value, mapping parse failures to [`Error::Payload`].
    pub fn from_json(raw: JsonValue) -> Result<Self> {
        serde_json::from_value(raw).map_err(|e| Error::Payload(e.to_string()))
    }
}

/// One resource object in a write document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WriteResource {
    /// Resource registry name.
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Existing identity; its presence defaults the action to update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonValue>,

    /// Client-supplied correlation id for records created in this document.
    #[serde(default, rename = "temp-id", skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,

    /// Explicit action override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<WriteMethod>,

    /// Raw attribute values, coerced later against the resource's table.
    #[serde(default, skip_serializing_if = "RawAttributes::is_empty")]
    pub attributes: RawAttributes,

    /// Relationship name → reference(s).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, RelationshipValue>,
}

/// Explicit write method on a resource or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMethod {
    Create,
    Update,
    Destroy,
}

impl WriteMethod {
    /// The corresponding pipeline action.
    #[must_use]
    pub const fn as_action(self) -> Action {
        match self {
            WriteMethod::Create => Action::Create,
            WriteMethod::Update => Action::Update,
            WriteMethod::Destroy => Action::Destroy,
        }
    }
}

/// A relationship's value: one reference or a list of references.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RelationshipValue {
    /// Single reference (belongs_to, has_one, polymorphic belongs_to).
    One(ResourceIdentifier),
    /// Reference list (has_many, many_to_many).
    Many(Vec<ResourceIdentifier>),
}

impl RelationshipValue {
    /// The references, regardless of cardinality.
    #[must_use]
    pub fn identifiers(&self) -> &[ResourceIdentifier] {
        match self {
            RelationshipValue::One(one) => std::slice::from_ref(one),
            RelationshipValue::Many(many) => many,
        }
    }
}

/// A reference to a (possibly not yet existing) record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResourceIdentifier {
    /// Resource registry name.
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Existing identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonValue>,

    /// Correlation id matching an included fragment.
    #[serde(default, rename = "temp-id", skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,

    /// Explicit action override for this reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<WriteMethod>,
}

/// Convert a payload id (JSON number or string) into a typed [`Value`].
pub(crate) fn id_value(raw: &JsonValue) -> Option<Value> {
    match raw {
        JsonValue::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float)),
        JsonValue::String(s) => Some(Value::Text(s.clone())),
        _ => None,
    }
}

/// Canonical string key for matching reference ids against included ids.
fn id_key(raw: &JsonValue) -> Option<String> {
    match raw {
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::String(s) => Some(s.clone()),
        _ => None,
    }
}

// ============================================================================
// Write-node tree
// ============================================================================

/// One node of the resolved write tree.
#[derive(Debug, Clone)]
pub(crate) struct WriteNode {
    pub resource_type: String,
    pub action: Action,
    pub id: Option<Value>,
    pub temp_id: Option<String>,
    pub attributes: RawAttributes,
    pub relationships: Vec<NodeRelationship>,
}

/// A relationship's resolved child nodes, in payload order.
#[derive(Debug, Clone)]
pub(crate) struct NodeRelationship {
    pub name: String,
    pub nodes: Vec<WriteNode>,
}

/// Key into the included arena: temp-ids and ids live in separate namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ArenaKey {
    Temp(String, String),
    Id(String, String),
}

/// Resolve a document into a write-node tree.
///
/// `max_depth` bounds nesting; references that chain past it (including
/// accidental cycles through shared temp-ids) fail with [`Error::Payload`].
pub(crate) fn build_tree(doc: &WriteDocument, max_depth: usize) -> Result<WriteNode> {
    let mut arena: HashMap<ArenaKey, &WriteResource> = HashMap::new();
    for fragment in &doc.included {
        if let Some(temp_id) = &fragment.temp_id {
            let key = ArenaKey::Temp(fragment.resource_type.clone(), temp_id.clone());
            if arena.insert(key, fragment).is_some() {
                return Err(Error::Payload(format!(
                    "temp-id `{temp_id}` appears more than once for type `{}` in `included`",
                    fragment.resource_type
                )));
            }
        } else if let Some(id) = fragment.id.as_ref().and_then(id_key) {
            arena.insert(ArenaKey::Id(fragment.resource_type.clone(), id), fragment);
        }
    }

    node_from_resource(&doc.data, &arena, None, max_depth)
}

fn resolve_action(method: Option<WriteMethod>, has_id: bool) -> Action {
    match method {
        Some(method) => method.as_action(),
        None if has_id => Action::Update,
        None => Action::Create,
    }
}

fn node_from_resource(
    fragment: &WriteResource,
    arena: &HashMap<ArenaKey, &WriteResource>,
    method_override: Option<WriteMethod>,
    depth_budget: usize,
) -> Result<WriteNode> {
    if depth_budget == 0 {
        return Err(Error::Payload(
            "nested write exceeds the maximum relationship depth".to_string(),
        ));
    }

    let method = method_override.or(fragment.method);
    let action = resolve_action(method, fragment.id.is_some());

    let mut relationships = Vec::with_capacity(fragment.relationships.len());
    for (name, value) in &fragment.relationships {
        let mut nodes = Vec::with_capacity(value.identifiers().len());
        for identifier in value.identifiers() {
            nodes.push(node_from_identifier(identifier, arena, depth_budget - 1)?);
        }
        relationships.push(NodeRelationship {
            name: name.clone(),
            nodes,
        });
    }

    Ok(WriteNode {
        resource_type: fragment.resource_type.clone(),
        action,
        id: fragment.id.as_ref().and_then(id_value),
        temp_id: fragment.temp_id.clone(),
        attributes: fragment.attributes.clone(),
        relationships,
    })
}

fn node_from_identifier(
    identifier: &ResourceIdentifier,
    arena: &HashMap<ArenaKey, &WriteResource>,
    depth_budget: usize,
) -> Result<WriteNode> {
    if let Some(temp_id) = &identifier.temp_id {
        let key = ArenaKey::Temp(identifier.resource_type.clone(), temp_id.clone());
        let fragment = arena.get(&key).ok_or_else(|| {
            Error::Payload(format!(
                "reference to temp-id `{temp_id}` has no matching included resource of type `{}`",
                identifier.resource_type
            ))
        })?;
        return node_from_resource(fragment, arena, identifier.method, depth_budget);
    }

    let Some(id) = &identifier.id else {
        return Err(Error::Payload(format!(
            "reference to `{}` carries neither an id nor a temp-id",
            identifier.resource_type
        )));
    };

    // Existing records may carry an included fragment with further attributes;
    // a bare reference just (re)associates or destroys.
    if let Some(key) = id_key(id) {
        let arena_key = ArenaKey::Id(identifier.resource_type.clone(), key);
        if let Some(fragment) = arena.get(&arena_key) {
            return node_from_resource(fragment, arena, identifier.method, depth_budget);
        }
    }

    Ok(WriteNode {
        resource_type: identifier.resource_type.clone(),
        action: resolve_action(identifier.method, true),
        id: id_value(id),
        temp_id: None,
        attributes: RawAttributes::new(),
        relationships: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(raw: serde_json::Value) -> WriteDocument {
        WriteDocument::from_json(raw).unwrap()
    }

    #[test]
    fn test_action_resolution() {
        assert_eq!(resolve_action(None, false), Action::Create);
        assert_eq!(resolve_action(None, true), Action::Update);
        assert_eq!(resolve_action(Some(WriteMethod::Destroy), true), Action::Destroy);
        assert_eq!(resolve_action(Some(WriteMethod::Create), true), Action::Create);
    }

    #[test]
    fn test_single_resource_tree() {
        let document = doc(json!({
            "data": {
                "type": "employees",
                "attributes": { "first_name": "Jane" }
            }
        }));
        let tree = build_tree(&document, 32).unwrap();
        assert_eq!(tree.resource_type, "employees");
        assert_eq!(tree.action, Action::Create);
        assert!(tree.relationships.is_empty());
        assert_eq!(tree.attributes["first_name"], json!("Jane"));
    }

    #[test]
    fn test_temp_id_reference_resolves_included_fragment() {
        let document = doc(json!({
            "data": {
                "type": "employees",
                "temp-id": "e1",
                "relationships": {
                    "positions": [
                        { "type": "positions", "temp-id": "p1", "method": "create" }
                    ]
                }
            },
            "included": [
                {
                    "type": "positions",
                    "temp-id": "p1",
                    "attributes": { "title": "engineer" }
                }
            ]
        }));
        let tree = build_tree(&document, 32).unwrap();
        let positions = &tree.relationships[0];
        assert_eq!(positions.name, "positions");
        assert_eq!(positions.nodes.len(), 1);
        let child = &positions.nodes[0];
        assert_eq!(child.action, Action::Create);
        assert_eq!(child.attributes["title"], json!("engineer"));
        assert_eq!(child.temp_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_dangling_temp_id_is_payload_error() {
        let document = doc(json!({
            "data": {
                "type": "employees",
                "relationships": {
                    "positions": [ { "type": "positions", "temp-id": "ghost" } ]
                }
            }
        }));
        let err = build_tree(&document, 32).unwrap_err();
        assert!(matches!(err, Error::Payload(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_duplicate_temp_id_is_payload_error() {
        let document = doc(json!({
            "data": { "type": "employees" },
            "included": [
                { "type": "positions", "temp-id": "p1" },
                { "type": "positions", "temp-id": "p1" }
            ]
        }));
        let err = build_tree(&document, 32).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_id_reference_without_fragment_is_bare_update() {
        let document = doc(json!({
            "data": {
                "type": "employees",
                "id": 7,
                "relationships": {
                    "positions": [ { "type": "positions", "id": 3 } ]
                }
            }
        }));
        let tree = build_tree(&document, 32).unwrap();
        assert_eq!(tree.action, Action::Update);
        let child = &tree.relationships[0].nodes[0];
        assert_eq!(child.action, Action::Update);
        assert_eq!(child.id, Some(Value::Int(3)));
        assert!(child.attributes.is_empty());
    }

    #[test]
    fn test_id_reference_picks_up_included_fragment_attributes() {
        let document = doc(json!({
            "data": {
                "type": "employees",
                "id": 7,
                "relationships": {
                    "positions": { "type": "positions", "id": 3, "method": "update" }
                }
            },
            "included": [
                { "type": "positions", "id": 3, "attributes": { "title": "lead" } }
            ]
        }));
        let tree = build_tree(&document, 32).unwrap();
        let child = &tree.relationships[0].nodes[0];
        assert_eq!(child.attributes["title"], json!("lead"));
        assert_eq!(child.action, Action::Update);
    }

    #[test]
    fn test_reference_without_id_or_temp_id_fails() {
        let document = doc(json!({
            "data": {
                "type": "employees",
                "relationships": {
                    "positions": { "type": "positions" }
                }
            }
        }));
        let err = build_tree(&document, 32).unwrap_err();
        assert!(err.to_string().contains("neither an id nor a temp-id"));
    }

    #[test]
    fn test_depth_guard_breaks_reference_cycles() {
        // a fragment referencing itself through its own temp-id
        let document = doc(json!({
            "data": {
                "type": "employees",
                "relationships": {
                    "mentor": { "type": "employees", "temp-id": "m1" }
                }
            },
            "included": [
                {
                    "type": "employees",
                    "temp-id": "m1",
                    "relationships": {
                        "mentor": { "type": "employees", "temp-id": "m1" }
                    }
                }
            ]
        }));
        let err = build_tree(&document, 8).unwrap_err();
        assert!(err.to_string().contains("maximum relationship depth"));
    }

    #[test]
    fn test_identifier_method_overrides_fragment_default() {
        let document = doc(json!({
            "data": {
                "type": "employees",
                "relationships": {
                    "positions": { "type": "positions", "id": 3, "method": "destroy" }
                }
            },
            "included": [
                { "type": "positions", "id": 3, "attributes": { "title": "lead" } }
            ]
        }));
        let tree = build_tree(&document, 32).unwrap();
        assert_eq!(tree.relationships[0].nodes[0].action, Action::Destroy);
    }
}
