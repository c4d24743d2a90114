//! Relationship metadata.
//!
//! Relationships are declared at resource-definition time and represented as
//! static metadata on each [`ResourceDef`](crate::resource::ResourceDef). The
//! orchestrator reads this metadata to decide write order (children owning the
//! foreign key persist after their parent; parents referenced by a foreign key
//! persist before their owner) and which attribute receives the resolved id.

use std::fmt;

/// The cardinality and direction of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    /// The owner stores the child's id: `Post` belongs to `Author`.
    BelongsTo,
    /// Like [`RelationshipKind::BelongsTo`], but the child's resource type is
    /// chosen per payload reference and recorded alongside the id.
    PolymorphicBelongsTo,
    /// One child stores the owner's id: `Post` has one `Masthead`.
    HasOne,
    /// Many children store the owner's id: `Post` has many `Comments`.
    HasMany,
    /// Owner and children are linked through join records.
    ManyToMany,
}

impl RelationshipKind {
    /// True when the related node must persist *before* its owner so the
    /// owner can store the resulting foreign key.
    #[must_use]
    pub const fn child_persists_first(self) -> bool {
        matches!(
            self,
            RelationshipKind::BelongsTo | RelationshipKind::PolymorphicBelongsTo
        )
    }

    /// True when a payload reference may carry a list of identifiers.
    #[must_use]
    pub const fn is_to_many(self) -> bool {
        matches!(self, RelationshipKind::HasMany | RelationshipKind::ManyToMany)
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelationshipKind::BelongsTo => "belongs_to",
            RelationshipKind::PolymorphicBelongsTo => "polymorphic_belongs_to",
            RelationshipKind::HasOne => "has_one",
            RelationshipKind::HasMany => "has_many",
            RelationshipKind::ManyToMany => "many_to_many",
        };
        f.write_str(name)
    }
}

/// Join-record metadata for many-to-many relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    /// Resource the join records are written to (e.g. `"employee_teams"`).
    pub resource: &'static str,

    /// Join attribute pointing at the owner (e.g. `"employee_id"`).
    pub local_key: &'static str,

    /// Join attribute pointing at the related record (e.g. `"team_id"`).
    pub remote_key: &'static str,
}

impl LinkInfo {
    /// Create a new join-record definition.
    #[must_use]
    pub const fn new(
        resource: &'static str,
        local_key: &'static str,
        remote_key: &'static str,
    ) -> Self {
        Self {
            resource,
            local_key,
            remote_key,
        }
    }
}

/// Metadata about one relationship declared on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipInfo {
    /// Relationship name as it appears in payloads.
    pub name: &'static str,

    /// The related resource's registry name. Empty for polymorphic
    /// relationships, where the payload reference supplies the type.
    pub resource: &'static str,

    /// Kind of relationship.
    pub kind: RelationshipKind,

    /// Foreign-key attribute on the *owner* (BelongsTo / PolymorphicBelongsTo),
    /// e.g. `"author_id"` on a post.
    pub local_key: Option<&'static str>,

    /// Foreign-key attribute on the *child* (HasOne / HasMany),
    /// e.g. `"post_id"` on a comment.
    pub remote_key: Option<&'static str>,

    /// Join-record metadata (ManyToMany only).
    pub link: Option<LinkInfo>,

    /// Attribute on the owner recording the related resource's type
    /// (PolymorphicBelongsTo only), e.g. `"notable_type"`.
    pub type_key: Option<&'static str>,
}

impl RelationshipInfo {
    /// Owner stores `local_key` = related record's id.
    #[must_use]
    pub const fn belongs_to(
        name: &'static str,
        resource: &'static str,
        local_key: &'static str,
    ) -> Self {
        Self {
            name,
            resource,
            kind: RelationshipKind::BelongsTo,
            local_key: Some(local_key),
            remote_key: None,
            link: None,
            type_key: None,
        }
    }

    /// Owner stores `local_key` = related id and `type_key` = related type;
    /// the related resource is chosen by each payload reference.
    #[must_use]
    pub const fn polymorphic_belongs_to(
        name: &'static str,
        local_key: &'static str,
        type_key: &'static str,
    ) -> Self {
        Self {
            name,
            resource: "",
            kind: RelationshipKind::PolymorphicBelongsTo,
            local_key: Some(local_key),
            remote_key: None,
            link: None,
            type_key: Some(type_key),
        }
    }

    /// One child stores `remote_key` = owner's id.
    #[must_use]
    pub const fn has_one(
        name: &'static str,
        resource: &'static str,
        remote_key: &'static str,
    ) -> Self {
        Self {
            name,
            resource,
            kind: RelationshipKind::HasOne,
            local_key: None,
            remote_key: Some(remote_key),
            link: None,
            type_key: None,
        }
    }

    /// Many children store `remote_key` = owner's id.
    #[must_use]
    pub const fn has_many(
        name: &'static str,
        resource: &'static str,
        remote_key: &'static str,
    ) -> Self {
        Self {
            name,
            resource,
            kind: RelationshipKind::HasMany,
            local_key: None,
            remote_key: Some(remote_key),
            link: None,
            type_key: None,
        }
    }

    /// Owner and children linked through join records described by `link`.
    #[must_use]
    pub const fn many_to_many(name: &'static str, resource: &'static str, link: LinkInfo) -> Self {
        Self {
            name,
            resource,
            kind: RelationshipKind::ManyToMany,
            local_key: None,
            remote_key: None,
            link: Some(link),
            type_key: None,
        }
    }
}
