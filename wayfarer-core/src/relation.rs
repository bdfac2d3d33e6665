//! Relations grouping heterogeneous members under roles.

use serde::{Deserialize, Serialize};

use crate::{
    entity::{EntityId, EntityKind, Tags, Timestamps},
    error::ValidationError,
    store::{AmendOptions, Entity, EntityPatch},
};

/// A reference from a relation to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// Identifier of the referenced entity.
    pub id: EntityId,
    /// Kind of the referenced entity.
    pub kind: EntityKind,
    /// Free-form label, e.g. `outer` or `stop`.
    #[serde(default)]
    pub role: String,
}

impl Member {
    /// Build a member reference.
    pub fn new(id: EntityId, kind: EntityKind, role: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            role: role.into(),
        }
    }
}

/// A set of members, each pointing at a node, way or relation.
///
/// # Examples
/// ```
/// use wayfarer_core::{EntityId, EntityKind, Member, Relation, RelationFields};
///
/// # fn main() -> Result<(), wayfarer_core::ValidationError> {
/// let point = Member::new(EntityId::new(), EntityKind::Node, "point");
/// let relation = Relation::create(RelationFields::default().with_member(point.clone()))?;
/// assert_eq!(relation.members, vec![point]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Unique identifier.
    pub id: EntityId,
    /// Member references.
    #[serde(default)]
    pub members: Vec<Member>,
    /// Free-form annotations.
    #[serde(default)]
    pub tags: Tags,
    /// Store-managed creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Relation {
    /// Construct an unsaved relation. Identical members collapse.
    pub fn create(fields: RelationFields) -> Result<Self, ValidationError> {
        let mut relation = Self {
            id: EntityId::new(),
            members: Vec::with_capacity(fields.members.len()),
            tags: fields.tags,
            timestamps: Timestamps::default(),
        };
        for member in fields.members {
            relation.insert_member(member);
        }
        Ok(relation)
    }

    pub(crate) fn insert_member(&mut self, member: Member) {
        if !self.members.contains(&member) {
            self.members.push(member);
        }
    }

    /// Drop every member pointing at `id`, whatever its kind or role.
    pub(crate) fn remove_member(&mut self, id: EntityId) {
        self.members.retain(|member| member.id != id);
    }
}

impl Entity for Relation {
    const KIND: EntityKind = EntityKind::Relation;
    type Fields = RelationFields;
    type Patch = RelationPatch;

    fn create(fields: Self::Fields) -> Result<Self, ValidationError> {
        Self::create(fields)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }
}

/// Input for [`Relation::create`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationFields {
    /// Initial members.
    pub members: Vec<Member>,
    /// Initial tags.
    pub tags: Tags,
}

impl RelationFields {
    /// Add a member.
    #[must_use]
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// Add a tag, replacing any previous value for the key.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Partial update applied by `amend`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationPatch {
    /// Replacement members.
    pub members: Option<Vec<Member>>,
    /// Replacement (or merged) tags.
    pub tags: Option<Tags>,
}

impl RelationPatch {
    /// Patch that only touches tags.
    pub fn tags(tags: Tags) -> Self {
        Self {
            tags: Some(tags),
            ..Self::default()
        }
    }
}

impl EntityPatch<Relation> for RelationPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn apply(&self, relation: &mut Relation, options: &AmendOptions) {
        if let Some(members) = &self.members {
            relation.members.clear();
            for member in members {
                relation.insert_member(member.clone());
            }
        }
        if let Some(tags) = &self.tags {
            options.apply_tags(&mut relation.tags, tags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn remove_member_ignores_kind_and_role() {
        let shared = EntityId::new();
        let kept = Member::new(EntityId::new(), EntityKind::Way, "outer");
        let fields = RelationFields::default()
            .with_member(Member::new(shared, EntityKind::Node, "stop"))
            .with_member(Member::new(shared, EntityKind::Way, "platform"))
            .with_member(kept.clone());
        let mut relation = Relation::create(fields).expect("valid relation");

        relation.remove_member(shared);

        assert_eq!(relation.members, vec![kept]);
    }

    #[rstest]
    fn identical_members_collapse() {
        let member = Member::new(EntityId::new(), EntityKind::Node, "point");
        let fields = RelationFields::default()
            .with_member(member.clone())
            .with_member(member.clone());
        let relation = Relation::create(fields).expect("valid relation");
        assert_eq!(relation.members, vec![member]);
    }

    #[rstest]
    fn same_entity_may_hold_two_roles() {
        let id = EntityId::new();
        let fields = RelationFields::default()
            .with_member(Member::new(id, EntityKind::Way, "inner"))
            .with_member(Member::new(id, EntityKind::Way, "outer"));
        let relation = Relation::create(fields).expect("valid relation");
        assert_eq!(relation.members.len(), 2);
    }

    #[rstest]
    fn member_kind_serialises_lowercase() {
        let member = Member::new(EntityId::new(), EntityKind::Relation, "subarea");
        let json = serde_json::to_value(&member).expect("serialise member");
        assert_eq!(json["kind"], "relation");
        assert_eq!(json["role"], "subarea");
    }
}
