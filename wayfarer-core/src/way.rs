//! Polylines and areas built from node and way references.

use serde::{Deserialize, Serialize};

use crate::{
    entity::{EntityId, EntityKind, Tags, Timestamps},
    error::ValidationError,
    store::{AmendOptions, Entity, EntityPatch},
};

/// Maximum number of node references a single way may hold.
pub const MAX_WAY_NODES: usize = 2000;

/// A set of references to nodes and to other ways.
///
/// References are ids only: the referenced entities are neither owned nor
/// checked for existence. A way that references itself is not detected and
/// must be avoided by callers.
///
/// # Examples
/// ```
/// use wayfarer_core::{EntityId, Way, WayFields};
///
/// # fn main() -> Result<(), wayfarer_core::ValidationError> {
/// let a = EntityId::new();
/// let way = Way::create(WayFields::default().with_node(a).with_node(a))?;
/// assert_eq!(way.nodes, vec![a]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    /// Unique identifier.
    pub id: EntityId,
    /// Referenced node ids.
    #[serde(default)]
    pub nodes: Vec<EntityId>,
    /// Referenced way ids.
    #[serde(default)]
    pub ways: Vec<EntityId>,
    /// Free-form annotations.
    #[serde(default)]
    pub tags: Tags,
    /// Store-managed creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Way {
    /// Construct and validate an unsaved way. Duplicate references collapse.
    pub fn create(fields: WayFields) -> Result<Self, ValidationError> {
        let way = Self {
            id: EntityId::new(),
            nodes: dedup(fields.nodes),
            ways: dedup(fields.ways),
            tags: fields.tags,
            timestamps: Timestamps::default(),
        };
        Entity::validate(&way)?;
        Ok(way)
    }

    /// Whether the way references the node.
    pub fn contains_node(&self, node: EntityId) -> bool {
        self.nodes.contains(&node)
    }

    /// Whether the way references the child way.
    pub fn contains_way(&self, way: EntityId) -> bool {
        self.ways.contains(&way)
    }

    pub(crate) fn insert_node(&mut self, node: EntityId) -> Result<(), ValidationError> {
        if self.contains_node(node) {
            return Ok(());
        }
        if self.nodes.len() >= MAX_WAY_NODES {
            return Err(ValidationError::TooManyNodes {
                limit: MAX_WAY_NODES,
            });
        }
        self.nodes.push(node);
        Ok(())
    }

    pub(crate) fn remove_node(&mut self, node: EntityId) {
        self.nodes.retain(|candidate| *candidate != node);
    }

    pub(crate) fn insert_way(&mut self, way: EntityId) {
        if !self.contains_way(way) {
            self.ways.push(way);
        }
    }

    pub(crate) fn remove_way(&mut self, way: EntityId) {
        self.ways.retain(|candidate| *candidate != way);
    }
}

impl Entity for Way {
    const KIND: EntityKind = EntityKind::Way;
    type Fields = WayFields;
    type Patch = WayPatch;

    fn create(fields: Self::Fields) -> Result<Self, ValidationError> {
        Self::create(fields)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_node_count(self.nodes.len())
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

/// Input for [`Way::create`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WayFields {
    /// Node references.
    pub nodes: Vec<EntityId>,
    /// Child way references.
    pub ways: Vec<EntityId>,
    /// Initial tags.
    pub tags: Tags,
}

impl WayFields {
    /// Add a node reference.
    #[must_use]
    pub fn with_node(mut self, node: EntityId) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add a child way reference.
    #[must_use]
    pub fn with_way(mut self, way: EntityId) -> Self {
        self.ways.push(way);
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
pub struct WayPatch {
    /// Replacement node references.
    pub nodes: Option<Vec<EntityId>>,
    /// Replacement child way references.
    pub ways: Option<Vec<EntityId>>,
    /// Replacement (or merged) tags.
    pub tags: Option<Tags>,
}

impl WayPatch {
    /// Patch that only touches tags.
    pub fn tags(tags: Tags) -> Self {
        Self {
            tags: Some(tags),
            ..Self::default()
        }
    }
}

impl EntityPatch<Way> for WayPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        match &self.nodes {
            Some(nodes) => validate_node_count(dedup(nodes.clone()).len()),
            None => Ok(()),
        }
    }

    fn apply(&self, way: &mut Way, options: &AmendOptions) {
        if let Some(nodes) = &self.nodes {
            way.nodes = dedup(nodes.clone());
        }
        if let Some(ways) = &self.ways {
            way.ways = dedup(ways.clone());
        }
        if let Some(tags) = &self.tags {
            options.apply_tags(&mut way.tags, tags);
        }
    }
}

fn validate_node_count(count: usize) -> Result<(), ValidationError> {
    if count > MAX_WAY_NODES {
        Err(ValidationError::TooManyNodes {
            limit: MAX_WAY_NODES,
        })
    } else {
        Ok(())
    }
}

/// Drop repeated ids, keeping the first occurrence of each.
pub(crate) fn dedup(ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}
