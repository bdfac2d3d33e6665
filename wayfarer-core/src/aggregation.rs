//! Counts and map/reduce groupings over the three collections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    entity::{EntityKind, Tags},
    error::StoreError,
    node::Node,
    relation::Relation,
    store::{EntityStore, Filter, TagFilter},
    way::Way,
};

/// Entity totals reported by [`AggregationEngine::summarize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Number of stored nodes.
    pub node_count: u64,
    /// Number of stored ways.
    pub way_count: u64,
    /// Number of stored relations.
    pub relation_count: u64,
}

/// Emit one key per item through `map`, then sum the emissions per key.
///
/// Items for which `map` emits nothing are skipped.
pub(crate) fn map_reduce<T, K, I, F>(items: I, map: F) -> BTreeMap<K, u64>
where
    I: IntoIterator<Item = T>,
    K: Ord,
    F: Fn(T) -> Option<K>,
{
    items
        .into_iter()
        .filter_map(map)
        .fold(BTreeMap::new(), |mut groups, key| {
            *groups.entry(key).or_insert(0) += 1;
            groups
        })
}

/// Read-only aggregate queries.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    nodes: EntityStore<Node>,
    ways: EntityStore<Way>,
    relations: EntityStore<Relation>,
}

impl AggregationEngine {
    /// Aggregate over the given stores.
    pub fn new(
        nodes: EntityStore<Node>,
        ways: EntityStore<Way>,
        relations: EntityStore<Relation>,
    ) -> Self {
        Self {
            nodes,
            ways,
            relations,
        }
    }

    /// Number of entities of `kind` matching `filter`.
    pub fn count(&self, kind: EntityKind, filter: &Filter) -> Result<u64, StoreError> {
        match kind {
            EntityKind::Node => self.nodes.count(filter),
            EntityKind::Way => self.ways.count(filter),
            EntityKind::Relation => self.relations.count(filter),
        }
    }

    /// Number of entities of `kind` whose tags satisfy `filter`.
    pub fn count_with_tag(&self, kind: EntityKind, filter: &TagFilter) -> Result<u64, StoreError> {
        match kind {
            EntityKind::Node => self.nodes.count_with_tag(filter),
            EntityKind::Way => self.ways.count_with_tag(filter),
            EntityKind::Relation => self.relations.count_with_tag(filter),
        }
    }

    /// Independent totals of each collection.
    pub fn summarize(&self) -> Result<Summary, StoreError> {
        let everything = TagFilter::new();
        Ok(Summary {
            node_count: self.nodes.count_with_tag(&everything)?,
            way_count: self.ways.count_with_tag(&everything)?,
            relation_count: self.relations.count_with_tag(&everything)?,
        })
    }

    /// Entity counts keyed by their complete tag map.
    ///
    /// Two entities share a group only when their tag maps are identical, so
    /// `{highway: primary}` and `{highway: primary, name: A}` are counted
    /// separately. Untagged entities form the group keyed by the empty map.
    pub fn group_by_tag(&self, kind: EntityKind) -> Result<BTreeMap<Tags, u64>, StoreError> {
        Ok(map_reduce(self.tags_of(kind)?, Some))
    }

    /// Entity counts keyed by the value of a single tag `key`.
    ///
    /// Entities without the key are not counted.
    pub fn tag_value_counts(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<BTreeMap<String, u64>, StoreError> {
        Ok(map_reduce(self.tags_of(kind)?, |mut tags: Tags| {
            tags.remove(key)
        }))
    }

    fn tags_of(&self, kind: EntityKind) -> Result<Vec<Tags>, StoreError> {
        match kind {
            EntityKind::Node => self.nodes.all_tags(),
            EntityKind::Way => self.ways.all_tags(),
            EntityKind::Relation => self.relations.all_tags(),
        }
    }
}
