//! Single entry point bundling the stores, index, resolver and aggregates.

use std::collections::BTreeMap;

use geo::Coord;
use log::info;

use crate::{
    aggregation::{AggregationEngine, Summary},
    entity::{EntityKind, IntoEntityId, Tags},
    error::StoreError,
    geo_index::GeoIndex,
    node::Node,
    relation::{Member, Relation},
    resolver::{ReferenceResolver, ResolvedMember},
    store::{Entity, EntityStore, Filter, Session, TagFilter},
    way::Way,
};

/// Access to the store for entity kind `K`.
pub trait Collections<K: Entity> {
    /// The store holding entities of kind `K`.
    fn collection(&self) -> &EntityStore<K>;
}

/// The query surface consumed by a request dispatcher.
///
/// Every operation returns either its payload or a [`StoreError`] that maps
/// onto a status code. Clones share the session and the geo index, so the
/// facade can be handed to as many worker threads as needed.
///
/// # Examples
/// ```
/// use wayfarer_core::{Node, NodeFields, QueryFacade, Session, Way, WayFields};
///
/// # fn main() -> Result<(), wayfarer_core::StoreError> {
/// let facade = QueryFacade::open(Session::open_in_memory()?)?;
/// let a = facade.nodes().save(Node::create(NodeFields::at(5.0, 5.0))?)?;
/// let w = facade.ways().save(Way::create(WayFields::default().with_node(a.id))?)?;
///
/// assert_eq!(facade.get_nested_nodes(w.id)?, vec![a.clone()]);
/// assert_eq!(facade.find_near(5.0, 5.0, Some(1.0))?, vec![a]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct QueryFacade {
    session: Session,
    nodes: EntityStore<Node>,
    ways: EntityStore<Way>,
    relations: EntityStore<Relation>,
    index: GeoIndex,
    resolver: ReferenceResolver,
    aggregation: AggregationEngine,
}

impl QueryFacade {
    /// Wire every component to `session` and load the geo index from it.
    pub fn open(session: Session) -> Result<Self, StoreError> {
        let index = GeoIndex::new();
        let nodes = EntityStore::new(session.clone(), index.clone());
        let ways = EntityStore::new(session.clone(), index.clone());
        let relations = EntityStore::new(session.clone(), index.clone());
        index.rebuild(&nodes)?;
        info!("geo index loaded with {} node(s)", index.len()?);

        Ok(Self {
            resolver: ReferenceResolver::new(nodes.clone(), ways.clone(), relations.clone()),
            aggregation: AggregationEngine::new(nodes.clone(), ways.clone(), relations.clone()),
            session,
            nodes,
            ways,
            relations,
            index,
        })
    }

    /// The storage handle shared by every component.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Store for entity kind `K`, chosen by type.
    pub fn store<K: Entity>(&self) -> &EntityStore<K>
    where
        Self: Collections<K>,
    {
        <Self as Collections<K>>::collection(self)
    }

    /// The node store.
    pub fn nodes(&self) -> &EntityStore<Node> {
        &self.nodes
    }

    /// The way store.
    pub fn ways(&self) -> &EntityStore<Way> {
        &self.ways
    }

    /// The relation store.
    pub fn relations(&self) -> &EntityStore<Relation> {
        &self.relations
    }

    /// The shared geo index.
    pub fn index(&self) -> &GeoIndex {
        &self.index
    }

    /// The reference resolver.
    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// The aggregation engine.
    pub fn aggregation(&self) -> &AggregationEngine {
        &self.aggregation
    }

    /// See [`GeoIndex::find_near`].
    pub fn find_near(
        &self,
        longitude: f64,
        latitude: f64,
        max_distance_km: Option<f64>,
    ) -> Result<Vec<Node>, StoreError> {
        self.index
            .find_near(&self.nodes, longitude, latitude, max_distance_km)
    }

    /// See [`GeoIndex::find_within_bounding_box`].
    pub fn find_within_bounding_box(
        &self,
        bottom_left: Coord<f64>,
        top_right: Coord<f64>,
    ) -> Result<Vec<Node>, StoreError> {
        self.index
            .find_within_bounding_box(&self.nodes, bottom_left, top_right)
    }

    /// See [`ReferenceResolver::add_nested_node`].
    pub fn add_nested_node(
        &self,
        way_id: impl IntoEntityId,
        node_id: impl IntoEntityId,
    ) -> Result<u64, StoreError> {
        self.resolver.add_nested_node(way_id, node_id)
    }

    /// See [`ReferenceResolver::remove_nested_node`].
    pub fn remove_nested_node(
        &self,
        way_id: impl IntoEntityId,
        node_id: impl IntoEntityId,
    ) -> Result<u64, StoreError> {
        self.resolver.remove_nested_node(way_id, node_id)
    }

    /// See [`ReferenceResolver::add_nested_way`].
    pub fn add_nested_way(
        &self,
        way_id: impl IntoEntityId,
        child_id: impl IntoEntityId,
    ) -> Result<u64, StoreError> {
        self.resolver.add_nested_way(way_id, child_id)
    }

    /// See [`ReferenceResolver::remove_nested_way`].
    pub fn remove_nested_way(
        &self,
        way_id: impl IntoEntityId,
        child_id: impl IntoEntityId,
    ) -> Result<u64, StoreError> {
        self.resolver.remove_nested_way(way_id, child_id)
    }

    /// See [`ReferenceResolver::get_nested_nodes`].
    pub fn get_nested_nodes(&self, way_id: impl IntoEntityId) -> Result<Vec<Node>, StoreError> {
        self.resolver.get_nested_nodes(way_id)
    }

    /// See [`ReferenceResolver::get_nested_ways`].
    pub fn get_nested_ways(&self, way_id: impl IntoEntityId) -> Result<Vec<Way>, StoreError> {
        self.resolver.get_nested_ways(way_id)
    }

    /// See [`ReferenceResolver::add_member`].
    pub fn add_member(
        &self,
        relation_id: impl IntoEntityId,
        member: Member,
    ) -> Result<u64, StoreError> {
        self.resolver.add_member(relation_id, member)
    }

    /// See [`ReferenceResolver::remove_member`].
    pub fn remove_member(
        &self,
        relation_id: impl IntoEntityId,
        member_id: impl IntoEntityId,
    ) -> Result<u64, StoreError> {
        self.resolver.remove_member(relation_id, member_id)
    }

    /// See [`ReferenceResolver::get_members`].
    pub fn get_members(
        &self,
        relation_id: impl IntoEntityId,
    ) -> Result<Vec<ResolvedMember>, StoreError> {
        self.resolver.get_members(relation_id)
    }

    /// See [`ReferenceResolver::get_all_ways_containing_node`].
    pub fn get_all_ways_containing_node(
        &self,
        node_id: impl IntoEntityId,
    ) -> Result<Vec<Way>, StoreError> {
        self.resolver.get_all_ways_containing_node(node_id)
    }

    /// See [`AggregationEngine::count`].
    pub fn count(&self, kind: EntityKind, filter: &Filter) -> Result<u64, StoreError> {
        self.aggregation.count(kind, filter)
    }

    /// See [`AggregationEngine::count_with_tag`].
    pub fn count_with_tag(&self, kind: EntityKind, filter: &TagFilter) -> Result<u64, StoreError> {
        self.aggregation.count_with_tag(kind, filter)
    }

    /// See [`AggregationEngine::summarize`].
    pub fn summarize(&self) -> Result<Summary, StoreError> {
        self.aggregation.summarize()
    }

    /// See [`AggregationEngine::group_by_tag`].
    pub fn group_by_tag(&self, kind: EntityKind) -> Result<BTreeMap<Tags, u64>, StoreError> {
        self.aggregation.group_by_tag(kind)
    }

    /// See [`AggregationEngine::tag_value_counts`].
    pub fn tag_value_counts(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<BTreeMap<String, u64>, StoreError> {
        self.aggregation.tag_value_counts(kind, key)
    }

    /// Ways grouped by their complete tag map.
    pub fn speed_limits(&self) -> Result<BTreeMap<Tags, u64>, StoreError> {
        self.group_by_tag(EntityKind::Way)
    }

    /// Empty the collection for `kind`. Reserved for bootstrap and tests.
    pub fn clear(&self, kind: EntityKind) -> Result<(), StoreError> {
        match kind {
            EntityKind::Node => self.nodes.clear(),
            EntityKind::Way => self.ways.clear(),
            EntityKind::Relation => self.relations.clear(),
        }
    }
}

impl Collections<Node> for QueryFacade {
    fn collection(&self) -> &EntityStore<Node> {
        &self.nodes
    }
}

impl Collections<Way> for QueryFacade {
    fn collection(&self) -> &EntityStore<Way> {
        &self.ways
    }
}

impl Collections<Relation> for QueryFacade {
    fn collection(&self) -> &EntityStore<Relation> {
        &self.relations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{node::NodeFields, way::WayFields};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn facade() -> QueryFacade {
        crate::test_support::memory_facade().expect("open facade")
    }

    fn assert_send_sync<T: Send + Sync + Clone>() {}

    #[rstest]
    fn facade_is_shareable_across_threads() {
        assert_send_sync::<QueryFacade>();
    }

    #[rstest]
    fn store_is_selected_by_type(facade: QueryFacade) {
        let way = facade
            .store::<Way>()
            .save(Way::create(WayFields::default()).expect("way"))
            .expect("save");
        assert_eq!(facade.ways().get_by_id(way.id).expect("reload"), way);
    }

    #[rstest]
    fn reopening_rebuilds_the_index() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("wayfarer.db");
        let saved = {
            let facade = QueryFacade::open(Session::open(&path).expect("open")).expect("facade");
            facade
                .nodes()
                .save(Node::create(NodeFields::at(1.0, 1.0)).expect("node"))
                .expect("save")
        };
        let facade = QueryFacade::open(Session::open(&path).expect("reopen")).expect("facade");
        assert_eq!(facade.find_near(1.0, 1.0, Some(0.5)).expect("near"), vec![saved]);
    }

    #[rstest]
    fn clones_observe_each_others_writes(facade: QueryFacade) {
        let clone = facade.clone();
        let node = std::thread::spawn(move || {
            clone
                .nodes()
                .save(Node::create(NodeFields::at(3.0, 3.0)).expect("node"))
                .expect("save")
        })
        .join()
        .expect("writer thread");
        assert_eq!(facade.find_near(3.0, 3.0, Some(0.1)).expect("near"), vec![node]);
    }

    #[rstest]
    fn clear_node_collection_empties_the_index(facade: QueryFacade) {
        facade
            .nodes()
            .save(Node::create(NodeFields::at(0.0, 0.0)).expect("node"))
            .expect("save");
        facade.clear(EntityKind::Node).expect("clear");
        assert!(facade.index().is_empty().expect("is_empty"));
        assert_eq!(facade.summarize().expect("summary").node_count, 0);
    }

    #[rstest]
    fn speed_limits_group_ways(facade: QueryFacade) {
        let fields = WayFields::default().with_tag("maxspeed", "20");
        facade
            .ways()
            .save(Way::create(fields.clone()).expect("way"))
            .expect("save");
        facade
            .ways()
            .save(Way::create(fields.clone()).expect("way"))
            .expect("save");
        let limits = facade.speed_limits().expect("speed limits");
        assert_eq!(limits.get(&fields.tags), Some(&2));
    }
}
