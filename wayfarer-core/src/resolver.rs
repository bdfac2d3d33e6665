//! Nesting mutations and reference resolution across the three stores.
//!
//! References are plain ids, so any of them may dangle. Listing operations
//! never fail because one reference no longer resolves: nested node and way
//! lookups omit it, while relation members are reported as unresolved.

use log::{debug, warn};
use serde::Serialize;

use crate::{
    entity::{EntityId, EntityKind, IntoEntityId},
    error::StoreError,
    node::Node,
    relation::{Member, Relation},
    store::{Entity, EntityStore},
    way::Way,
};

/// The entity a relation member points at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "entity", rename_all = "lowercase")]
pub enum MemberEntity {
    /// A resolved node member.
    Node(Node),
    /// A resolved way member.
    Way(Way),
    /// A resolved relation member.
    Relation(Relation),
}

/// A relation member paired with its current target, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMember {
    /// The member as stored on the relation.
    pub member: Member,
    /// Whether the referenced entity still exists.
    pub resolved: bool,
    /// The referenced entity when `resolved` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<MemberEntity>,
}

impl ResolvedMember {
    fn new(member: Member, entity: Option<MemberEntity>) -> Self {
        Self {
            member,
            resolved: entity.is_some(),
            entity,
        }
    }
}

/// Follows and edits references held by ways and relations.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    nodes: EntityStore<Node>,
    ways: EntityStore<Way>,
    relations: EntityStore<Relation>,
}

impl ReferenceResolver {
    /// Resolve references through the given stores.
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

    /// Add `node_id` to the way's node set; returns 1 when the way exists.
    ///
    /// The node itself is not checked for existence.
    pub fn add_nested_node(
        &self,
        way_id: impl IntoEntityId,
        node_id: impl IntoEntityId,
    ) -> Result<u64, StoreError> {
        let way_id = way_id.into_entity_id()?;
        let node_id = node_id.into_entity_id()?;
        debug!("adding node {node_id} to way {way_id}");
        self.ways.modify(way_id, |way| way.insert_node(node_id))
    }

    /// Remove every occurrence of `node_id` from the way's node set.
    pub fn remove_nested_node(
        &self,
        way_id: impl IntoEntityId,
        node_id: impl IntoEntityId,
    ) -> Result<u64, StoreError> {
        let way_id = way_id.into_entity_id()?;
        let node_id = node_id.into_entity_id()?;
        self.ways.modify(way_id, |way| {
            way.remove_node(node_id);
            Ok(())
        })
    }

    /// Add `child_id` to the way's child way set.
    pub fn add_nested_way(
        &self,
        way_id: impl IntoEntityId,
        child_id: impl IntoEntityId,
    ) -> Result<u64, StoreError> {
        let way_id = way_id.into_entity_id()?;
        let child_id = child_id.into_entity_id()?;
        debug!("adding way {child_id} to way {way_id}");
        self.ways.modify(way_id, |way| {
            way.insert_way(child_id);
            Ok(())
        })
    }

    /// Remove every occurrence of `child_id` from the way's child way set.
    pub fn remove_nested_way(
        &self,
        way_id: impl IntoEntityId,
        child_id: impl IntoEntityId,
    ) -> Result<u64, StoreError> {
        let way_id = way_id.into_entity_id()?;
        let child_id = child_id.into_entity_id()?;
        self.ways.modify(way_id, |way| {
            way.remove_way(child_id);
            Ok(())
        })
    }

    /// Nodes currently referenced by the way, in reference order.
    pub fn get_nested_nodes(&self, way_id: impl IntoEntityId) -> Result<Vec<Node>, StoreError> {
        let way = self.ways.get_by_id(way_id)?;
        resolve_present(&self.nodes, way.id, &way.nodes)
    }

    /// Child ways referenced by the way, one level deep.
    pub fn get_nested_ways(&self, way_id: impl IntoEntityId) -> Result<Vec<Way>, StoreError> {
        let way = self.ways.get_by_id(way_id)?;
        resolve_present(&self.ways, way.id, &way.ways)
    }

    /// Add a member; identical members are stored once.
    pub fn add_member(
        &self,
        relation_id: impl IntoEntityId,
        member: Member,
    ) -> Result<u64, StoreError> {
        let relation_id = relation_id.into_entity_id()?;
        debug!(
            "adding {} {} to relation {relation_id} as {:?}",
            member.kind, member.id, member.role
        );
        self.relations.modify(relation_id, |relation| {
            relation.insert_member(member);
            Ok(())
        })
    }

    /// Remove every member pointing at `member_id`, whatever its kind.
    pub fn remove_member(
        &self,
        relation_id: impl IntoEntityId,
        member_id: impl IntoEntityId,
    ) -> Result<u64, StoreError> {
        let relation_id = relation_id.into_entity_id()?;
        let member_id = member_id.into_entity_id()?;
        self.relations.modify(relation_id, |relation| {
            relation.remove_member(member_id);
            Ok(())
        })
    }

    /// Every member of the relation with its current target.
    ///
    /// Members whose target is gone are kept with `resolved: false`.
    pub fn get_members(
        &self,
        relation_id: impl IntoEntityId,
    ) -> Result<Vec<ResolvedMember>, StoreError> {
        let relation = self.relations.get_by_id(relation_id)?;
        let relation_id = relation.id;
        let ids_of = |kind: EntityKind| -> Vec<EntityId> {
            relation
                .members
                .iter()
                .filter(|member| member.kind == kind)
                .map(|member| member.id)
                .collect()
        };
        let nodes = self.nodes.find_many(&ids_of(EntityKind::Node))?;
        let ways = self.ways.find_many(&ids_of(EntityKind::Way))?;
        let relations = self.relations.find_many(&ids_of(EntityKind::Relation))?;

        let resolved = relation
            .members
            .into_iter()
            .map(|member| {
                let entity = match member.kind {
                    EntityKind::Node => nodes.get(&member.id).cloned().map(MemberEntity::Node),
                    EntityKind::Way => ways.get(&member.id).cloned().map(MemberEntity::Way),
                    EntityKind::Relation => relations
                        .get(&member.id)
                        .cloned()
                        .map(MemberEntity::Relation),
                };
                if entity.is_none() {
                    warn!(
                        "relation {relation_id} member {} {} does not resolve",
                        member.kind, member.id
                    );
                }
                ResolvedMember::new(member, entity)
            })
            .collect();
        Ok(resolved)
    }

    /// Every way whose node set contains `node_id`.
    pub fn get_all_ways_containing_node(
        &self,
        node_id: impl IntoEntityId,
    ) -> Result<Vec<Way>, StoreError> {
        let node_id = node_id.into_entity_id()?;
        self.ways.find_referencing("nodes", node_id)
    }
}

fn resolve_present<K: Entity>(
    store: &EntityStore<K>,
    parent: EntityId,
    ids: &[EntityId],
) -> Result<Vec<K>, StoreError> {
    let mut found = store.find_many(ids)?;
    Ok(ids
        .iter()
        .filter_map(|id| {
            let entity = found.remove(id);
            if entity.is_none() {
                warn!("way {parent} references missing {} {id}", K::KIND);
            }
            entity
        })
        .collect())
}
