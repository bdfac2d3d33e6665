//! Fixture builders shared by unit, behaviour and CLI tests.

use geo::Coord;

use crate::{
    EntityId, EntityKind, Member, Node, NodeFields, QueryFacade, Relation, RelationFields,
    Session, StoreError, Way, WayFields,
};

/// Open a facade over a fresh in-memory database.
pub fn memory_facade() -> Result<QueryFacade, StoreError> {
    QueryFacade::open(Session::open_in_memory()?)
}

/// Save a node at the given longitude and latitude.
pub fn save_node(facade: &QueryFacade, longitude: f64, latitude: f64) -> Result<Node, StoreError> {
    facade
        .nodes()
        .save(Node::create(NodeFields::at(longitude, latitude))?)
}

/// Save a way referencing `nodes`.
pub fn save_way(facade: &QueryFacade, nodes: &[EntityId]) -> Result<Way, StoreError> {
    let fields = WayFields {
        nodes: nodes.to_vec(),
        ..WayFields::default()
    };
    facade.ways().save(Way::create(fields)?)
}

/// Save a relation holding `members`, given as `(id, kind, role)`.
pub fn save_relation(
    facade: &QueryFacade,
    members: &[(EntityId, EntityKind, &str)],
) -> Result<Relation, StoreError> {
    let fields = RelationFields {
        members: members
            .iter()
            .map(|(id, kind, role)| Member::new(*id, *kind, *role))
            .collect(),
        ..RelationFields::default()
    };
    facade.relations().save(Relation::create(fields)?)
}

/// Shorthand for a lon/lat coordinate.
pub const fn lon_lat(longitude: f64, latitude: f64) -> Coord<f64> {
    Coord {
        x: longitude,
        y: latitude,
    }
}
