//! Facade crate for the Wayfarer map-data store.
//!
//! This crate re-exports the public surface of `wayfarer-core`. Enable the
//! `test-support` feature to reach the fixture builders used by the
//! workspace's own tests.

#![forbid(unsafe_code)]

pub use wayfarer_core::{
    AggregationEngine, AmendOptions, Collections, DEFAULT_NEAR_DISTANCE_KM, EARTH_RADIUS_KM,
    Entity, EntityId, EntityKind, EntityPatch, EntityStore, ErrorResponse, Filter, GeoIndex,
    IntoEntityId, MAX_WAY_NODES, Member, MemberEntity, Node, NodeFields, NodePatch, QueryFacade,
    ReferenceResolver, Relation, RelationFields, RelationPatch, ResolvedMember, Session,
    StorageError, StoreError, Summary, TagFilter, Tags, Timestamps, ValidationError, Way,
    WayFields, WayPatch, haversine_km,
};

pub use wayfarer_core::store;

#[cfg(feature = "test-support")]
pub use wayfarer_core::test_support;
