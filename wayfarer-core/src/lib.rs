//! Core of the Wayfarer map-data store.
//!
//! Nodes, ways and relations are persisted as JSON documents in SQLite,
//! indexed spatially with an R\*-tree and exposed through a
//! [`QueryFacade`]. Entities are constructed and validated first, then
//! persisted explicitly; no read ever creates an entity.
//!
//! ```
//! use wayfarer_core::{EntityKind, Member, Node, NodeFields, QueryFacade, Relation,
//!     RelationFields, Session};
//!
//! # fn main() -> Result<(), wayfarer_core::StoreError> {
//! let facade = QueryFacade::open(Session::open_in_memory()?)?;
//! let stop = facade.nodes().save(Node::create(NodeFields::at(-0.1276, 51.5072))?)?;
//! let route = facade.relations().save(Relation::create(
//!     RelationFields::default().with_member(Member::new(stop.id, EntityKind::Node, "stop")),
//! )?)?;
//!
//! assert!(facade.get_members(route.id)?[0].resolved);
//! assert_eq!(facade.summarize()?.relation_count, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod aggregation;
mod entity;
mod error;
mod facade;
mod geo_index;
mod node;
mod relation;
mod resolver;
pub mod store;
mod way;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use aggregation::{AggregationEngine, Summary};
pub use entity::{EntityId, EntityKind, IntoEntityId, Tags, Timestamps};
pub use error::{ErrorResponse, StorageError, StoreError, ValidationError};
pub use facade::{Collections, QueryFacade};
pub use geo_index::{DEFAULT_NEAR_DISTANCE_KM, EARTH_RADIUS_KM, GeoIndex, haversine_km};
pub use node::{Node, NodeFields, NodePatch};
pub use relation::{Member, Relation, RelationFields, RelationPatch};
pub use resolver::{MemberEntity, ReferenceResolver, ResolvedMember};
pub use store::{AmendOptions, Entity, EntityPatch, EntityStore, Filter, Session, TagFilter};
pub use way::{MAX_WAY_NODES, Way, WayFields, WayPatch};
