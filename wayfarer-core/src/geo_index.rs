//! In-process R\*-tree over node locations.
//!
//! The index holds `(id, location)` pairs only; query results are resolved
//! back to full [`Node`]s through the node store. Stores update the index
//! before a write returns, so a caller always sees its own saved nodes.
//!
//! Coordinates are `geo::Coord` values with `x` as longitude and `y` as
//! latitude, both in degrees.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use geo::Coord;
use log::{debug, warn};
use rstar::{AABB, RTree, RTreeObject};

use crate::{
    entity::EntityId,
    error::{StorageError, StoreError, ValidationError},
    node::{Node, check, validate_location},
    store::EntityStore,
};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius applied by `find_near` when the caller gives none.
pub const DEFAULT_NEAR_DISTANCE_KM: f64 = 100.0;

/// Padding added to envelopes so rounding never drops a boundary node.
const ENVELOPE_PADDING_DEG: f64 = 1e-9;

/// Great-circle distance in kilometres between two lon/lat coordinates.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use wayfarer_core::haversine_km;
///
/// let km = haversine_km(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
/// assert_eq!(km.round(), 157.0);
/// ```
pub fn haversine_km(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let lat_a = a.y.to_radians();
    let lat_b = b.y.to_radians();
    let half_d_lat = (b.y - a.y).to_radians() / 2.0;
    let half_d_lon = (b.x - a.x).to_radians() / 2.0;
    let h = half_d_lat.sin().powi(2) + lat_a.cos() * lat_b.cos() * half_d_lon.sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedNode {
    id: EntityId,
    location: Coord<f64>,
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.x, self.location.y])
    }
}

#[derive(Default)]
struct Inner {
    tree: RTree<IndexedNode>,
    locations: HashMap<EntityId, Coord<f64>>,
}

impl Inner {
    fn remove(&mut self, id: EntityId) -> bool {
        match self.locations.remove(&id) {
            Some(location) => self.tree.remove(&IndexedNode { id, location }).is_some(),
            None => false,
        }
    }
}

/// Shared spatial index answering proximity and bounding-box queries.
///
/// Clones share the same tree.
#[derive(Clone, Default)]
pub struct GeoIndex {
    inner: Arc<RwLock<Inner>>,
}

impl fmt::Debug for GeoIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("GeoIndex");
        if let Ok(inner) = self.inner.read() {
            debug.field("entries", &inner.tree.size());
        }
        debug.finish_non_exhaustive()
    }
}

impl GeoIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with every node currently in `nodes`.
    pub fn rebuild(&self, nodes: &EntityStore<Node>) -> Result<(), StoreError> {
        nodes.with_snapshot(|snapshot| {
            let entries: Vec<IndexedNode> = snapshot
                .iter()
                .map(|node| IndexedNode {
                    id: node.id,
                    location: node.location,
                })
                .collect();
            let mut inner = self.write()?;
            inner.locations = entries
                .iter()
                .map(|entry| (entry.id, entry.location))
                .collect();
            inner.tree = RTree::bulk_load(entries);
            debug!("rebuilt geo index with {} node(s)", inner.tree.size());
            Ok(())
        })
    }

    /// Index a node, replacing any previous entry for its id.
    pub fn insert(&self, node: &Node) -> Result<(), StorageError> {
        self.update(node.id, node.location)
    }

    /// Move the entry for `id` to `location`, inserting it if absent.
    pub fn update(&self, id: EntityId, location: Coord<f64>) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        inner.remove(id);
        inner.locations.insert(id, location);
        inner.tree.insert(IndexedNode { id, location });
        Ok(())
    }

    /// Drop the entry for `id`; returns whether one existed.
    pub fn remove(&self, id: EntityId) -> Result<bool, StorageError> {
        Ok(self.write()?.remove(id))
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.read()?.tree.size())
    }

    /// Whether no node is indexed.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    pub(crate) fn clear(&self) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        inner.tree = RTree::new();
        inner.locations.clear();
        Ok(())
    }

    /// Nodes within `max_distance_km` (default 100) of the given point,
    /// nearest first.
    ///
    /// A node exactly `max_distance_km` away is included.
    pub fn find_near(
        &self,
        nodes: &EntityStore<Node>,
        longitude: f64,
        latitude: f64,
        max_distance_km: Option<f64>,
    ) -> Result<Vec<Node>, StoreError> {
        let origin = Coord {
            x: longitude,
            y: latitude,
        };
        validate_location(origin)?;
        let max_distance = max_distance_km.unwrap_or(DEFAULT_NEAR_DISTANCE_KM);
        check(
            "max_distance_km",
            max_distance,
            max_distance >= 0.0,
            "[0, inf)",
        )?;

        let mut hits: Vec<(f64, EntityId)> = {
            let inner = self.read()?;
            let within = |entry: &IndexedNode| {
                let distance = haversine_km(origin, entry.location);
                (distance <= max_distance).then_some((distance, entry.id))
            };
            match near_envelope(origin, max_distance) {
                Some(envelope) => inner
                    .tree
                    .locate_in_envelope_intersecting(&envelope)
                    .filter_map(within)
                    .collect(),
                None => {
                    warn!(
                        "find_near envelope around ({longitude}, {latitude}) with radius \
                         {max_distance} km reaches a pole or the anti-meridian; scanning all \
                         {} node(s)",
                        inner.tree.size()
                    );
                    inner.tree.iter().filter_map(within).collect()
                }
            }
        };
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let ids: Vec<EntityId> = hits.iter().map(|(_, id)| *id).collect();
        resolve_in_order(nodes, &ids)
    }

    /// Nodes inside the box spanned by the two corners, boundary included,
    /// ordered by id.
    ///
    /// Boxes crossing the anti-meridian are rejected; split them in two.
    pub fn find_within_bounding_box(
        &self,
        nodes: &EntityStore<Node>,
        bottom_left: Coord<f64>,
        top_right: Coord<f64>,
    ) -> Result<Vec<Node>, StoreError> {
        validate_location(bottom_left)?;
        validate_location(top_right)?;
        if bottom_left.x > top_right.x {
            return Err(ValidationError::AntimeridianBoundingBox {
                bottom_left: bottom_left.x,
                top_right: top_right.x,
            }
            .into());
        }
        if bottom_left.y > top_right.y {
            return Err(ValidationError::InvertedBoundingBox {
                bottom_left: bottom_left.y,
                top_right: top_right.y,
            }
            .into());
        }

        let envelope = AABB::from_corners(
            [bottom_left.x, bottom_left.y],
            [top_right.x, top_right.y],
        );
        let mut ids: Vec<EntityId> = self
            .read()?
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.id)
            .collect();
        ids.sort_unstable();

        resolve_in_order(nodes, &ids)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StorageError> {
        self.inner.read().map_err(|_| StorageError::Poisoned {
            resource: "geo index",
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StorageError> {
        self.inner.write().map_err(|_| StorageError::Poisoned {
            resource: "geo index",
        })
    }

    /// Poison the lock by panicking while holding it.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let inner = Arc::clone(&self.inner);
        let outcome = std::thread::spawn(move || {
            let _guard = inner.write().expect("acquire geo index lock");
            panic!("geo index writer failed");
        })
        .join();
        assert!(outcome.is_err());
        assert!(self.inner.is_poisoned());
    }
}

/// Degree envelope enclosing every point within `radius_km` of `origin`, or
/// `None` when the circle reaches a pole or crosses the anti-meridian.
fn near_envelope(origin: Coord<f64>, radius_km: f64) -> Option<AABB<[f64; 2]>> {
    let angular = radius_km / EARTH_RADIUS_KM;
    let d_lat = angular.to_degrees() + ENVELOPE_PADDING_DEG;
    let min_lat = origin.y - d_lat;
    let max_lat = origin.y + d_lat;
    if min_lat <= -90.0 || max_lat >= 90.0 {
        return None;
    }

    let ratio = angular.sin() / origin.y.to_radians().cos();
    if ratio.is_nan() || ratio >= 1.0 {
        return None;
    }
    let d_lon = ratio.asin().to_degrees() + ENVELOPE_PADDING_DEG;
    let min_lon = origin.x - d_lon;
    let max_lon = origin.x + d_lon;
    if min_lon < -180.0 || max_lon > 180.0 {
        return None;
    }

    Some(AABB::from_corners([min_lon, min_lat], [max_lon, max_lat]))
}

/// Load `ids` from the node store, keeping their order and skipping any
/// removed since the index was read.
fn resolve_in_order(nodes: &EntityStore<Node>, ids: &[EntityId]) -> Result<Vec<Node>, StoreError> {
    let mut found = nodes.find_many(ids)?;
    Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
}
