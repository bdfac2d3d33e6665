//! Generic per-kind persistence over SQLite JSON documents.
//!
//! Each entity kind owns one table of `(id, document)` rows. An
//! [`EntityStore`] performs the CRUD operations for one kind and keeps the
//! shared [`GeoIndex`] in step with node writes before returning.
//!
//! Lookups by id validate the identifier first, so a malformed id is a
//! [`ValidationError`] and never reaches the database.

mod filter;
mod schema;
mod session;

use std::{collections::HashMap, fmt, marker::PhantomData};

use chrono::Utc;
use geo::Coord;
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use serde::{Serialize, de::DeserializeOwned};

pub use filter::{Filter, TagFilter};
pub use schema::{SCHEMA_VERSION, initialise_schema};
pub use session::Session;

use crate::{
    entity::{EntityId, EntityKind, IntoEntityId, Tags, Timestamps},
    error::{StorageError, StoreError, ValidationError},
    geo_index::GeoIndex,
};

/// SQLite limits bound parameters per statement to 999 by default. Batched
/// lookups chunk their `IN` lists to remain below that ceiling.
const SQLITE_MAX_VARIABLE_NUMBER: usize = 999;

/// A persisted entity kind.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection the kind is stored in.
    const KIND: EntityKind;
    /// Input accepted by [`Entity::create`].
    type Fields;
    /// Partial update accepted by `amend`.
    type Patch: EntityPatch<Self>;

    /// Construct and validate an unsaved instance.
    fn create(fields: Self::Fields) -> Result<Self, ValidationError>;
    /// Check every field against its permitted range.
    fn validate(&self) -> Result<(), ValidationError>;
    /// Identifier assigned at construction.
    fn id(&self) -> EntityId;
    /// Free-form annotations.
    fn tags(&self) -> &Tags;
    /// Store-managed timestamps.
    fn timestamps_mut(&mut self) -> &mut Timestamps;
    /// Position to keep in the geo index, if the kind has one.
    fn location(&self) -> Option<Coord<f64>> {
        None
    }
}

/// A partial update for entity kind `E`.
pub trait EntityPatch<E> {
    /// Reject malformed patch values before the store is touched.
    fn validate(&self) -> Result<(), ValidationError>;
    /// Overwrite the fields present in the patch.
    fn apply(&self, entity: &mut E, options: &AmendOptions);
}

/// Options controlling how `amend` applies a patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmendOptions {
    /// Merge patch tags into the existing map instead of replacing it.
    pub merge_tags: bool,
}

impl AmendOptions {
    /// Replace or merge `patch` into `target` according to `merge_tags`.
    pub fn apply_tags(&self, target: &mut Tags, patch: &Tags) {
        if self.merge_tags {
            target.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
        } else {
            target.clone_from(patch);
        }
    }
}

/// CRUD operations for one entity kind.
///
/// # Examples
/// ```
/// use wayfarer_core::{GeoIndex, Node, NodeFields, Session, EntityStore};
///
/// # fn main() -> Result<(), wayfarer_core::StoreError> {
/// let session = Session::open_in_memory()?;
/// let nodes: EntityStore<Node> = EntityStore::new(session, GeoIndex::new());
/// let node = nodes.save(nodes.create(NodeFields::at(5.0, 5.0))?)?;
/// assert_eq!(nodes.get_by_id(node.id)?, node);
/// assert_eq!(nodes.delete(node.id)?, 1);
/// assert_eq!(nodes.delete(node.id)?, 0);
/// # Ok(())
/// # }
/// ```
pub struct EntityStore<K> {
    session: Session,
    index: GeoIndex,
    kind: PhantomData<fn() -> K>,
}

impl<K> Clone for EntityStore<K> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            index: self.index.clone(),
            kind: PhantomData,
        }
    }
}

impl<K: Entity> fmt::Debug for EntityStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("kind", &K::KIND)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<K: Entity> EntityStore<K> {
    /// Bind a store to a session. Node writes are mirrored into `index`.
    pub fn new(session: Session, index: GeoIndex) -> Self {
        Self {
            session,
            index,
            kind: PhantomData,
        }
    }

    /// Construct and validate an instance without persisting it.
    pub fn create(&self, fields: K::Fields) -> Result<K, StoreError> {
        Ok(K::create(fields)?)
    }

    /// Insert or replace the entity by id, stamping `created` on first save.
    pub fn save(&self, mut entity: K) -> Result<K, StoreError> {
        entity.validate()?;
        entity.timestamps_mut().record_save(Utc::now());
        self.session.with_connection(|connection| {
            let transaction = connection
                .transaction()
                .map_err(StoreError::sqlite("begin save transaction"))?;
            write_document(&transaction, &entity)?;
            self.sync_index(&entity)?;
            transaction
                .commit()
                .map_err(StoreError::sqlite("commit save transaction"))
        })?;
        debug!("saved {} {}", K::KIND, entity.id());
        Ok(entity)
    }

    /// Every entity of this kind, in no particular order.
    pub fn get_all(&self) -> Result<Vec<K>, StoreError> {
        self.session.with_connection(|connection| load_all::<K>(connection))
    }

    /// Fetch one entity, or [`StoreError::NotFound`].
    pub fn get_by_id(&self, id: impl IntoEntityId) -> Result<K, StoreError> {
        let id = id.into_entity_id()?;
        self.session
            .with_connection(|connection| load_one::<K>(connection, id))?
            .ok_or(StoreError::NotFound { kind: K::KIND, id })
    }

    /// Entities whose stored document matches every predicate of `filter`.
    pub fn query(&self, filter: &Filter) -> Result<Vec<K>, StoreError> {
        filter.validate()?;
        self.session.with_connection(|connection| {
            let sql = format!("SELECT id, document FROM {}", K::KIND.table());
            let mut statement = connection
                .prepare_cached(&sql)
                .map_err(StoreError::sqlite("prepare query"))?;
            let mut rows = statement.query([]).map_err(StoreError::sqlite("run query"))?;
            let mut matches = Vec::new();
            while let Some(row) = rows.next().map_err(StoreError::sqlite("read query row"))? {
                let (id, document) = read_row(row)?;
                let value: serde_json::Value =
                    serde_json::from_str(&document).map_err(|source| corrupt::<K>(&id, source))?;
                if filter.matches(&value) {
                    matches.push(
                        serde_json::from_value(value).map_err(|source| corrupt::<K>(&id, source))?,
                    );
                }
            }
            Ok(matches)
        })
    }

    /// Number of entities matching `filter`.
    pub fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        if filter.is_empty() {
            return self.count_with_tag(&TagFilter::new());
        }
        Ok(self.query(filter)?.len() as u64)
    }

    /// Number of entities whose tags satisfy `filter`.
    pub fn count_with_tag(&self, filter: &TagFilter) -> Result<u64, StoreError> {
        let (clause, params) = filter.to_sql();
        let sql = format!(
            "SELECT COUNT(*) FROM {} AS e WHERE {clause}",
            K::KIND.table()
        );
        let count: i64 = self.session.with_connection(|connection| {
            connection
                .prepare_cached(&sql)
                .and_then(|mut statement| {
                    statement.query_row(params_from_iter(params.iter()), |row| row.get(0))
                })
                .map_err(StoreError::sqlite("count with tag"))
        })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Apply `patch` to the entity with `id`; returns 0 or 1.
    pub fn amend(
        &self,
        id: impl IntoEntityId,
        patch: &K::Patch,
        options: &AmendOptions,
    ) -> Result<u64, StoreError> {
        let id = id.into_entity_id()?;
        patch.validate()?;
        self.modify(id, |entity| {
            patch.apply(entity, options);
            entity.validate()
        })
    }

    /// Remove the entity with `id`; returns 0 or 1.
    ///
    /// References held by other entities are left dangling.
    pub fn delete(&self, id: impl IntoEntityId) -> Result<u64, StoreError> {
        let id = id.into_entity_id()?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", K::KIND.table());
        let deleted = self.session.with_connection(|connection| {
            let transaction = connection
                .transaction()
                .map_err(StoreError::sqlite("begin delete transaction"))?;
            let deleted = transaction
                .prepare_cached(&sql)
                .and_then(|mut statement| statement.execute([id.to_string()]))
                .map_err(StoreError::sqlite("delete document"))?;
            if K::KIND == EntityKind::Node {
                self.index.remove(id)?;
            }
            transaction
                .commit()
                .map_err(StoreError::sqlite("commit delete transaction"))?;
            Ok(deleted)
        })?;
        debug!("deleted {} {id}: {deleted} row(s)", K::KIND);
        Ok(deleted as u64)
    }

    /// Remove every entity of this kind. Reserved for bootstrap and tests.
    pub fn clear(&self) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {}", K::KIND.table());
        let removed = self.session.with_connection(|connection| {
            let transaction = connection
                .transaction()
                .map_err(StoreError::sqlite("begin clear transaction"))?;
            let removed = transaction
                .execute(&sql, [])
                .map_err(StoreError::sqlite("clear collection"))?;
            if K::KIND == EntityKind::Node {
                self.index.clear()?;
            }
            transaction
                .commit()
                .map_err(StoreError::sqlite("commit clear transaction"))?;
            Ok(removed)
        })?;
        info!("cleared {removed} {} document(s)", K::KIND);
        Ok(())
    }

    /// Read, mutate and write back one document inside an immediate
    /// transaction. Returns 0 when no entity has `id`.
    ///
    /// The geo index is updated before the commit, so an index failure
    /// rolls the document write back.
    pub(crate) fn modify(
        &self,
        id: EntityId,
        mutate: impl FnOnce(&mut K) -> Result<(), ValidationError>,
    ) -> Result<u64, StoreError> {
        let affected = self.session.with_connection(|connection| {
            let transaction = connection
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::sqlite("begin amend transaction"))?;
            let Some(mut entity) = load_one::<K>(&transaction, id)? else {
                return Ok(0);
            };
            mutate(&mut entity)?;
            entity.timestamps_mut().record_update(Utc::now());
            write_document(&transaction, &entity)?;
            self.sync_index(&entity)?;
            transaction
                .commit()
                .map_err(StoreError::sqlite("commit amend transaction"))?;
            Ok(1)
        })?;
        debug!("amended {} {id}: {affected} document(s)", K::KIND);
        Ok(affected)
    }

    /// Fetch every existing entity among `ids`, keyed by id.
    pub(crate) fn find_many(&self, ids: &[EntityId]) -> Result<HashMap<EntityId, K>, StoreError> {
        let mut found = HashMap::with_capacity(ids.len());
        if ids.is_empty() {
            return Ok(found);
        }
        self.session.with_connection(|connection| {
            for chunk in ids.chunks(SQLITE_MAX_VARIABLE_NUMBER) {
                for entity in load_chunk::<K>(connection, chunk)? {
                    found.insert(entity.id(), entity);
                }
            }
            Ok(())
        })?;
        Ok(found)
    }

    /// Entities whose id array at `$.{field}` contains `id`.
    pub(crate) fn find_referencing(
        &self,
        field: &'static str,
        id: EntityId,
    ) -> Result<Vec<K>, StoreError> {
        let sql = format!(
            "SELECT e.id, e.document FROM {} AS e WHERE EXISTS (
                SELECT 1 FROM json_each(e.document, ?1) AS r WHERE r.value = ?2
            )",
            K::KIND.table()
        );
        self.session.with_connection(|connection| {
            let mut statement = connection
                .prepare_cached(&sql)
                .map_err(StoreError::sqlite("prepare reference scan"))?;
            let mut rows = statement
                .query(params![format!("$.{field}"), id.to_string()])
                .map_err(StoreError::sqlite("run reference scan"))?;
            decode_rows(&mut rows)
        })
    }

    /// Tag maps of every entity, without decoding the rest of each document.
    pub(crate) fn all_tags(&self) -> Result<Vec<Tags>, StoreError> {
        let sql = format!(
            "SELECT id, coalesce(json_extract(document, '$.tags'), '{{}}') FROM {}",
            K::KIND.table()
        );
        self.session.with_connection(|connection| {
            let mut statement = connection
                .prepare_cached(&sql)
                .map_err(StoreError::sqlite("prepare tag scan"))?;
            let mut rows = statement.query([]).map_err(StoreError::sqlite("run tag scan"))?;
            let mut tags = Vec::new();
            while let Some(row) = rows.next().map_err(StoreError::sqlite("read tag row"))? {
                let (id, json) = read_row(row)?;
                tags.push(serde_json::from_str(&json).map_err(|source| corrupt::<K>(&id, source))?);
            }
            Ok(tags)
        })
    }

    /// Run `f` over every stored entity while holding the session, so no
    /// write can interleave.
    pub(crate) fn with_snapshot<T>(
        &self,
        f: impl FnOnce(Vec<K>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.session
            .with_connection(|connection| f(load_all(connection)?))
    }

    fn sync_index(&self, entity: &K) -> Result<(), StoreError> {
        if let Some(location) = entity.location() {
            self.index.update(entity.id(), location)?;
        }
        Ok(())
    }
}

fn write_document<K: Entity>(connection: &Connection, entity: &K) -> Result<(), StoreError> {
    let id = entity.id();
    let document = serde_json::to_string(entity).map_err(|source| StorageError::EncodeDocument {
        kind: K::KIND,
        id,
        source,
    })?;
    let sql = format!(
        "INSERT INTO {} (id, document) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET document = excluded.document",
        K::KIND.table()
    );
    connection
        .prepare_cached(&sql)
        .and_then(|mut statement| statement.execute(params![id.to_string(), document]))
        .map(|_| ())
        .map_err(StoreError::sqlite("write document"))
}

fn load_one<K: Entity>(connection: &Connection, id: EntityId) -> Result<Option<K>, StoreError> {
    let key = id.to_string();
    let sql = format!("SELECT document FROM {} WHERE id = ?1", K::KIND.table());
    let document: Option<String> = connection
        .prepare_cached(&sql)
        .and_then(|mut statement| statement.query_row([&key], |row| row.get(0)).optional())
        .map_err(StoreError::sqlite("load document"))?;
    document
        .map(|document| decode::<K>(&key, &document))
        .transpose()
}

fn load_all<K: Entity>(connection: &Connection) -> Result<Vec<K>, StoreError> {
    let sql = format!("SELECT id, document FROM {}", K::KIND.table());
    let mut statement = connection
        .prepare_cached(&sql)
        .map_err(StoreError::sqlite("prepare scan"))?;
    let mut rows = statement.query([]).map_err(StoreError::sqlite("run scan"))?;
    decode_rows(&mut rows)
}

fn load_chunk<K: Entity>(connection: &Connection, ids: &[EntityId]) -> Result<Vec<K>, StoreError> {
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT id, document FROM {} WHERE id IN ({placeholders})",
        K::KIND.table()
    );
    let keys: Vec<String> = ids.iter().map(ToString::to_string).collect();
    let mut statement = connection
        .prepare(&sql)
        .map_err(StoreError::sqlite("prepare batch load"))?;
    let mut rows = statement
        .query(params_from_iter(keys.iter()))
        .map_err(StoreError::sqlite("run batch load"))?;
    decode_rows(&mut rows)
}

fn decode_rows<K: Entity>(rows: &mut rusqlite::Rows<'_>) -> Result<Vec<K>, StoreError> {
    let mut entities = Vec::new();
    while let Some(row) = rows.next().map_err(StoreError::sqlite("read row"))? {
        let (id, document) = read_row(row)?;
        entities.push(decode(&id, &document)?);
    }
    Ok(entities)
}

fn read_row(row: &rusqlite::Row<'_>) -> Result<(String, String), StoreError> {
    let id: String = row.get(0).map_err(StoreError::sqlite("read id column"))?;
    let document: String = row.get(1).map_err(StoreError::sqlite("read document column"))?;
    Ok((id, document))
}

fn decode<K: Entity>(id: &str, document: &str) -> Result<K, StoreError> {
    serde_json::from_str(document).map_err(|source| corrupt::<K>(id, source))
}

fn corrupt<K: Entity>(id: &str, source: serde_json::Error) -> StoreError {
    StorageError::CorruptDocument {
        kind: K::KIND,
        id: id.to_owned(),
        source,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        node::{Node, NodeFields, NodePatch},
        way::{Way, WayFields},
    };
    use rstest::{fixture, rstest};

    #[fixture]
    fn session() -> Session {
        Session::open_in_memory().expect("open session")
    }

    #[fixture]
    fn nodes(session: Session) -> EntityStore<Node> {
        EntityStore::new(session, GeoIndex::new())
    }

    fn tagged(key: &str, value: &str) -> Tags {
        Tags::from([(key.to_owned(), value.to_owned())])
    }

    #[rstest]
    fn malformed_id_is_a_validation_error(nodes: EntityStore<Node>) {
        let err = nodes.get_by_id("not-an-id").expect_err("lookup should fail");
        assert_eq!(err.status_code(), 400);
    }

    #[rstest]
    fn unknown_id_is_not_found(nodes: EntityStore<Node>) {
        let id = EntityId::new();
        let err = nodes.get_by_id(id).expect_err("lookup should fail");
        assert!(matches!(err, StoreError::NotFound { kind: EntityKind::Node, id: missing } if missing == id));
    }

    #[rstest]
    fn save_sets_created_once(nodes: EntityStore<Node>) {
        let node = nodes
            .save(nodes.create(NodeFields::at(1.0, 2.0)).expect("create"))
            .expect("save");
        let created = node.timestamps.created;
        let resaved = nodes.save(node).expect("save again");
        assert_eq!(resaved.timestamps.created, created);
        assert!(resaved.timestamps.updated > created);
        assert_eq!(nodes.get_all().expect("scan").len(), 1);
    }

    #[rstest]
    fn save_rejects_invalid_entities(nodes: EntityStore<Node>) {
        let mut node = nodes.create(NodeFields::at(1.0, 2.0)).expect("create");
        node.location.y = 360.0;
        assert!(matches!(
            nodes.save(node),
            Err(StoreError::Validation(ValidationError::OutOfRange { field: "latitude", .. }))
        ));
        assert!(nodes.get_all().expect("scan").is_empty());
    }

    #[rstest]
    fn amend_reports_zero_or_one(nodes: EntityStore<Node>) {
        let patch = NodePatch::relocate(3.0, 4.0);
        let options = AmendOptions::default();
        assert_eq!(nodes.amend(EntityId::new(), &patch, &options).expect("amend"), 0);

        let node = nodes
            .save(nodes.create(NodeFields::at(1.0, 2.0)).expect("create"))
            .expect("save");
        assert_eq!(nodes.amend(node.id, &patch, &options).expect("amend"), 1);
        let amended = nodes.get_by_id(node.id).expect("reload");
        assert_eq!(amended.location, Coord { x: 3.0, y: 4.0 });
        assert!(amended.timestamps.updated > node.timestamps.updated);
    }

    #[rstest]
    fn invalid_patch_is_rejected_before_lookup(nodes: EntityStore<Node>) {
        let patch = NodePatch::relocate(0.0, 360.0);
        let err = nodes
            .amend(EntityId::new(), &patch, &AmendOptions::default())
            .expect_err("patch should fail");
        assert_eq!(err.status_code(), 400);
    }

    #[rstest]
    fn query_matches_nested_fields(session: Session) {
        let ways: EntityStore<Way> = EntityStore::new(session, GeoIndex::new());
        let primary = ways
            .save(Way::create(WayFields::default().with_tag("highway", "primary")).expect("way"))
            .expect("save");
        ways.save(Way::create(WayFields::default().with_tag("highway", "service")).expect("way"))
            .expect("save");

        let found = ways
            .query(&Filter::new().field("tags.highway", "primary"))
            .expect("query");
        assert_eq!(found, vec![primary]);
        assert_eq!(ways.count(&Filter::new()).expect("count"), 2);
    }

    #[rstest]
    fn count_with_tag_runs_in_sqlite(nodes: EntityStore<Node>) {
        for (key, value) in [("amenity", "cafe"), ("amenity", "bench"), ("shop", "bakery")] {
            let fields = NodeFields::at(0.0, 0.0).with_tag(key, value);
            nodes.save(nodes.create(fields).expect("create")).expect("save");
        }
        assert_eq!(nodes.count_with_tag(&TagFilter::new().key("amenity")).expect("count"), 2);
        assert_eq!(
            nodes
                .count_with_tag(&TagFilter::new().tag("amenity", "cafe"))
                .expect("count"),
            1
        );
        assert_eq!(nodes.count_with_tag(&TagFilter::new()).expect("count"), 3);
    }

    #[rstest]
    #[case(TagFilter::new().key("maxspeed"), 1)]
    #[case(TagFilter::new().tag("highway", "primary"), 1)]
    #[case(TagFilter::new().tag("highway", "service"), 0)]
    #[case(TagFilter::new().key("name"), 0)]
    #[case(TagFilter::new().tag("highway", "primary").key("maxspeed"), 1)]
    #[case(TagFilter::new().tag("highway", "primary").key("name"), 0)]
    fn tag_filters_check_presence_and_values(
        session: Session,
        #[case] filter: TagFilter,
        #[case] expected: u64,
    ) {
        let ways: EntityStore<Way> = EntityStore::new(session, GeoIndex::new());
        let fields = WayFields::default()
            .with_tag("highway", "primary")
            .with_tag("maxspeed", "30");
        ways.save(Way::create(fields).expect("way")).expect("save");
        ways.save(Way::create(WayFields::default()).expect("way"))
            .expect("save");
        assert_eq!(ways.count_with_tag(&filter).expect("count"), expected);
    }

    #[rstest]
    fn merge_tags_keeps_existing_keys(nodes: EntityStore<Node>) {
        let node = nodes
            .save(
                nodes
                    .create(NodeFields::at(0.0, 0.0).with_tag("name", "Quay"))
                    .expect("create"),
            )
            .expect("save");
        let patch = NodePatch {
            tags: Some(tagged("amenity", "bench")),
            ..NodePatch::default()
        };
        nodes
            .amend(node.id, &patch, &AmendOptions { merge_tags: true })
            .expect("amend");
        let tags = nodes.get_by_id(node.id).expect("reload").tags;
        assert_eq!(tags.len(), 2);
    }

    #[rstest]
    fn find_many_spans_chunks(nodes: EntityStore<Node>) {
        let mut ids = Vec::new();
        for _ in 0..(SQLITE_MAX_VARIABLE_NUMBER + 5) {
            let node = nodes
                .save(nodes.create(NodeFields::at(0.0, 0.0)).expect("create"))
                .expect("save");
            ids.push(node.id);
        }
        ids.push(EntityId::new());
        let found = nodes.find_many(&ids).expect("batch load");
        assert_eq!(found.len(), SQLITE_MAX_VARIABLE_NUMBER + 5);
    }

    #[rstest]
    fn corrupt_documents_surface_as_storage_errors(session: Session) {
        let nodes: EntityStore<Node> = EntityStore::new(session.clone(), GeoIndex::new());
        let id = EntityId::new();
        session
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO nodes (id, document) VALUES (?1, '{\"id\": 3}')",
                    [id.to_string()],
                )
                .map_err(StoreError::sqlite("seed"))
            })
            .expect("seed corrupt row");
        let err = nodes.get_by_id(id).expect_err("decode should fail");
        assert_eq!(err.status_code(), 500);
    }

    #[rstest]
    fn failed_index_update_rolls_back_save(nodes: EntityStore<Node>) {
        nodes.index.poison();
        let err = nodes
            .save(nodes.create(NodeFields::at(1.0, 1.0)).expect("create"))
            .expect_err("poisoned index");
        assert!(matches!(
            err,
            StoreError::Storage(StorageError::Poisoned { resource: "geo index" })
        ));
        assert!(nodes.get_all().expect("scan").is_empty());
    }

    #[rstest]
    fn failed_index_update_rolls_back_amend(nodes: EntityStore<Node>) {
        let node = nodes
            .save(nodes.create(NodeFields::at(1.0, 1.0)).expect("create"))
            .expect("save");
        nodes.index.poison();
        let err = nodes
            .amend(node.id, &NodePatch::relocate(2.0, 2.0), &AmendOptions::default())
            .expect_err("poisoned index");
        assert_eq!(err.status_code(), 500);
        assert_eq!(nodes.get_by_id(node.id).expect("reload"), node);
    }

    #[rstest]
    fn failed_index_update_rolls_back_delete(nodes: EntityStore<Node>) {
        let node = nodes
            .save(nodes.create(NodeFields::at(1.0, 1.0)).expect("create"))
            .expect("save");
        nodes.index.poison();
        nodes.delete(node.id).expect_err("poisoned index");
        assert_eq!(nodes.get_by_id(node.id).expect("reload"), node);
    }

    #[rstest]
    fn clear_empties_the_collection(nodes: EntityStore<Node>) {
        nodes
            .save(nodes.create(NodeFields::at(0.0, 0.0)).expect("create"))
            .expect("save");
        nodes.clear().expect("clear");
        assert!(nodes.get_all().expect("scan").is_empty());
    }
}
