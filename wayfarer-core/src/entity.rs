//! Identity, tagging and timestamp primitives shared by every entity kind.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// OpenStreetMap-style free-form key/value annotations.
///
/// Keys are unique and ordered, so two equal tag maps always serialise to the
/// same bytes.
pub type Tags = BTreeMap<String, String>;

/// The three persisted entity kinds.
///
/// # Examples
/// ```
/// use wayfarer_core::EntityKind;
///
/// assert_eq!(EntityKind::Way.as_str(), "way");
/// assert_eq!("relation".parse::<EntityKind>(), Ok(EntityKind::Relation));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A geographic point.
    Node,
    /// A collection of node and way references.
    Way,
    /// A collection of heterogeneous members with roles.
    Relation,
}

impl EntityKind {
    /// Return the kind as a lowercase `&str`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }

    /// Name of the table holding documents of this kind.
    pub(crate) const fn table(self) -> &'static str {
        match self {
            Self::Node => "nodes",
            Self::Way => "ways",
            Self::Relation => "relations",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "node" => Ok(Self::Node),
            "way" => Ok(Self::Way),
            "relation" => Ok(Self::Relation),
            other => Err(ValidationError::UnknownKind {
                value: other.to_owned(),
            }),
        }
    }
}

/// Opaque unique identifier assigned when an entity is constructed.
///
/// The textual form is a hyphenated lowercase UUID. Strings that do not parse
/// as a UUID are rejected as malformed.
///
/// # Examples
/// ```
/// use wayfarer_core::EntityId;
///
/// let id = EntityId::new();
/// let parsed: EntityId = id.to_string().parse().expect("round trip");
/// assert_eq!(id, parsed);
/// assert!("not-an-id".parse::<EntityId>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier, reporting malformed input as a validation error.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        Uuid::try_parse(value)
            .map(Self)
            .map_err(|_| ValidationError::MalformedId {
                value: value.to_owned(),
            })
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for EntityId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Conversion accepted wherever an operation takes an identifier.
///
/// Request dispatchers hand over raw strings, while in-process callers
/// usually hold a typed [`EntityId`]; both go through the same validation.
pub trait IntoEntityId {
    /// Convert into a well-formed identifier.
    fn into_entity_id(self) -> Result<EntityId, ValidationError>;
}

impl IntoEntityId for EntityId {
    fn into_entity_id(self) -> Result<EntityId, ValidationError> {
        Ok(self)
    }
}

impl IntoEntityId for &EntityId {
    fn into_entity_id(self) -> Result<EntityId, ValidationError> {
        Ok(*self)
    }
}

impl IntoEntityId for &str {
    fn into_entity_id(self) -> Result<EntityId, ValidationError> {
        EntityId::parse(self)
    }
}

impl IntoEntityId for &String {
    fn into_entity_id(self) -> Result<EntityId, ValidationError> {
        EntityId::parse(self)
    }
}

impl IntoEntityId for String {
    fn into_entity_id(self) -> Result<EntityId, ValidationError> {
        EntityId::parse(&self)
    }
}

/// Creation and modification times stamped by the store.
///
/// Both remain `None` until the entity is first saved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Time of the first save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Time of the latest save or amendment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// Stamp a save: `created` is set once, `updated` always advances.
    pub(crate) fn record_save(&mut self, now: DateTime<Utc>) {
        let stamp = advance(self.updated, now);
        if self.created.is_none() {
            self.created = Some(stamp);
        }
        self.updated = Some(stamp);
    }

    /// Stamp an amendment, keeping `updated` strictly increasing.
    pub(crate) fn record_update(&mut self, now: DateTime<Utc>) {
        self.updated = Some(advance(self.updated, now));
    }
}

/// Return `now`, or one microsecond past `previous` when the clock has not
/// moved on.
fn advance(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prior) if now <= prior => prior + TimeDelta::microseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case("42")]
    #[case("5f1d7a3c9e0b4a2f8c6d1e0b")]
    #[case("zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz")]
    fn malformed_ids_are_rejected(#[case] raw: &str) {
        let err = EntityId::parse(raw).expect_err("malformed id should fail");
        assert_eq!(
            err,
            ValidationError::MalformedId {
                value: raw.to_owned()
            }
        );
    }

    #[rstest]
    fn ids_serialise_as_plain_strings() {
        let id = EntityId::new();
        let json = serde_json::to_string(&id).expect("serialise id");
        assert_eq!(json, format!("\"{id}\""));
    }

    #[rstest]
    #[case(EntityKind::Node)]
    #[case(EntityKind::Way)]
    #[case(EntityKind::Relation)]
    fn kinds_parse_from_their_names(#[case] kind: EntityKind) {
        assert_eq!(kind.as_str().parse::<EntityKind>(), Ok(kind));
    }

    #[rstest]
    fn updated_advances_even_when_clock_stalls() {
        let now = Utc::now();
        let mut stamps = Timestamps::default();
        stamps.record_save(now);
        stamps.record_update(now);
        let first = stamps.created.expect("created set");
        let second = stamps.updated.expect("updated set");
        assert!(second > first);
    }

    #[rstest]
    fn created_is_kept_on_later_saves() {
        let now = Utc::now();
        let mut stamps = Timestamps::default();
        stamps.record_save(now);
        stamps.record_save(now + TimeDelta::seconds(5));
        assert_eq!(stamps.created, Some(now));
        assert_eq!(stamps.updated, Some(now + TimeDelta::seconds(5)));
    }
}
