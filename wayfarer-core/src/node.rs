//! Geographic points.

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::{
    entity::{EntityId, EntityKind, Tags, Timestamps},
    error::ValidationError,
    geo_index::haversine_km,
    store::{AmendOptions, Entity, EntityPatch},
};

/// A single geographic point.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`. The location
/// is the only required field; every other measurement is optional and
/// validated independently.
///
/// # Examples
/// ```
/// use wayfarer_core::{Node, NodeFields};
///
/// # fn main() -> Result<(), wayfarer_core::ValidationError> {
/// let node = Node::create(NodeFields::at(-1.47, 53.38).with_tag("name", "Surrey Street"))?;
/// assert_eq!(node.location.x, -1.47);
/// assert_eq!(node.tags.get("name").map(String::as_str), Some("Surrey Street"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier.
    pub id: EntityId,
    /// Position, persisted as a `[longitude, latitude]` pair.
    #[serde(with = "lon_lat")]
    pub location: Coord<f64>,
    /// Height above sea level in metres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Horizontal accuracy in metres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Direction of travel in degrees clockwise from north.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Ground speed in metres per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Free-form annotations.
    #[serde(default)]
    pub tags: Tags,
    /// Store-managed creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Node {
    /// Construct and validate an unsaved node.
    pub fn create(fields: NodeFields) -> Result<Self, ValidationError> {
        let location = fields
            .location
            .ok_or(ValidationError::MissingField { field: "location" })?;
        let node = Self {
            id: EntityId::new(),
            location,
            altitude: fields.altitude,
            accuracy: fields.accuracy,
            heading: fields.heading,
            speed: fields.speed,
            tags: fields.tags,
            timestamps: Timestamps::default(),
        };
        Entity::validate(&node)?;
        Ok(node)
    }

    /// Great-circle distance to another node in kilometres.
    ///
    /// # Examples
    /// ```
    /// use wayfarer_core::{Node, NodeFields};
    ///
    /// # fn main() -> Result<(), wayfarer_core::ValidationError> {
    /// let origin = Node::create(NodeFields::at(0.0, 0.0))?;
    /// let other = Node::create(NodeFields::at(1.0, 1.0))?;
    /// assert_eq!(origin.distance_km_to(&other).floor(), 157.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn distance_km_to(&self, other: &Self) -> f64 {
        haversine_km(self.location, other.location)
    }
}

impl Entity for Node {
    const KIND: EntityKind = EntityKind::Node;
    type Fields = NodeFields;
    type Patch = NodePatch;

    fn create(fields: Self::Fields) -> Result<Self, ValidationError> {
        Self::create(fields)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_location(self.location)?;
        validate_measurements(self.altitude, self.accuracy, self.heading, self.speed)
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

    fn location(&self) -> Option<Coord<f64>> {
        Some(self.location)
    }
}

/// Input for [`Node::create`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFields {
    /// Required position.
    pub location: Option<Coord<f64>>,
    /// Optional altitude in metres.
    pub altitude: Option<f64>,
    /// Optional accuracy in metres.
    pub accuracy: Option<f64>,
    /// Optional heading in degrees.
    pub heading: Option<f64>,
    /// Optional speed.
    pub speed: Option<f64>,
    /// Initial tags.
    pub tags: Tags,
}

impl NodeFields {
    /// Start from a `(longitude, latitude)` position.
    pub fn at(longitude: f64, latitude: f64) -> Self {
        Self {
            location: Some(Coord {
                x: longitude,
                y: latitude,
            }),
            ..Self::default()
        }
    }

    /// Set the altitude.
    #[must_use]
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Set the accuracy.
    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Set the heading.
    #[must_use]
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Set the speed.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Add a tag, replacing any previous value for the key.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Partial update applied by `amend`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    /// Replacement position.
    pub location: Option<Coord<f64>>,
    /// Replacement altitude.
    pub altitude: Option<f64>,
    /// Replacement accuracy.
    pub accuracy: Option<f64>,
    /// Replacement heading.
    pub heading: Option<f64>,
    /// Replacement speed.
    pub speed: Option<f64>,
    /// Replacement (or merged, see [`AmendOptions`]) tags.
    pub tags: Option<Tags>,
}

impl NodePatch {
    /// Patch that only moves the node.
    pub fn relocate(longitude: f64, latitude: f64) -> Self {
        Self {
            location: Some(Coord {
                x: longitude,
                y: latitude,
            }),
            ..Self::default()
        }
    }
}

impl EntityPatch<Node> for NodePatch {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(location) = self.location {
            validate_location(location)?;
        }
        validate_measurements(self.altitude, self.accuracy, self.heading, self.speed)
    }

    fn apply(&self, node: &mut Node, options: &AmendOptions) {
        if let Some(location) = self.location {
            node.location = location;
        }
        if let Some(altitude) = self.altitude {
            node.altitude = Some(altitude);
        }
        if let Some(accuracy) = self.accuracy {
            node.accuracy = Some(accuracy);
        }
        if let Some(heading) = self.heading {
            node.heading = Some(heading);
        }
        if let Some(speed) = self.speed {
            node.speed = Some(speed);
        }
        if let Some(tags) = &self.tags {
            options.apply_tags(&mut node.tags, tags);
        }
    }
}

pub(crate) fn validate_location(location: Coord<f64>) -> Result<(), ValidationError> {
    check(
        "longitude",
        location.x,
        (-180.0..=180.0).contains(&location.x),
        "[-180, 180]",
    )?;
    check(
        "latitude",
        location.y,
        (-90.0..=90.0).contains(&location.y),
        "[-90, 90]",
    )
}

fn validate_measurements(
    altitude: Option<f64>,
    accuracy: Option<f64>,
    heading: Option<f64>,
    speed: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = altitude {
        check(
            "altitude",
            value,
            value > -10_000.0 && value < 9_000.0,
            "(-10000, 9000)",
        )?;
    }
    if let Some(value) = accuracy {
        check("accuracy", value, (0.0..=1_000.0).contains(&value), "[0, 1000]")?;
    }
    if let Some(value) = heading {
        check("heading", value, (0.0..360.0).contains(&value), "[0, 360)")?;
    }
    if let Some(value) = speed {
        check("speed", value, value >= 0.0, "[0, inf)")?;
    }
    Ok(())
}

pub(crate) fn check(
    field: &'static str,
    value: f64,
    in_range: bool,
    range: &'static str,
) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { field, value });
    }
    if in_range {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            range,
        })
    }
}

mod lon_lat {
    use geo::Coord;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S>(location: &Coord<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        [location.x, location.y].serialize(serializer)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Coord<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let [x, y] = <[f64; 2]>::deserialize(deserializer)?;
        Ok(Coord { x, y })
    }
}
