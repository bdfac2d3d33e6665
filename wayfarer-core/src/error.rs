//! Error taxonomy shared by every store operation.
//!
//! Validation failures are detected before any storage call, `NotFound` is
//! only produced after a real lookup, and storage failures are always
//! propagated. [`ErrorResponse`] is the `{status_code, description}` shape a
//! request dispatcher forwards without needing domain knowledge.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{EntityId, EntityKind};

/// Malformed input rejected before the store is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The identifier is not a well-formed entity id.
    #[error("malformed entity id {value:?}")]
    MalformedId {
        /// The rejected input.
        value: String,
    },
    /// A required field was not supplied.
    #[error("missing required field `{field}`")]
    MissingField {
        /// Name of the absent field.
        field: &'static str,
    },
    /// A numeric field was NaN or infinite.
    #[error("`{field}` must be a finite number, got {value}")]
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// A numeric field fell outside its permitted range.
    #[error("`{field}` must be within {range}, got {value}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
        /// Human-readable description of the permitted range.
        range: &'static str,
    },
    /// A way would exceed the maximum number of node references.
    #[error("a way may reference at most {limit} nodes")]
    TooManyNodes {
        /// Maximum number of node references.
        limit: usize,
    },
    /// The bounding box crosses the anti-meridian.
    #[error(
        "bounding box crosses the anti-meridian (bottom-left longitude {bottom_left} > \
         top-right longitude {top_right}); split it into two boxes"
    )]
    AntimeridianBoundingBox {
        /// Longitude of the bottom-left corner.
        bottom_left: f64,
        /// Longitude of the top-right corner.
        top_right: f64,
    },
    /// The bounding box has its latitudes reversed.
    #[error(
        "bounding box bottom-left latitude {bottom_left} exceeds top-right latitude {top_right}"
    )]
    InvertedBoundingBox {
        /// Latitude of the bottom-left corner.
        bottom_left: f64,
        /// Latitude of the top-right corner.
        top_right: f64,
    },
    /// An entity kind name was not recognised.
    #[error("unknown entity kind {value:?}; expected node, way or relation")]
    UnknownKind {
        /// The rejected input.
        value: String,
    },
    /// A query filter named an empty field path.
    #[error("filter field paths must not be empty")]
    EmptyFilterField,
}

/// The backing store failed to execute an operation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path:?}: {source}")]
    Open {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A statement failed while performing the named operation.
    #[error("SQLite failure during {operation}: {source}")]
    Sqlite {
        /// Short description of the failing step.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A persisted document could not be decoded.
    #[error("stored {kind} document {id} is corrupt: {source}")]
    CorruptDocument {
        /// Kind of the unreadable document.
        kind: EntityKind,
        /// Identifier column of the unreadable row.
        id: String,
        /// JSON decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// An entity could not be encoded for persistence.
    #[error("failed to encode {kind} {id}: {source}")]
    EncodeDocument {
        /// Kind of the entity being written.
        kind: EntityKind,
        /// Identifier of the entity being written.
        id: EntityId,
        /// JSON encoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// The database was created by an incompatible schema version.
    #[error("unsupported schema version {found}; supported version is {supported}")]
    UnsupportedSchemaVersion {
        /// Version recorded in the database.
        found: i64,
        /// Version understood by this build.
        supported: i64,
    },
    /// A shared lock was poisoned by a panicking holder.
    #[error("{resource} lock poisoned")]
    Poisoned {
        /// Which shared resource was poisoned.
        resource: &'static str,
    },
}

/// Every failure an entity store operation can report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input was malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A well-formed identifier matched no entity.
    #[error("no {kind} with id {id}")]
    NotFound {
        /// Kind that was looked up.
        kind: EntityKind,
        /// Identifier that was looked up.
        id: EntityId,
    },
    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StoreError {
    /// HTTP-style status for the error: 400, 404 or 500.
    ///
    /// # Examples
    /// ```
    /// use wayfarer_core::{StoreError, ValidationError};
    ///
    /// let err = StoreError::from(ValidationError::MissingField { field: "location" });
    /// assert_eq!(err.status_code(), 400);
    /// ```
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Storage(_) => 500,
        }
    }

    pub(crate) fn sqlite(operation: &'static str) -> impl Fn(rusqlite::Error) -> Self {
        move |source| Self::Storage(StorageError::Sqlite { operation, source })
    }
}

/// Wire-neutral error value forwarded by a request dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Human-readable explanation.
    pub description: String,
}

impl From<&StoreError> for ErrorResponse {
    fn from(error: &StoreError) -> Self {
        Self {
            status_code: error.status_code(),
            description: error.to_string(),
        }
    }
}

impl From<StoreError> for ErrorResponse {
    fn from(error: StoreError) -> Self {
        Self::from(&error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn validation_maps_to_bad_request() {
        let err = StoreError::from(ValidationError::MalformedId {
            value: "nope".into(),
        });
        let response = ErrorResponse::from(&err);
        assert_eq!(response.status_code, 400);
        assert!(response.description.contains("nope"));
    }

    #[rstest]
    fn not_found_maps_to_404() {
        let id = EntityId::new();
        let response = ErrorResponse::from(StoreError::NotFound {
            kind: EntityKind::Way,
            id,
        });
        assert_eq!(response.status_code, 404);
        assert_eq!(response.description, format!("no way with id {id}"));
    }

    #[rstest]
    fn storage_maps_to_server_error() {
        let err = StoreError::from(StorageError::Poisoned { resource: "session" });
        assert_eq!(err.status_code(), 500);
    }

    #[rstest]
    fn error_response_serialises_with_snake_case_fields() {
        let response = ErrorResponse {
            status_code: 404,
            description: "gone".into(),
        };
        let json = serde_json::to_value(&response).expect("serialise response");
        assert_eq!(json["status_code"], 404);
        assert_eq!(json["description"], "gone");
    }
}
