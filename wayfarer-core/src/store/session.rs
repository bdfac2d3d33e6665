//! Explicit storage handle threaded through every store.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use log::info;
use rusqlite::Connection;

use super::schema::initialise_schema;
use crate::error::{StorageError, StoreError};

/// Shared handle to the SQLite database backing all three collections.
///
/// Cloning is cheap; clones share one connection. Opening and closing is
/// owned by whoever bootstraps the process: the session is closed when the
/// last clone is dropped.
#[derive(Clone)]
pub struct Session {
    connection: Arc<Mutex<Connection>>,
    location: Option<PathBuf>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let session = Self::from_connection(connection, Some(path.to_path_buf()))?;
        info!("opened wayfarer database at {}", path.display());
        Ok(session)
    }

    /// Open a private in-memory database, mostly useful in tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let connection = Connection::open_in_memory().map_err(|source| StorageError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let session = Self::from_connection(connection, None)?;
        info!("opened in-memory wayfarer database");
        Ok(session)
    }

    /// Location of the database file, or `None` for in-memory sessions.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn from_connection(
        mut connection: Connection,
        location: Option<PathBuf>,
    ) -> Result<Self, StorageError> {
        initialise_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            location,
        })
    }

    /// Run `operation` with exclusive access to the connection.
    pub(crate) fn with_connection<T>(
        &self,
        operation: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| StorageError::Poisoned { resource: "session" })?;
        operation(&mut connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    fn reopening_a_file_keeps_the_schema() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("wayfarer.db");
        drop(Session::open(&path).expect("first open"));
        let session = Session::open(&path).expect("second open");
        assert_eq!(session.location(), Some(path.as_path()));
    }

    #[rstest]
    fn missing_parent_directory_reports_the_path() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("missing").join("wayfarer.db");
        let err = Session::open(&path).expect_err("open should fail");
        assert!(matches!(err, StorageError::Open { path: reported, .. } if reported == path));
    }

    #[rstest]
    fn clones_share_one_connection() {
        let session = Session::open_in_memory().expect("open session");
        let clone = session.clone();
        session
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO nodes (id, document) VALUES ('x', '{}')",
                    [],
                )
                .map_err(StoreError::sqlite("seed"))
            })
            .expect("insert row");
        let count: i64 = clone
            .with_connection(|conn| {
                conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
                    .map_err(StoreError::sqlite("count"))
            })
            .expect("count rows");
        assert_eq!(count, 1);
    }
}
