//! Table layout for the three entity collections.

use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::error::StorageError;

/// Version of the document table layout written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Create the collection tables and record the schema version.
///
/// Re-running against an initialised database is a no-op. A database stamped
/// with any other version is rejected; no migration path exists.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use wayfarer_core::store::initialise_schema;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create schema");
/// initialise_schema(&mut conn).expect("schema creation is idempotent");
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), StorageError> {
    let transaction = connection
        .transaction()
        .map_err(|source| StorageError::Sqlite {
            operation: "begin schema transaction",
            source,
        })?;

    create_collections(&transaction)?;
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| StorageError::Sqlite {
            operation: "commit schema transaction",
            source,
        })
}

fn create_collections(transaction: &Transaction<'_>) -> Result<(), StorageError> {
    run_migration_step(
        transaction,
        "create nodes",
        "CREATE TABLE IF NOT EXISTS nodes (
            id TEXT PRIMARY KEY,
            document TEXT NOT NULL CHECK (json_valid(document))
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "create ways",
        "CREATE TABLE IF NOT EXISTS ways (
            id TEXT PRIMARY KEY,
            document TEXT NOT NULL CHECK (json_valid(document))
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "create relations",
        "CREATE TABLE IF NOT EXISTS relations (
            id TEXT PRIMARY KEY,
            document TEXT NOT NULL CHECK (json_valid(document))
        ) WITHOUT ROWID",
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), StorageError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS wayfarer_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing: Option<i64> = transaction
        .query_row(
            "SELECT version FROM wayfarer_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| StorageError::Sqlite {
            operation: "read schema version",
            source,
        })?;

    match existing {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(StorageError::UnsupportedSchemaVersion {
            found,
            supported: SCHEMA_VERSION,
        }),
        None => transaction
            .execute(
                "INSERT INTO wayfarer_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| StorageError::Sqlite {
                operation: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    operation: &'static str,
    sql: &str,
) -> Result<(), StorageError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| StorageError::Sqlite { operation, source })
}
