//! `SQLite`-backed capsule store.
//!
//! Single connection behind a mutex, WAL mode for concurrent readers, and
//! schema applied from `schema.sql` at open. Every [`CapsuleStore`] write
//! is a single SQL statement, so the backend's statement atomicity covers
//! the contract's per-document and bulk-conditional requirements.

use std::path::Path;
use std::sync::Mutex;

use capsule_core::capsule::UnlockCode;
use capsule_core::{Capsule, CapsuleId, CapsuleStore, OwnerId, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, Row, params};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Durable capsule storage on `SQLite`.
pub struct SqliteCapsuleStore {
    conn: Mutex<Connection>,
}

impl SqliteCapsuleStore {
    /// Opens or creates a store at `path`, applying the schema.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the database cannot be opened or the
    /// schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(backend)?;
        Self::from_connection(conn)
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the schema cannot be applied.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL).map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn row_to_capsule(row: &Row<'_>) -> rusqlite::Result<Capsule> {
        Ok(Capsule {
            id: CapsuleId::new(row.get::<_, String>(0)?),
            owner: OwnerId::new(row.get::<_, String>(1)?),
            message: row.get(2)?,
            unlock_at: millis_to_datetime(row.get(3)?)?,
            unlock_code: UnlockCode::from_stored(row.get::<_, String>(4)?),
            created_at: millis_to_datetime(row.get(5)?)?,
            is_expired: row.get(6)?,
        })
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend {
        detail: err.to_string(),
    }
}

fn millis_to_datetime(millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {millis}").into(),
        )
    })
}

const SELECT_COLUMNS: &str =
    "id, owner, message, unlock_at, unlock_code, created_at, is_expired";

impl CapsuleStore for SqliteCapsuleStore {
    fn insert(&self, capsule: &Capsule) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO capsules (id, owner, message, unlock_at, unlock_code, created_at, is_expired)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                capsule.id.as_str(),
                capsule.owner.as_str(),
                capsule.message,
                capsule.unlock_at.timestamp_millis(),
                capsule.unlock_code.expose(),
                capsule.created_at.timestamp_millis(),
                capsule.is_expired,
            ],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn fetch(&self, id: &CapsuleId) -> Result<Option<Capsule>, StoreError> {
        use rusqlite::OptionalExtension;

        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM capsules WHERE id = ?1"),
            params![id.as_str()],
            Self::row_to_capsule,
        )
        .optional()
        .map_err(backend)
    }

    fn update(&self, capsule: &Capsule) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        // Immutable columns (owner, unlock_code, created_at) are never
        // rewritten.
        let changed = conn
            .execute(
                "UPDATE capsules
                 SET message = ?2, unlock_at = ?3, is_expired = ?4
                 WHERE id = ?1",
                params![
                    capsule.id.as_str(),
                    capsule.message,
                    capsule.unlock_at.timestamp_millis(),
                    capsule.is_expired,
                ],
            )
            .map_err(backend)?;
        Ok(changed > 0)
    }

    fn delete(&self, id: &CapsuleId) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM capsules WHERE id = ?1", params![id.as_str()])
            .map_err(backend)?;
        Ok(changed > 0)
    }

    fn list_by_owner(
        &self,
        owner: &OwnerId,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Capsule>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM capsules
                 WHERE owner = ?1
                 ORDER BY unlock_at ASC, id ASC
                 LIMIT ?2 OFFSET ?3"
            ))
            .map_err(backend)?;

        let rows = stmt
            .query_map(
                params![
                    owner.as_str(),
                    i64::try_from(limit).unwrap_or(i64::MAX),
                    i64::try_from(skip).unwrap_or(i64::MAX),
                ],
                Self::row_to_capsule,
            )
            .map_err(backend)?;

        let mut capsules = Vec::new();
        for row in rows {
            capsules.push(row.map_err(backend)?);
        }
        Ok(capsules)
    }

    fn expire_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE capsules SET is_expired = 1
                 WHERE unlock_at < ?1 AND is_expired = 0",
                params![threshold.timestamp_millis()],
            )
            .map_err(backend)?;
        Ok(changed as u64)
    }
}
