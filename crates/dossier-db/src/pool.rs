//! The shared connection pool.
//!
//! Every connection is prepared for [`atomically`](crate::atomically): WAL so
//! readers keep going while a unit holds the write lock, a busy timeout so a
//! second `BEGIN IMMEDIATE` waits instead of failing, and foreign keys so no
//! entry, marker or appointment can name a missing transaction.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use thiserror::Error;

const MEMORY_PATH: &str = ":memory:";

/// How long a writer waits for the lock and how many connections to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    pub busy_timeout_ms: u64,
    /// Ignored for `:memory:`, which always gets a single connection.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: String,
        source: r2d2::Error,
    },
}

/// Opens the pool for `db_path`.
///
/// `:memory:` yields a pool over one connection that is never recycled:
/// every SQLite in-memory connection is its own database, so a second
/// connection (or a replaced one) would not see the schema.
///
/// # Errors
///
/// Returns `PoolError::Open` if the first connection cannot be opened and
/// prepared.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let in_memory = db_path == MEMORY_PATH;

    let manager = if in_memory {
        SqliteConnectionManager::memory()
    } else {
        SqliteConnectionManager::file(db_path)
    };
    let manager = manager.with_init(move |conn| prepare_connection(conn, busy_timeout));

    let builder = Pool::builder();
    let builder = if in_memory {
        builder.max_size(1).idle_timeout(None).max_lifetime(None)
    } else {
        builder.max_size(settings.pool_max_size)
    };
    let pool = builder.build(manager).map_err(|source| PoolError::Open {
        path: db_path.to_string(),
        source,
    })?;

    tracing::debug!(
        path = db_path,
        max_size = pool.max_size(),
        busy_timeout_ms = settings.busy_timeout_ms,
        "opened database pool"
    );
    Ok(pool)
}

fn prepare_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;

    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    // In-memory databases stay in "memory" mode.
    if mode != "wal" && mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode is {mode}, expected wal")),
        ));
    }
    Ok(())
}
