//! Schema migrations.
//!
//! The schema version lives in SQLite's `user_version` header field. Each
//! migration is one [`atomically`] unit that runs its SQL and bumps the
//! version, so a failed migration leaves neither tables nor version behind.
//! Migration `n` in [`MIGRATIONS`] brings the schema to version `n + 1`.

use rusqlite::Connection;
use thiserror::Error;

use crate::unit::atomically;

/// Schema steps, oldest first. Only ever append.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "transactions",
        include_str!("migrations/001_transactions.sql"),
    ),
    (
        "timeline_entries",
        include_str!("migrations/002_timeline_entries.sql"),
    ),
    (
        "seen_markers",
        include_str!("migrations/003_seen_markers.sql"),
    ),
    (
        "appointments",
        include_str!("migrations/004_appointments.sql"),
    ),
    ("audit_log", include_str!("migrations/005_audit_log.sql")),
];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration {version} ({name}) failed: {source}")]
    Failed {
        version: i64,
        name: &'static str,
        source: rusqlite::Error,
    },

    #[error("failed to read schema version: {0}")]
    Version(rusqlite::Error),

    /// The file was written by a build that knows more migrations than this one.
    #[error("database schema version {found} is newer than this build supports ({known})")]
    NewerSchema { found: i64, known: i64 },
}

/// Brings the schema on `conn` up to date.
///
/// Returns the number of migrations applied by this call.
///
/// # Errors
///
/// Returns `MigrationError::Failed` for the first migration that cannot be
/// applied, `MigrationError::NewerSchema` if the database is ahead of this
/// build.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply(conn, MIGRATIONS)
}

fn schema_version(conn: &Connection) -> Result<i64, MigrationError> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(MigrationError::Version)
}

fn apply(conn: &Connection, migrations: &[(&'static str, &str)]) -> Result<usize, MigrationError> {
    let known = migrations.len() as i64;
    let current = schema_version(conn)?;
    if current > known {
        return Err(MigrationError::NewerSchema {
            found: current,
            known,
        });
    }

    let pending = migrations.iter().zip(1_i64..).skip(current as usize);
    let mut applied = 0;
    for (&(name, sql), version) in pending {
        atomically(conn, |conn| {
            conn.execute_batch(sql)?;
            conn.pragma_update(None, "user_version", version)
        })
        .map_err(|source| MigrationError::Failed {
            version,
            name,
            source,
        })?;

        tracing::info!(version, migration = name, "applied migration");
        applied += 1;
    }

    if applied == 0 {
        tracing::debug!(version = current, "schema up to date");
    }
    Ok(applied)
}
