//! Database layer for dossier.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! the embedded SQL migrations that create every table the timeline,
//! seen-state, appointment and audit crates write to, and the
//! [`atomically`] helper those crates use for multi-statement writes.
//!
//! Writers rely on the database, not on in-process locks, for correctness:
//! unique constraints absorb duplicate inserts and `BEGIN IMMEDIATE`
//! transactions serialize read-modify-write sequences across connections.

mod migrations;
mod pool;
mod unit;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use unit::atomically;
