//! Atomic units of work over a single connection.
//!
//! Every multi-statement write in dossier (a transition plus its audit record
//! and timeline entry, a stage change plus its entry) goes through
//! [`atomically`]. At top level it opens a `BEGIN IMMEDIATE` transaction so
//! the write lock is taken before anything is read, which serializes
//! read-modify-write sequences across pooled connections. Inside a caller's
//! transaction it nests as a savepoint, so a failed unit leaves the outer
//! transaction exactly as it found it.

use rusqlite::{Connection, Transaction, TransactionBehavior};

const SAVEPOINT: &str = "dossier_unit";

/// Runs `f` as one atomic unit on `conn`.
///
/// On `Ok` the unit is committed (or released into the enclosing
/// transaction); on `Err` every statement `f` executed is rolled back.
///
/// # Errors
///
/// Returns the error produced by `f`, or a database error converted into
/// `E` if the unit cannot be opened or committed.
pub fn atomically<T, E, F>(conn: &Connection, f: F) -> Result<T, E>
where
    E: From<rusqlite::Error>,
    F: FnOnce(&Connection) -> Result<T, E>,
{
    if conn.is_autocommit() {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let value = f(&*tx)?;
        tx.commit()?;
        return Ok(value);
    }

    conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT}"))?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {SAVEPOINT}"))?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) =
                conn.execute_batch(&format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}"))
            {
                tracing::error!(error = %rollback, "failed to roll back nested unit");
            }
            Err(e)
        }
    }
}
