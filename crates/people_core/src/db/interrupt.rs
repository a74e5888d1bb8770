//! Deadline enforcement for SQLite statements.
//!
//! # Invariants
//! - The progress handler is installed only for the duration of one call and
//!   removed before returning, including on error.
//! - An interrupted statement surfaces as `DbError::Interrupted`, never as a
//!   generic SQLite failure.

use super::{DbError, DbResult};
use crate::deadline::{Deadline, Interrupted};
use rusqlite::{Connection, ErrorCode};

/// Virtual machine instructions between deadline polls.
const PROGRESS_POLL_OPS: i32 = 1_000;

/// Runs `op` on `conn`, aborting the running statement once `deadline` is
/// cancelled or expired.
pub fn with_deadline<T, F>(conn: &Connection, deadline: &Deadline, op: F) -> DbResult<T>
where
    F: FnOnce(&Connection) -> rusqlite::Result<T>,
{
    deadline.check()?;

    let watched = deadline.clone();
    conn.progress_handler(PROGRESS_POLL_OPS, Some(move || watched.check().is_err()));
    let result = op(conn);
    conn.progress_handler(PROGRESS_POLL_OPS, None::<fn() -> bool>);

    match result {
        Ok(value) => Ok(value),
        Err(err) if err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) => {
            let reason = deadline.check().err().unwrap_or(Interrupted::Cancelled);
            Err(DbError::Interrupted(reason))
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::with_deadline;
    use crate::db::{open_db_in_memory, DbError};
    use crate::deadline::{Deadline, Interrupted};
    use std::time::Duration;

    #[test]
    fn cancelled_deadline_fails_before_running() {
        let conn = open_db_in_memory().unwrap();
        let deadline = Deadline::none();
        deadline.cancel();

        let err = with_deadline(&conn, &deadline, |conn| {
            conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))
        })
        .unwrap_err();
        assert!(matches!(err, DbError::Interrupted(Interrupted::Cancelled)));
    }

    #[test]
    fn long_statement_is_interrupted_by_expiry() {
        let conn = open_db_in_memory().unwrap();
        let deadline = Deadline::after(Duration::from_millis(20));

        let err = with_deadline(&conn, &deadline, |conn| {
            conn.query_row(
                "WITH RECURSIVE counter(n) AS (
                    SELECT 1
                    UNION ALL
                    SELECT n + 1 FROM counter WHERE n < 1000000000
                 )
                 SELECT count(*) FROM counter;",
                [],
                |row| row.get::<_, i64>(0),
            )
        })
        .unwrap_err();
        assert!(matches!(
            err,
            DbError::Interrupted(Interrupted::DeadlineExceeded)
        ));
    }

    #[test]
    fn handler_is_removed_after_call() {
        let conn = open_db_in_memory().unwrap();
        let deadline = Deadline::after(Duration::from_secs(30));
        let value = with_deadline(&conn, &deadline, |conn| {
            conn.query_row("SELECT 41 + 1;", [], |row| row.get::<_, i64>(0))
        })
        .unwrap();
        assert_eq!(value, 42);

        deadline.cancel();
        let plain: i64 = conn.query_row("SELECT 7;", [], |row| row.get(0)).unwrap();
        assert_eq!(plain, 7);
    }
}
