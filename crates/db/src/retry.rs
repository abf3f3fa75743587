//! Re-execution of transactions aborted by PostgreSQL conflict detection.
//!
//! Callers never see these aborts: a transaction that loses a deadlock or a
//! serialization check is simply run again from the top, re-reading its
//! inputs. Anything else propagates unchanged.

/// Attempts per logical operation before a conflict error is surfaced.
pub const MAX_TX_ATTEMPTS: u32 = 3;

/// SQLSTATE for `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";

/// SQLSTATE for `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";

/// Whether `err` is a transient conflict worth re-executing.
pub fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
        ),
        _ => false,
    }
}

/// Decide whether attempt number `attempt` (1-based) should be retried.
pub fn should_retry(err: &sqlx::Error, attempt: u32, operation: &'static str) -> bool {
    if attempt < MAX_TX_ATTEMPTS && is_retryable(err) {
        tracing::debug!(attempt, operation, error = %err, "Transaction conflict, re-executing");
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_is_not_retryable() {
        assert!(!is_retryable(&sqlx::Error::RowNotFound));
        assert!(!should_retry(&sqlx::Error::RowNotFound, 1, "test"));
    }
}
