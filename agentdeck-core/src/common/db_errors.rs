//! Database error categorization and message formatting
//!
//! Sync failures are logged with the operation that failed and re-raised, so
//! the category decides which [`crate::errors::CoreErrorKind`] the caller sees.

use sea_orm::{DbErr, SqlErr};

/// Categories of database errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// Query returned no results where one was required
    NotFound,

    /// Unique constraint violation, e.g. a second instance for the same
    /// (project, template) pair
    UniqueViolation,

    /// Foreign key constraint violation
    ForeignKeyViolation,

    /// Database connection error
    ConnectionError,

    /// Query or acquire timeout
    Timeout,

    /// Transaction deadlock or busy database
    Deadlock,

    /// Anything else
    Unknown,
}

impl DbErrorKind {
    /// Categorize a sea_orm database error
    pub fn from_db_err(err: &DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => return Self::UniqueViolation,
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => return Self::ForeignKeyViolation,
            _ => {}
        }

        match err {
            DbErr::RecordNotFound(_) => Self::NotFound,
            DbErr::Conn(msg) if msg.to_string().to_lowercase().contains("timeout") => {
                Self::Timeout
            }
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => Self::ConnectionError,
            DbErr::Exec(msg) | DbErr::Query(msg) => {
                let msg_lower = msg.to_string().to_lowercase();
                if msg_lower.contains("unique") || msg_lower.contains("duplicate") {
                    Self::UniqueViolation
                } else if msg_lower.contains("foreign key") {
                    Self::ForeignKeyViolation
                } else if msg_lower.contains("deadlock")
                    || msg_lower.contains("database is locked")
                    || msg_lower.contains("database table is locked")
                {
                    Self::Deadlock
                } else if msg_lower.contains("timeout") {
                    Self::Timeout
                } else {
                    Self::Unknown
                }
            }
            _ => Self::Unknown,
        }
    }

    /// Transient errors that might succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionError | Self::Timeout | Self::Deadlock)
    }
}

/// Format database error with operation context
///
/// ```
/// use agentdeck_core::common::db_errors::*;
/// use sea_orm::DbErr;
///
/// let err = DbErr::RecordNotFound("instance".to_string());
/// let (kind, message) = format_db_error("load instance", &err);
///
/// assert_eq!(kind, DbErrorKind::NotFound);
/// assert_eq!(message, "load instance: record not found");
/// ```
pub fn format_db_error(operation: &str, err: &DbErr) -> (DbErrorKind, String) {
    let kind = DbErrorKind::from_db_err(err);

    let message = match kind {
        DbErrorKind::NotFound => format!("{}: record not found", operation),
        DbErrorKind::UniqueViolation => format!("{}: duplicate key violation", operation),
        DbErrorKind::ForeignKeyViolation => {
            format!("{}: foreign key constraint violation", operation)
        }
        DbErrorKind::ConnectionError => format!("{}: database connection failed", operation),
        DbErrorKind::Timeout => format!("{}: query timeout", operation),
        DbErrorKind::Deadlock => format!("{}: transaction deadlock", operation),
        DbErrorKind::Unknown => format!("{}: database error - {}", operation, err),
    };

    (kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    fn internal(msg: &str) -> RuntimeErr {
        RuntimeErr::Internal(msg.to_string())
    }

    #[test]
    fn test_categorize_record_not_found() {
        let err = DbErr::RecordNotFound("Template not found".to_string());
        let kind = DbErrorKind::from_db_err(&err);
        assert_eq!(kind, DbErrorKind::NotFound);
        assert!(!kind.is_retryable());
    }

    #[test]
    fn test_categorize_connection_error() {
        let kind = DbErrorKind::from_db_err(&DbErr::Conn(internal("Connection refused")));
        assert_eq!(kind, DbErrorKind::ConnectionError);
        assert!(kind.is_retryable());
    }

    #[test]
    fn test_categorize_timeout() {
        let kind =
            DbErrorKind::from_db_err(&DbErr::Conn(internal("connection timeout after 30s")));
        assert_eq!(kind, DbErrorKind::Timeout);
        assert!(kind.is_retryable());
    }

    #[test]
    fn test_categorize_unique_violation() {
        let err = DbErr::Query(internal(
            "UNIQUE constraint failed: instances.project_id, instances.template_id",
        ));
        assert_eq!(DbErrorKind::from_db_err(&err), DbErrorKind::UniqueViolation);
    }

    #[test]
    fn test_categorize_foreign_key_violation() {
        let err = DbErr::Exec(internal("FOREIGN KEY constraint failed"));
        assert_eq!(DbErrorKind::from_db_err(&err), DbErrorKind::ForeignKeyViolation);
    }

    #[test]
    fn test_categorize_locked_database() {
        let err = DbErr::Exec(internal("database is locked"));
        let kind = DbErrorKind::from_db_err(&err);
        assert_eq!(kind, DbErrorKind::Deadlock);
        assert!(kind.is_retryable());
    }

    #[test]
    fn test_format_db_error_unique_violation() {
        let err = DbErr::Query(internal("UNIQUE constraint failed"));
        let (kind, message) = format_db_error("materialize instance", &err);

        assert_eq!(kind, DbErrorKind::UniqueViolation);
        assert_eq!(message, "materialize instance: duplicate key violation");
    }
}
