use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use sea_orm::DbErr;

use crate::common::db_errors::{format_db_error, DbErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoreErrorKind {
    NotFound,
    Validation,
    Conflict,
    Unavailable,
    Internal,
}

#[derive(Debug)]
pub struct CoreError {
    kind: CoreErrorKind,
    message: String,
    fields: Option<BTreeMap<String, String>>,
    db_kind: Option<DbErrorKind>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: None,
            db_kind: None,
            source: None,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("entity".to_string(), entity.into());
        fields.insert("id".to_string(), id.into());

        Self {
            kind: CoreErrorKind::NotFound,
            message: "Resource not found".to_string(),
            fields: Some(fields),
            db_kind: None,
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Validation, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Conflict, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message)
    }

    /// Wraps a store error, keeping the operation name in the message and
    /// picking the kind from the error category.
    pub fn database(operation: &str, err: DbErr) -> Self {
        let (db_kind, message) = format_db_error(operation, &err);
        let kind = match db_kind {
            DbErrorKind::NotFound => CoreErrorKind::NotFound,
            DbErrorKind::UniqueViolation => CoreErrorKind::Conflict,
            DbErrorKind::ForeignKeyViolation => CoreErrorKind::Validation,
            DbErrorKind::ConnectionError | DbErrorKind::Timeout | DbErrorKind::Deadlock => {
                CoreErrorKind::Unavailable
            }
            DbErrorKind::Unknown => CoreErrorKind::Internal,
        };

        let mut error = Self::new(kind, message).with_source(err);
        error.db_kind = Some(db_kind);
        error
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> CoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, String>> {
        self.fields.as_ref()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == CoreErrorKind::NotFound
    }

    /// Store errors that may succeed when the operation is run again, such as
    /// a busy database.
    pub fn is_retryable(&self) -> bool {
        self.db_kind.is_some_and(|kind| kind.is_retryable())
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(fields) = &self.fields {
            for (key, value) in fields {
                write!(f, " {}={}", key, value)?;
            }
        }
        Ok(())
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("Unhandled error: {}", err);
        CoreError::internal(message)
    }
}

/// Attaches store-operation context to `DbErr` results.
pub trait DbResultExt<T> {
    fn db_context(self, operation: &str) -> Result<T, CoreError>;
}

impl<T> DbResultExt<T> for Result<T, DbErr> {
    fn db_context(self, operation: &str) -> Result<T, CoreError> {
        self.map_err(|err| CoreError::database(operation, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    #[test]
    fn not_found_carries_entity_and_id() {
        let err = CoreError::not_found("template", "abc");
        assert!(err.is_not_found());
        let fields = err.fields().unwrap();
        assert_eq!(fields.get("entity").map(String::as_str), Some("template"));
        assert_eq!(fields.get("id").map(String::as_str), Some("abc"));
        assert!(err.to_string().contains("id=abc"));
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = CoreError::database(
            "insert instance",
            DbErr::Exec(RuntimeErr::Internal(
                "UNIQUE constraint failed: instances.project_id".to_string(),
            )),
        );
        assert_eq!(err.kind(), CoreErrorKind::Conflict);
        assert!(err.message().starts_with("insert instance"));
        assert!(err.source().is_some());
        assert!(!err.is_retryable());
    }

    #[test]
    fn locked_database_is_retryable() {
        let err = Err::<(), _>(DbErr::Exec(RuntimeErr::Internal(
            "error returned from database: (code: 5) database is locked".to_string(),
        )))
        .db_context("insert instance")
        .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Unavailable);
        assert!(err.is_retryable());
        assert!(!CoreError::unavailable("queue full").is_retryable());
    }

    #[test]
    fn connection_failure_maps_to_unavailable() {
        let err = Err::<(), _>(DbErr::Conn(RuntimeErr::Internal("refused".to_string())))
            .db_context("load projects")
            .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Unavailable);
    }
}
