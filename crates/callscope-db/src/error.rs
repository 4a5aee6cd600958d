//! Database-specific error types and conversions.

use callscope_core::error::CallscopeError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Stored record is malformed: {0}")]
    Decode(String),

    #[error("Unique constraint violated on {entity}")]
    Conflict { entity: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    /// Classify a statement error, recognising unique-index violations.
    pub(crate) fn from_statement(entity: &str, err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        if message.contains("already contains") || message.contains("already exists") {
            DbError::Conflict {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }
}

impl From<DbError> for CallscopeError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CallscopeError::NotFound { entity, id },
            DbError::Conflict { entity } => CallscopeError::AlreadyExists { entity },
            other => CallscopeError::Database(other.to_string()),
        }
    }
}
