//! Error types for docsift.
//!
//! Every fallible operation in the crate returns [`Result`], whose error
//! side is the [`SearchError`] taxonomy below. Storage-layer failures are
//! wrapped unchanged so callers can inspect the underlying SQLite error.

use thiserror::Error;

/// Convenient result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SearchError>;

/// The error taxonomy of the search layer.
#[derive(Error, Debug)]
pub enum SearchError {
    /// A field or schema definition is internally inconsistent.
    #[error("schema definition error: {0}")]
    SchemaDefinition(String),

    /// A criterion cannot be applied to the bound schema.
    #[error("query error: {0}")]
    Query(String),

    /// Documents could not be written or indexed.
    #[error("ingestion error: {0}")]
    Ingestion(String),

    /// A compiled query could not be executed.
    #[error("search execution error: {0}")]
    SearchExecution(String),

    /// A named resource (usually a keyword field) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Engine configuration is invalid or could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Underlying SQLite failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// I/O failure, e.g. while reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    pub fn schema(msg: impl Into<String>) -> Self {
        SearchError::SchemaDefinition(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        SearchError::Query(msg.into())
    }

    pub fn ingestion(msg: impl Into<String>) -> Self {
        SearchError::Ingestion(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        SearchError::SearchExecution(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        SearchError::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        SearchError::Config(msg.into())
    }

    /// Returns true if this error wraps a SQLite constraint violation
    /// (UNIQUE, PRIMARY KEY, NOT NULL, ...).
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            SearchError::Storage(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            SearchError::schema("two uuid fields").to_string(),
            "schema definition error: two uuid fields"
        );
        assert_eq!(
            SearchError::query("unknown field 'x'").to_string(),
            "query error: unknown field 'x'"
        );
    }

    #[test]
    fn test_constraint_detection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: SearchError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(err.is_constraint_violation());
        assert!(!SearchError::ingestion("x").is_constraint_violation());
    }
}
