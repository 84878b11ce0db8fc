//! Error taxonomy for the persistence layer
//!
//! Backends translate the engine responses they understand (not found,
//! conflict) into these variants and wrap everything else in `Engine`.

use crate::model::StorageBackend;

/// Boxed engine error kept as the source of `PersistenceError::Engine`
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Storage operation, recorded on engine failures and in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Provision,
    HealthCheck,
    Add,
    GetById,
    GetAll,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Provision => "provision",
            Operation::HealthCheck => "health_check",
            Operation::Add => "add",
            Operation::GetById => "get_by_id",
            Operation::GetAll => "get_all",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Persistence error types
#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("order '{id}' already exists")]
    DuplicateKey { id: String },

    #[error("order '{id}' does not exist")]
    NotFound { id: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid order '{id}': {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("{backend} engine failure during {operation}: {source}")]
    Engine {
        backend: StorageBackend,
        operation: Operation,
        status: Option<u16>,
        #[source]
        source: BoxError,
    },
}

impl PersistenceError {
    pub fn engine(
        backend: StorageBackend,
        operation: Operation,
        status: Option<u16>,
        source: impl Into<BoxError>,
    ) -> Self {
        PersistenceError::Engine {
            backend,
            operation,
            status,
            source: source.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        PersistenceError::Configuration(message.into())
    }

    /// Status code reported by the engine, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            PersistenceError::Engine { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, PersistenceError::DuplicateKey { .. })
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display_and_status() {
        let err = PersistenceError::engine(
            StorageBackend::Document,
            Operation::GetAll,
            Some(429),
            "request rate is large",
        );
        assert_eq!(
            err.to_string(),
            "document engine failure during get_all: request rate is large"
        );
        assert_eq!(err.status(), Some(429));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_duplicate_key() {
        let err = PersistenceError::DuplicateKey {
            id: "order-1".to_string(),
        };
        assert!(err.is_duplicate_key());
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "order 'order-1' already exists");
    }
}
