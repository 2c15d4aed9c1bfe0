// Error taxonomy shared by every adapter.
//
// Absence on a point lookup is never an error (operations return `Option`).
// Everything else lands in `AdapterError`: a missing record that a mutation
// requires, a configuration mistake caught before the store is touched, a
// store failure passed through unchanged, or a stored document that no
// longer decodes into its typed record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a failure reported by the backing document store.
///
/// The variants follow the HTTP status codes a document database reports,
/// so a store client can map its responses without losing information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseErrorKind {
    /// A document with the same id already exists in the partition.
    Conflict,
    /// The `if-match` etag no longer matches the stored document.
    PreconditionFailed,
    /// The addressed document, container or database does not exist.
    NotFound,
    /// The request was rate limited.
    Throttled {
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
    },
    /// The store rejected the request as malformed.
    BadRequest,
    /// Network or transport level failure.
    Transport,
}

impl DatabaseErrorKind {
    /// HTTP status code matching this kind, `None` for transport failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Conflict => Some(409),
            Self::PreconditionFailed => Some(412),
            Self::NotFound => Some(404),
            Self::Throttled { .. } => Some(429),
            Self::BadRequest => Some(400),
            Self::Transport => None,
        }
    }
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Conflict => "conflict",
            Self::PreconditionFailed => "precondition failed",
            Self::NotFound => "not found",
            Self::Throttled { .. } => "throttled",
            Self::BadRequest => "bad request",
            Self::Transport => "transport",
        };
        write!(f, "{label}")
    }
}

/// A failure reported by the document store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub message: String,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::Conflict, message)
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::PreconditionFailed, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::BadRequest, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == DatabaseErrorKind::NotFound
    }
}

/// Error returned by adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// A mutation required an existing record and none was found.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Unknown container name or invalid adapter configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdapterError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// The store error kind, when this error came from the store.
    pub fn database_kind(&self) -> Option<DatabaseErrorKind> {
        match self {
            Self::Database(err) => Some(err.kind),
            _ => None,
        }
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;
