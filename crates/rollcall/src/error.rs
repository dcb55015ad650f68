//! Error types for rollcall.
//!
//! Every fallible operation in the crate returns [`Error`]. The first group of
//! variants is the taxonomy the presentation layer reacts to (retry, re-authenticate,
//! dismiss); the rest cover local storage, configuration and I/O.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for rollcall operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Remote Sheet Errors ===
    /// The remote sheet could not be reached or the call failed in transit.
    #[error("network failure during {operation}: {message}")]
    Network {
        /// The sheet operation that failed.
        operation: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// The remote sheet rejected the session.
    #[error("authentication failed: {message}")]
    Auth {
        /// Description of the rejection.
        message: String,
    },

    /// A row or column could not be interpreted.
    #[error("malformed data at {location}: {message}")]
    MalformedData {
        /// Where in the sheet the problem sits (e.g. `row 4`, `column 7`).
        location: String,
        /// Description of the problem.
        message: String,
    },

    /// A member or date targeted by an update does not exist.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// What was being looked up.
        kind: &'static str,
        /// The key that was not found.
        key: String,
    },

    /// A remote call did not complete within the configured bound.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    /// A request failed after a newer request of the same kind was issued.
    ///
    /// The failure is handed back to the caller but is not shown to the user.
    #[error("{operation} superseded by a newer request: {source}")]
    Superseded {
        /// The repository operation that was superseded.
        operation: &'static str,
        /// The failure it ended with.
        #[source]
        source: Box<Error>,
    },

    // === Storage Errors ===
    /// Failed to open or create the local database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A local database query failed.
    #[error("database query failed: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Input Errors ===
    /// A caller supplied an unusable value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for rollcall operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a network failure for the named sheet operation.
    #[must_use]
    pub fn network(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Network {
            operation,
            message: message.into(),
        }
    }

    /// Create an authentication failure.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a malformed-data error for a sheet location.
    #[must_use]
    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedData {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Wrap the failure of a request that a newer one has replaced.
    #[must_use]
    pub fn superseded(operation: &'static str, source: Error) -> Self {
        Self::Superseded {
            operation,
            source: Box::new(source),
        }
    }

    /// Create an invalid-input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the caller may simply try the same operation again.
    ///
    /// Timeouts count as network failures here.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    /// Whether the caller should prompt for re-authentication.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Check if this error is a not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a malformed-data error.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedData { .. })
    }

    /// Check if this failure belongs to a request that has been replaced.
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }

    /// One-line, user-facing text for a dismissible message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => {
                "Could not reach the attendance sheet. Check your connection and try again."
                    .to_string()
            }
            Self::Auth { .. } => "Your session has expired. Please sign in again.".to_string(),
            Self::NotFound { kind, key } => format!("No {kind} found for {key}."),
            Self::MalformedData { location, .. } => {
                format!("Some sheet data could not be read ({location}).")
            }
            Self::InvalidInput(message) => message.clone(),
            Self::Superseded { source, .. } => source.user_message(),
            other => format!("Something went wrong: {other}"),
        }
    }
}
