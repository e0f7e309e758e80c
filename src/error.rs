//! Error types for the query gateway.
//!
//! Every failure the core can produce falls into one of five kinds. Callers
//! match on the variant to decide how to react; nothing inside the crate
//! retries or swallows them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    /// Unresolvable backend family/instance or a malformed connection string.
    #[error("Configuration error: {message}")]
    Configuration { message: String, suggestion: String },

    /// Bad identifier, empty payload, disallowed UQL token or a delete without a filter.
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Translation error ({backend}): {message}")]
    Translation { message: String, backend: String },

    #[error("Execution error: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Transaction error: {message}")]
    Transaction { message: String },
}

impl QueryError {
    /// Create a configuration error with a helpful suggestion.
    pub fn configuration(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a translation error for the named target backend.
    pub fn translation(message: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::Translation {
            message: message.into(),
            backend: backend.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Configuration { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Validation { .. } => "validation",
            Self::Translation { .. } => "translation",
            Self::Execution { .. } => "execution",
            Self::Transaction { .. } => "transaction",
        }
    }

    /// Retry policy lives outside this crate, so nothing here is retryable.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Convert sqlx errors to QueryError.
impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => QueryError::configuration(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                QueryError::execution(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => QueryError::execution("No rows returned", None),
            sqlx::Error::PoolTimedOut => {
                QueryError::execution("Timed out acquiring a pooled connection", None)
            }
            sqlx::Error::PoolClosed => QueryError::execution("Connection pool is closed", None),
            sqlx::Error::Io(io_err) => QueryError::execution(format!("I/O error: {}", io_err), None),
            sqlx::Error::Tls(tls_err) => {
                QueryError::execution(format!("TLS error: {}", tls_err), None)
            }
            sqlx::Error::Protocol(msg) => {
                QueryError::execution(format!("Protocol error: {}", msg), None)
            }
            sqlx::Error::ColumnNotFound(col) => {
                QueryError::execution(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => QueryError::execution(
                format!("Failed to decode column {}: {}", index, source),
                None,
            ),
            sqlx::Error::Decode(source) => {
                QueryError::execution(format!("Decode error: {}", source), None)
            }
            _ => QueryError::execution(format!("Unknown database error: {}", err), None),
        }
    }
}

/// Result type alias for gateway operations.
pub type QueryResult<T> = Result<T, QueryError>;
