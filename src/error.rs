//! Error types for scopesearch.
//!
//! All fallible operations return [`ScopeSearchError`]. The variants follow the
//! failure classes of a search call:
//!
//! - [`ScopeSearchError::Configuration`] and [`ScopeSearchError::ScopeNotFound`]
//!   describe a malformed scope tree. They are fatal to the single search call
//!   and are never retried.
//! - [`ScopeSearchError::BackendUnavailable`] means the execution backend could
//!   not run. The engine degrades it to an empty result unless strict mode is on.
//! - The remaining variants cover schema registration, storage access and
//!   indexing.
//!
//! # Examples
//!
//! ```
//! use scopesearch::error::{Result, ScopeSearchError};
//!
//! fn resolve(name: &str) -> Result<()> {
//!     Err(ScopeSearchError::scope_not_found(name))
//! }
//!
//! let err = resolve("R").unwrap_err();
//! assert!(err.is_configuration());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for scopesearch operations.
#[derive(Error, Debug)]
pub enum ScopeSearchError {
    /// I/O errors (config files, fixtures).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The scope tree of a query is malformed (cycle, depth overflow, missing body).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `__result` or an operator references a scope that does not exist.
    #[error("Scope not found: {0}")]
    ScopeNotFound(String),

    /// The execution backend cannot run. The message is safe to show to users.
    #[error("Search backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Schema registry errors (duplicate names, unresolvable field paths).
    #[error("Schema error: {0}")]
    Schema(String),

    /// Query decoding errors.
    #[error("Query error: {0}")]
    Query(String),

    /// Storage layer errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Index maintenance errors.
    #[error("Index error: {0}")]
    Index(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with ScopeSearchError.
pub type Result<T> = std::result::Result<T, ScopeSearchError>;

impl ScopeSearchError {
    /// Create a new configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        ScopeSearchError::Configuration(msg.into())
    }

    /// Create a new scope-not-found error.
    pub fn scope_not_found<S: Into<String>>(scope: S) -> Self {
        ScopeSearchError::ScopeNotFound(scope.into())
    }

    /// Create a new backend-unavailable error.
    pub fn backend_unavailable<S: Into<String>>(msg: S) -> Self {
        ScopeSearchError::BackendUnavailable(msg.into())
    }

    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        ScopeSearchError::Schema(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        ScopeSearchError::Query(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        ScopeSearchError::Storage(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        ScopeSearchError::Index(msg.into())
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        ScopeSearchError::Other(format!("Not found: {}", msg.into()))
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        ScopeSearchError::Other(format!("Invalid argument: {}", msg.into()))
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ScopeSearchError::Other(msg.into())
    }

    /// True for errors caused by a malformed scope tree rather than by the
    /// system. These are never retried and are distinct from "no results".
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ScopeSearchError::Configuration(_) | ScopeSearchError::ScopeNotFound(_)
        )
    }

    /// True when the execution backend could not run.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, ScopeSearchError::BackendUnavailable(_))
    }
}
