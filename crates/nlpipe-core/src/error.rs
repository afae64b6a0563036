//! Error types for the store, registry, and auth modules.
//!
//! Grounded on `oxcrypt-core`'s per-module `thiserror` enums
//! (`vault/config.rs`'s `VaultError`, `MasterKeyExtractionError`,
//! `ClaimValidationError`): one enum per failure domain, `#[from]` for
//! mechanical wrapping, and a `Display` message a caller can surface
//! directly. The kinds here mirror spec.md §7's error table.

use thiserror::Error;

use crate::bucket::TaskStatus;

/// Errors raised by [`crate::store::Store`] operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying filesystem operation failed.
    #[error("IO error on {module}/{id}: {source}")]
    Io {
        module: String,
        id: String,
        #[source]
        source: std::io::Error,
    },

    /// `StoreResult`/`StoreError` called on a task whose current state
    /// is not in `{STARTED, DONE, ERROR}` — a protocol violation by the
    /// caller (spec.md §4.2, §7).
    #[error("invalid state for {module}/{id}: expected STARTED/DONE/ERROR, found {found}")]
    InvalidState {
        module: String,
        id: String,
        found: TaskStatus,
    },

    /// `Result` called on a task that hasn't reached a terminal state.
    #[error("task {module}/{id} is not ready (status: {status})")]
    NotReady {
        module: String,
        id: String,
        status: TaskStatus,
    },

    /// `Result` called on a task in `ERROR` state; the message is the
    /// bytes previously passed to `StoreError`.
    #[error("{module}/{id} failed processing: {message}")]
    ProcessingFailed {
        module: String,
        id: String,
        message: String,
    },
}

impl StoreError {
    pub fn module(&self) -> &str {
        match self {
            StoreError::Io { module, .. }
            | StoreError::InvalidState { module, .. }
            | StoreError::NotReady { module, .. }
            | StoreError::ProcessingFailed { module, .. } => module,
        }
    }
}

/// Errors raised by [`crate::registry::Registry`].
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("unknown module: {0}. known modules: {1:?}")]
    UnknownModule(String, Vec<String>),

    #[error("module {0} is already registered")]
    DuplicateModule(String),

    #[error("module {module} cannot convert results to format {format}")]
    UnsupportedFormat { module: String, format: String },

    #[error("module {module} failed its status check: {reason}")]
    CheckFailed { module: String, reason: String },
}

/// Errors raised by [`crate::auth`].
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no Authorization header supplied")]
    MissingHeader,

    #[error("Authorization header is not in 'Token <jwt>' form")]
    MalformedHeader,

    #[error("token rejected: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("could not determine a stable host secret: {0}")]
    SecretDerivation(String),
}
