//! Errors surfaced by both [`crate::FsClient`] and [`crate::HttpClient`].
//!
//! Mirrors `nlpipe-server`'s `ApiError`: one enum per crate boundary,
//! `thiserror`-derived, with `From` impls instead of ad hoc string
//! errors (`oxcrypt-core`'s per-module error style).

use nlpipe_core::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server returned a well-formed but unsuccessful response.
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    /// Task finished in the `ERROR` state; `message` is the stored
    /// error text (`original_source/nlpipe/clients/ClientInterface.py`'s
    /// `process_inline` raises an `Exception` with this text).
    #[error("task {id} failed: {message}")]
    TaskFailed { id: String, message: String },
}
