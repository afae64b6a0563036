//! Mapping from core errors to HTTP responses.
//!
//! Grounded on `oxcrypt-webdav::error`'s `WebDavError -> FsError`
//! conversion: one place that knows how every domain error becomes a
//! transport-level status, so handlers never hand-roll status codes.

use hyper::StatusCode;
use nlpipe_core::{AuthError, RegistryError, ServiceError, StoreError};
use serde::Serialize;

/// A REST-facade error, already carrying its HTTP status.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Set for `ProcessingFailed`, so GET can return the structured body
    /// spec.md §7 requires (`{exception_class, message}`).
    pub exception_class: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), exception_class: None }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Body for the JSON error envelope spec.md §7 mandates for
    /// `ProcessingError` over HTTP.
    pub fn json_body(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct Body<'a> {
            exception_class: &'a str,
            message: &'a str,
        }
        let body = Body {
            exception_class: self.exception_class.unwrap_or("ServerError"),
            message: &self.message,
        };
        serde_json::to_vec(&body).unwrap_or_else(|_| self.message.clone().into_bytes())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownModule(..) => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
            RegistryError::UnsupportedFormat { .. } => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            RegistryError::DuplicateModule(_) | RegistryError::CheckFailed { .. } => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotReady { status, .. } => {
                ApiError::new(hyper_status_from_u16(status.http_status()), err.to_string())
            }
            StoreError::ProcessingFailed { message, .. } => ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: message.clone(),
                exception_class: Some("ProcessingError"),
            },
            StoreError::InvalidState { .. } => ApiError::new(StatusCode::BAD_REQUEST, err.to_string()),
            StoreError::Io { .. } => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(e) => e.into(),
            ServiceError::Registry(e) => e.into(),
        }
    }
}

fn hyper_status_from_u16(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
