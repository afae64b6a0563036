//! Core building blocks for NLPipe: content-addressed fingerprinting, the
//! filesystem-backed job store, the processor registry, and bearer-token
//! auth.
//!
//! This crate has no opinion about transport (HTTP, direct filesystem
//! access) or concurrency model beyond what the store itself requires
//! (spec.md §1: the queue, dispatch discipline, and state machine are
//! "the core"; REST and worker-pool concerns live in `nlpipe-server` and
//! `nlpipe-worker`).

pub mod auth;
pub mod bucket;
pub mod error;
pub mod fingerprint;
pub mod registry;
pub mod service;
pub mod store;

pub use bucket::{Bucket, TaskStatus};
pub use error::{AuthError, RegistryError, StoreError};
pub use fingerprint::fingerprint;
pub use registry::{Processor, Registry};
pub use service::{Service, ServiceError};
pub use store::Store;
