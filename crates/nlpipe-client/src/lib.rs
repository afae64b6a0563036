//! Transport-agnostic NLPipe client bindings.
//!
//! [`Client`] is the trait both transports implement; [`FsClient`] talks
//! to a [`nlpipe_core::Store`] directly, [`HttpClient`] speaks the REST
//! facade's wire protocol. `nlpipe-client`'s binary picks between them
//! based on whether its `server` argument parses as a URL (spec.md §6.4).

pub mod client;
pub mod error;
pub mod fs_client;
pub mod http_client;

pub use client::Client;
pub use error::ClientError;
pub use fs_client::FsClient;
pub use http_client::HttpClient;

/// Build the right [`Client`] implementation for a `<server>` CLI
/// argument: an `http(s)://` URL dispatches to [`HttpClient`], anything
/// else is treated as a store root directory for [`FsClient`].
pub fn open(server: &str, token: Option<String>) -> Result<Box<dyn Client>, ClientError> {
    if server.starts_with("http://") || server.starts_with("https://") {
        Ok(Box::new(HttpClient::new(server, token)))
    } else {
        Ok(Box::new(FsClient::open(server)?))
    }
}
