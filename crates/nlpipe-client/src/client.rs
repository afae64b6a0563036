//! The transport-agnostic client interface.
//!
//! Grounded on `original_source/nlpipe/clients/ClientInterface.py`:
//! `process`, `status`, `result`, `process_inline`, `get_task`,
//! `store_result`, `store_error`, and the three bulk operations. Made
//! object-safe with `async-trait` (the same crate
//! `oxcrypt-nfs::filesystem` uses for its own async trait) so the CLI
//! can hold either implementation behind one `Box<dyn Client>` chosen
//! at startup from the `server` argument.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ClientError;

#[async_trait]
pub trait Client: Send + Sync {
    /// Submit a document for processing, returning its task id.
    async fn process(
        &self,
        module: &str,
        doc: &[u8],
        id: Option<&str>,
        reset_error: bool,
        reset_pending: bool,
    ) -> Result<String, ClientError>;

    /// Query processing status: one of `UNKNOWN`, `PENDING`, `STARTED`,
    /// `DONE`, `ERROR`.
    async fn status(&self, module: &str, id: &str) -> Result<String, ClientError>;

    /// Fetch the stored result, optionally converted to `format`.
    async fn result(
        &self,
        module: &str,
        id: &str,
        format: Option<&str>,
    ) -> Result<Vec<u8>, ClientError>;

    /// Pull one pending task, marking it `STARTED`. `None` means the
    /// queue was empty.
    async fn get_task(&self, module: &str) -> Result<Option<(String, Vec<u8>)>, ClientError>;

    async fn store_result(&self, module: &str, id: &str, result: &[u8]) -> Result<(), ClientError>;

    async fn store_error(&self, module: &str, id: &str, message: &[u8]) -> Result<(), ClientError>;

    async fn bulk_status(
        &self,
        module: &str,
        ids: &[String],
    ) -> Result<HashMap<String, String>, ClientError>;

    async fn bulk_result(
        &self,
        module: &str,
        ids: &[String],
        format: Option<&str>,
    ) -> Result<HashMap<String, Vec<u8>>, ClientError>;

    async fn bulk_process(
        &self,
        module: &str,
        docs: Vec<(Option<String>, Vec<u8>)>,
        reset_error: bool,
        reset_pending: bool,
    ) -> Result<Vec<String>, ClientError>;

    /// Process a document and block until it reaches a terminal state,
    /// reusing a cached result if one already exists
    /// (`ClientInterface.py::process_inline`). Polls at the same ~1 Hz
    /// cadence the worker pool uses for an empty queue.
    async fn process_inline(
        &self,
        module: &str,
        doc: &[u8],
        id: Option<&str>,
        format: Option<&str>,
    ) -> Result<Vec<u8>, ClientError> {
        let id = match id {
            Some(id) => id.to_owned(),
            None => nlpipe_core::fingerprint(doc),
        };

        if self.status(module, &id).await? == "UNKNOWN" {
            self.process(module, doc, Some(&id), false, false).await?;
        }

        loop {
            let status = self.status(module, &id).await?;
            match status.as_str() {
                "DONE" | "ERROR" => return self.result(module, &id, format).await,
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    }
}
