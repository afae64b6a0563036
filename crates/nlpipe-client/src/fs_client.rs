//! Direct filesystem client: talks to [`nlpipe_core::Store`] and
//! [`nlpipe_core::Registry`] in-process, for same-host or NFS-shared
//! deployments (`original_source/nlpipe/clients/FSClient.py`).

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use nlpipe_core::{Registry, Service, ServiceError, Store, StoreError};

use crate::client::Client;
use crate::error::ClientError;

pub struct FsClient {
    service: Service,
}

impl FsClient {
    /// Open a store rooted at `root`, with the built-in processors
    /// registered (mirrors every binary's `main()` in this workspace).
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ClientError> {
        let store = Store::new(root.as_ref());
        let mut registry = Registry::new();
        nlpipe_modules::register_builtins(&mut registry)
            .map_err(|e| ClientError::Service(ServiceError::Registry(e)))?;
        Ok(Self { service: Service::new(store, registry) })
    }

    pub fn from_service(service: Service) -> Self {
        Self { service }
    }
}

fn classify(module: &str, id: &str, err: ServiceError) -> ClientError {
    if let ServiceError::Store(StoreError::ProcessingFailed { message, .. }) = &err {
        return ClientError::TaskFailed { id: id.to_owned(), message: message.clone() };
    }
    let _ = module;
    ClientError::Service(err)
}

#[async_trait]
impl Client for FsClient {
    async fn process(
        &self,
        module: &str,
        doc: &[u8],
        id: Option<&str>,
        reset_error: bool,
        reset_pending: bool,
    ) -> Result<String, ClientError> {
        Ok(self
            .service
            .enqueue(module, doc, id.map(str::to_owned), reset_error, reset_pending)
            .await?)
    }

    async fn status(&self, module: &str, id: &str) -> Result<String, ClientError> {
        Ok(self.service.status(module, id).await?.as_str().to_owned())
    }

    async fn result(
        &self,
        module: &str,
        id: &str,
        format: Option<&str>,
    ) -> Result<Vec<u8>, ClientError> {
        self.service
            .result(module, id, format)
            .await
            .map_err(|e| classify(module, id, e))
    }

    async fn get_task(&self, module: &str) -> Result<Option<(String, Vec<u8>)>, ClientError> {
        Ok(self.service.claim(module).await?)
    }

    async fn store_result(&self, module: &str, id: &str, result: &[u8]) -> Result<(), ClientError> {
        Ok(self.service.store_result(module, id, result).await?)
    }

    async fn store_error(&self, module: &str, id: &str, message: &[u8]) -> Result<(), ClientError> {
        Ok(self.service.store_error(module, id, message).await?)
    }

    async fn bulk_status(
        &self,
        module: &str,
        ids: &[String],
    ) -> Result<HashMap<String, String>, ClientError> {
        let statuses = self.service.bulk_status(module, ids).await?;
        Ok(statuses.into_iter().map(|(id, status)| (id, status.as_str().to_owned())).collect())
    }

    async fn bulk_result(
        &self,
        module: &str,
        ids: &[String],
        format: Option<&str>,
    ) -> Result<HashMap<String, Vec<u8>>, ClientError> {
        Ok(self.service.bulk_result(module, ids, format).await?)
    }

    async fn bulk_process(
        &self,
        module: &str,
        docs: Vec<(Option<String>, Vec<u8>)>,
        reset_error: bool,
        reset_pending: bool,
    ) -> Result<Vec<String>, ClientError> {
        Ok(self.service.bulk_enqueue(module, docs, reset_error, reset_pending).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> (FsClient, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (FsClient::open(dir.path()).unwrap(), dir)
    }

    #[tokio::test]
    async fn process_then_claim_then_store_result_round_trips() {
        let (client, _dir) = client();
        let id = client.process("upper", b"hi", None, false, false).await.unwrap();
        assert_eq!(client.status("upper", &id).await.unwrap(), "PENDING");

        let (claimed_id, doc) = client.get_task("upper").await.unwrap().unwrap();
        assert_eq!(claimed_id, id);
        assert_eq!(doc, b"hi");

        client.store_result("upper", &id, b"HI").await.unwrap();
        assert_eq!(client.result("upper", &id, None).await.unwrap(), b"HI");
    }

    #[tokio::test]
    async fn result_on_error_status_is_task_failed() {
        let (client, _dir) = client();
        let id = client.process("upper", b"hi", None, false, false).await.unwrap();
        client.get_task("upper").await.unwrap();
        client.store_error("upper", &id, b"boom").await.unwrap();

        let err = client.result("upper", &id, None).await.unwrap_err();
        assert!(matches!(err, ClientError::TaskFailed { message, .. } if message == "boom"));
    }

    #[tokio::test]
    async fn process_inline_waits_for_a_worker_to_finish_the_task() {
        let (client, _dir) = client();
        let doc = b"hi";

        let worker = async {
            loop {
                if let Some((id, body)) = client.get_task("upper", ).await.unwrap() {
                    client.store_result("upper", &id, &body.to_ascii_uppercase()).await.unwrap();
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        };

        let (result, ()) = tokio::join!(client.process_inline("upper", doc, None, None), worker);
        assert_eq!(result.unwrap(), b"HI");
    }
}
