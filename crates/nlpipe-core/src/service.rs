//! Combined store + registry operations.
//!
//! Spec.md §9 calls for treating the store as "the authoritative
//! abstraction" with the registry only consulted for result conversion.
//! `Service` is that seam: it's what both the REST facade and the
//! filesystem-direct client drive, so module-unknown checks and
//! `Convert` application live in exactly one place instead of being
//! duplicated across transports.

use std::collections::HashMap;

use crate::bucket::TaskStatus;
use crate::error::{RegistryError, StoreError};
use crate::registry::Registry;
use crate::store::Store;

/// Either half of a bulk operation failing: a store-level error or an
/// unknown module.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Clone)]
pub struct Service {
    store: Store,
    registry: Registry,
}

impl Service {
    pub fn new(store: Store, registry: Registry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn ensure_module(&self, module: &str) -> Result<(), RegistryError> {
        if self.registry.contains(module) {
            Ok(())
        } else {
            Err(RegistryError::UnknownModule(
                module.to_owned(),
                self.registry.known_names(),
            ))
        }
    }

    pub async fn enqueue(
        &self,
        module: &str,
        doc: &[u8],
        id: Option<String>,
        reset_error: bool,
        reset_pending: bool,
    ) -> Result<String, ServiceError> {
        self.ensure_module(module)?;
        Ok(self
            .store
            .enqueue(module, doc, id, reset_error, reset_pending)
            .await?)
    }

    pub async fn bulk_enqueue(
        &self,
        module: &str,
        docs: Vec<(Option<String>, Vec<u8>)>,
        reset_error: bool,
        reset_pending: bool,
    ) -> Result<Vec<String>, ServiceError> {
        self.ensure_module(module)?;
        let mut ids = Vec::with_capacity(docs.len());
        for (id, doc) in docs {
            ids.push(
                self.store
                    .enqueue(module, &doc, id, reset_error, reset_pending)
                    .await?,
            );
        }
        Ok(ids)
    }

    pub async fn status(&self, module: &str, id: &str) -> Result<TaskStatus, ServiceError> {
        self.ensure_module(module)?;
        Ok(self.store.status(module, id).await?)
    }

    pub async fn bulk_status(
        &self,
        module: &str,
        ids: &[String],
    ) -> Result<HashMap<String, TaskStatus>, ServiceError> {
        self.ensure_module(module)?;
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            out.insert(id.clone(), self.store.status(module, id).await?);
        }
        Ok(out)
    }

    pub async fn claim(&self, module: &str) -> Result<Option<(String, Vec<u8>)>, ServiceError> {
        self.ensure_module(module)?;
        Ok(self.store.claim(module).await?)
    }

    pub async fn store_result(&self, module: &str, id: &str, result: &[u8]) -> Result<(), ServiceError> {
        self.ensure_module(module)?;
        Ok(self.store.store_result(module, id, result).await?)
    }

    pub async fn store_error(&self, module: &str, id: &str, message: &[u8]) -> Result<(), ServiceError> {
        self.ensure_module(module)?;
        Ok(self.store.store_error(module, id, message).await?)
    }

    /// Fetch a task's result, applying the processor's `Convert` when a
    /// `format` is requested (spec.md §4.2, §4.3).
    pub async fn result(
        &self,
        module: &str,
        id: &str,
        format: Option<&str>,
    ) -> Result<Vec<u8>, ServiceError> {
        self.ensure_module(module)?;
        let raw = self.store.read_result(module, id).await?;
        match format {
            None => Ok(raw),
            Some(format) => {
                let processor = self.registry.get(module)?;
                Ok(processor.convert(id, &raw, format)?)
            }
        }
    }

    /// Bulk result fetch. Matches
    /// `original_source/nlpipe/clients/ClientInterface.py`'s
    /// `bulk_result`: any single id's failure aborts the whole batch,
    /// rather than silently omitting it, since the original dict
    /// comprehension propagates the first exception.
    pub async fn bulk_result(
        &self,
        module: &str,
        ids: &[String],
        format: Option<&str>,
    ) -> Result<HashMap<String, Vec<u8>>, ServiceError> {
        self.ensure_module(module)?;
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            out.insert(id.clone(), self.result(module, id, format).await?);
        }
        Ok(out)
    }

    pub async fn statistics(&self, module: &str) -> Result<HashMap<TaskStatus, usize>, ServiceError> {
        self.ensure_module(module)?;
        Ok(self.store.statistics(module).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;
    impl crate::registry::Processor for Upper {
        fn name(&self) -> &str {
            "upper"
        }
        fn check_status(&self) -> Result<(), String> {
            Ok(())
        }
        fn process(&self, doc: &[u8]) -> Result<Vec<u8>, String> {
            Ok(String::from_utf8_lossy(doc).to_uppercase().into_bytes())
        }
    }

    fn service() -> (Service, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new();
        registry.register(Upper).unwrap();
        (Service::new(Store::new(dir.path()), registry), dir)
    }

    #[tokio::test]
    async fn unknown_module_is_rejected_before_touching_disk() {
        let (service, _dir) = service();
        let err = service.enqueue("nope", b"doc", None, false, false).await.unwrap_err();
        assert!(matches!(err, ServiceError::Registry(RegistryError::UnknownModule(..))));
    }

    #[tokio::test]
    async fn bulk_process_on_empty_list_creates_no_files() {
        let (service, _dir) = service();
        let ids = service.bulk_enqueue("upper", vec![], false, false).await.unwrap();
        assert!(ids.is_empty());
        let stats = service.statistics("upper").await.unwrap();
        assert_eq!(stats[&TaskStatus::Pending], 0);
    }

    #[tokio::test]
    async fn bulk_process_with_explicit_ids_preserves_order() {
        let (service, _dir) = service();
        let docs = vec![
            (Some("a".into()), b"x".to_vec()),
            (Some("b".into()), b"y".to_vec()),
            (Some("c".into()), b"z".to_vec()),
        ];
        let ids = service.bulk_enqueue("upper", docs, false, false).await.unwrap();
        assert_eq!(ids, vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]);
    }

    #[tokio::test]
    async fn result_applies_convert_when_format_requested() {
        let (service, _dir) = service();
        let id = service.enqueue("upper", b"hi", None, false, false).await.unwrap();
        service.claim("upper").await.unwrap();
        service.store_result("upper", &id, b"HI").await.unwrap();

        let err = service.result("upper", &id, Some("xml")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Registry(RegistryError::UnsupportedFormat { .. })
        ));

        let plain = service.result("upper", &id, None).await.unwrap();
        assert_eq!(plain, b"HI");
    }
}
