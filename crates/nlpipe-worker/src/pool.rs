//! The worker loop and pool spawner (spec.md §4.5).
//!
//! Grounded on `oxcrypt-core`'s `spawn_blocking`-around-synchronous-work
//! pattern (`vault/operations_async.rs`) for running a
//! [`Processor::process`] call without blocking the async runtime, and on
//! spec.md §9's note that polling replaces any push/notify mechanism.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use nlpipe_core::registry::Processor;
use nlpipe_core::{RegistryError, Service};

/// Approximate poll interval on an empty queue (spec.md §4.5, §9).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of independent worker units to run for the module.
    pub concurrency: usize,
    /// Exit the loop instead of polling once the queue is observed empty.
    /// Used by one-shot CLI invocations (`nlpipe-worker --quit`).
    pub quit_on_empty: bool,
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { concurrency: 1, quit_on_empty: false, poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

/// Spawn `config.concurrency` independent worker loops for `module`.
///
/// Fails fast if the module isn't registered or its `CheckStatus` probe
/// fails (spec.md §4.3: "Used by workers at startup").
pub fn spawn_pool(
    service: Service,
    module: String,
    config: WorkerConfig,
) -> Result<Vec<JoinHandle<()>>, RegistryError> {
    let processor = service.registry().get(&module)?;
    if let Err(reason) = processor.check_status() {
        return Err(RegistryError::CheckFailed { module, reason });
    }

    let mut handles = Vec::with_capacity(config.concurrency);
    for worker_id in 0..config.concurrency {
        let service = service.clone();
        let module = module.clone();
        let processor = Arc::clone(&processor);
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            run_worker(worker_id, service, module, processor, config).await;
        }));
    }
    Ok(handles)
}

/// One independent worker's poll/process/report loop.
#[instrument(skip(service, processor, config), fields(module, worker_id))]
async fn run_worker(
    worker_id: usize,
    service: Service,
    module: String,
    processor: Arc<dyn Processor>,
    config: WorkerConfig,
) {
    info!(module, worker_id, "worker started");
    loop {
        let claimed = match service.claim(&module).await {
            Ok(claimed) => claimed,
            Err(err) => {
                error!(module, worker_id, error = %err, "claim failed, backing off");
                tokio::time::sleep(config.poll_interval).await;
                continue;
            }
        };

        let Some((id, doc)) = claimed else {
            if config.quit_on_empty {
                debug!(module, worker_id, "queue empty, quitting");
                break;
            }
            tokio::time::sleep(config.poll_interval).await;
            continue;
        };

        process_one(&service, &module, &id, doc, &processor).await;
    }
}

async fn process_one(
    service: &Service,
    module: &str,
    id: &str,
    doc: Vec<u8>,
    processor: &Arc<dyn Processor>,
) {
    let processor = Arc::clone(processor);
    let outcome = tokio::task::spawn_blocking(move || processor.process(&doc)).await;

    let result = match outcome {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(message)) => Err(message),
        Err(join_err) => Err(format!("processor task panicked: {join_err}")),
    };

    match result {
        Ok(result) => {
            if let Err(err) = service.store_result(module, id, &result).await {
                error!(module, id, error = %err, "failed to store result");
            }
        }
        Err(message) => {
            warn!(module, id, error = %message, "processing failed");
            if let Err(err) = service.store_error(module, id, message.as_bytes()).await {
                error!(module, id, error = %err, "failed to store error, dropping task for next claimant");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlpipe_core::{Registry, Store};
    use std::time::Duration as StdDuration;

    struct Upper;
    impl Processor for Upper {
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

    struct AlwaysFails;
    impl Processor for AlwaysFails {
        fn name(&self) -> &str {
            "failer"
        }
        fn check_status(&self) -> Result<(), String> {
            Ok(())
        }
        fn process(&self, _doc: &[u8]) -> Result<Vec<u8>, String> {
            Err("boom".to_owned())
        }
    }

    #[tokio::test]
    async fn processes_one_task_then_quits_on_empty_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let mut registry = Registry::new();
        registry.register(Upper).unwrap();
        let service = Service::new(store, registry);

        let id = service.enqueue("upper", b"hi", None, false, false).await.unwrap();

        let handles = spawn_pool(
            service.clone(),
            "upper".to_owned(),
            WorkerConfig { concurrency: 1, quit_on_empty: true, poll_interval: StdDuration::from_millis(10) },
        )
        .unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(service.result("upper", &id, None).await.unwrap(), b"HI");
    }

    #[tokio::test]
    async fn processing_failure_is_recorded_as_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let mut registry = Registry::new();
        registry.register(AlwaysFails).unwrap();
        let service = Service::new(store, registry);

        let id = service.enqueue("failer", b"doc", None, false, false).await.unwrap();
        let handles = spawn_pool(
            service.clone(),
            "failer".to_owned(),
            WorkerConfig { concurrency: 1, quit_on_empty: true, poll_interval: StdDuration::from_millis(10) },
        )
        .unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        let err = service.result("failer", &id, None).await.unwrap_err();
        assert!(matches!(
            err,
            nlpipe_core::ServiceError::Store(nlpipe_core::StoreError::ProcessingFailed { .. })
        ));
    }

    #[tokio::test]
    async fn spawn_pool_rejects_unknown_module() {
        let dir = tempfile::tempdir().unwrap();
        let service = Service::new(Store::new(dir.path()), Registry::new());
        let err = spawn_pool(service, "nope".to_owned(), WorkerConfig::default()).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownModule(..)));
    }
}
