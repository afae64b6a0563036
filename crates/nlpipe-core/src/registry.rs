//! Processor registry: name -> processor lookup and status probing.
//!
//! Grounded on `original_source/nlpipe/module.py`'s `register_module` /
//! `get_module` / `known_modules` globals, translated into an explicit,
//! non-global `Registry` built once at process start (spec.md §9 calls
//! out replacing import-time side effects with an explicit call).

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegistryError;

/// A named document-processing backend.
///
/// The core treats a processor's inputs and outputs as opaque bytes
/// (spec.md §6.3); everything processor-specific (which external tool it
/// wraps, how it's configured) lives entirely behind this trait.
///
/// `process` runs synchronously and may be long-running — callers that
/// hold an async runtime (the worker pool) are expected to invoke it via
/// `tokio::task::spawn_blocking`, the same pattern `oxcrypt-core` uses
/// for its own CPU-bound work (`vault/operations_async.rs`).
pub trait Processor: Send + Sync {
    /// The module name this processor is registered under.
    fn name(&self) -> &str;

    /// Probe whether the external tool/service this processor wraps is
    /// reachable. Used at worker startup and by the REST facade's index
    /// page.
    fn check_status(&self) -> Result<(), String>;

    /// Transform a document, returning the result bytes or an error
    /// message to store via `StoreError`.
    fn process(&self, doc: &[u8]) -> Result<Vec<u8>, String>;

    /// Convert a stored result to an alternate format. Default
    /// implementation rejects every format; override to support one.
    fn convert(&self, _id: &str, _result: &[u8], format: &str) -> Result<Vec<u8>, RegistryError> {
        Err(RegistryError::UnsupportedFormat {
            module: self.name().to_owned(),
            format: format.to_owned(),
        })
    }
}

/// A process-wide, immutable-after-construction name -> processor map.
#[derive(Clone, Default)]
pub struct Registry {
    modules: HashMap<String, Arc<dyn Processor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor. Registering a name that's already present
    /// is a fatal configuration error (spec.md §4.3) — returned here
    /// rather than panicking so the caller's `main()` can log and exit
    /// with a clear message.
    pub fn register(&mut self, processor: impl Processor + 'static) -> Result<(), RegistryError> {
        let name = processor.name().to_owned();
        if self.modules.contains_key(&name) {
            return Err(RegistryError::DuplicateModule(name));
        }
        self.modules.insert(name, Arc::new(processor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Processor>, RegistryError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownModule(name.to_owned(), self.known_names()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn known_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Processor>)> {
        self.modules.iter().map(|(name, p)| (name.as_str(), p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl Processor for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn check_status(&self) -> Result<(), String> {
            Ok(())
        }
        fn process(&self, doc: &[u8]) -> Result<Vec<u8>, String> {
            Ok(doc.to_vec())
        }
    }

    #[test]
    fn registers_and_looks_up() {
        let mut registry = Registry::new();
        registry.register(Echo).unwrap();
        assert!(registry.contains("echo"));
        assert_eq!(registry.get("echo").unwrap().name(), "echo");
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut registry = Registry::new();
        registry.register(Echo).unwrap();
        let err = registry.register(Echo).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateModule(name) if name == "echo"));
    }

    #[test]
    fn unknown_module_lists_known_modules() {
        let mut registry = Registry::new();
        registry.register(Echo).unwrap();
        let err = registry.get("nope").unwrap_err();
        match err {
            RegistryError::UnknownModule(name, known) => {
                assert_eq!(name, "nope");
                assert_eq!(known, vec!["echo".to_owned()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_convert_rejects_every_format() {
        let err = Echo.convert("0xdeadbeef", b"result", "xml").unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedFormat { .. }));
    }
}
