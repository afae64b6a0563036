//! Built-in [`nlpipe_core::Processor`] implementations.
//!
//! Grounded on `original_source/nlpipe/modules/test_upper.py` — the
//! original project's own "trivial test module", registered under the
//! same name spec.md §8's worked scenarios use (`upper`).

use nlpipe_core::registry::Processor;
use nlpipe_core::RegistryError;

/// Upper-cases its input. Used throughout spec.md §8's worked examples
/// and integration tests — it has no external dependency, so
/// `check_status` always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct UpperCase;

impl Processor for UpperCase {
    fn name(&self) -> &str {
        "upper"
    }

    fn check_status(&self) -> Result<(), String> {
        Ok(())
    }

    fn process(&self, doc: &[u8]) -> Result<Vec<u8>, String> {
        let text = std::str::from_utf8(doc).map_err(|e| format!("input is not valid UTF-8: {e}"))?;
        Ok(text.to_uppercase().into_bytes())
    }

    fn convert(&self, id: &str, result: &[u8], format: &str) -> Result<Vec<u8>, RegistryError> {
        match format {
            "json" => {
                let text = String::from_utf8_lossy(result);
                let body = serde_json::json!({ "id": id, "status": "OK", "result": text });
                Ok(serde_json::to_vec(&body).expect("json serialization of plain strings cannot fail"))
            }
            other => Err(RegistryError::UnsupportedFormat {
                module: self.name().to_owned(),
                format: other.to_owned(),
            }),
        }
    }
}

/// Returns its input unchanged. Useful as a zero-op processor in tests
/// and local development where `upper`'s UTF-8 requirement is
/// inconvenient.
#[derive(Debug, Default, Clone, Copy)]
pub struct Echo;

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

/// Register every built-in processor into `registry`.
pub fn register_builtins(registry: &mut nlpipe_core::Registry) -> Result<(), RegistryError> {
    registry.register(UpperCase)?;
    registry.register(Echo)?;
    Ok(())
}
