//! Shared application state handed to every request handler.

use nlpipe_core::auth::Authenticator;
use nlpipe_core::Service;

/// Everything a request handler needs. Cheap to clone (an `Arc` in
/// practice via the handlers holding `&AppState`), immutable after
/// construction — mirrors spec.md §4.4's "stateless beyond its
/// reference to the Store and the registry".
pub struct AppState {
    pub service: Service,
    pub authenticator: Option<Authenticator>,
}

impl AppState {
    pub fn new(service: Service, authenticator: Option<Authenticator>) -> Self {
        Self { service, authenticator }
    }

    /// Whether the given `Authorization` header value is acceptable.
    /// Authentication is treated as disabled when no authenticator was
    /// configured (spec.md §4.4's `--disable-authentication`).
    pub fn check_auth(&self, header_value: Option<&str>) -> Result<(), crate::error::ApiError> {
        match &self.authenticator {
            None => Ok(()),
            Some(auth) => {
                auth.verify_header(header_value)?;
                Ok(())
            }
        }
    }
}
