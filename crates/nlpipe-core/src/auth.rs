//! Bearer token issuance and verification.
//!
//! Grounded on `oxcrypt-core`'s JWT usage for vault-config claims
//! (`vault/config.rs`, `crypto/keys.rs`'s `create_jwt_encoding_key` /
//! `create_jwt_decoding_key`): HS256 via the `jsonwebtoken` crate,
//! `EncodingKey`/`DecodingKey::from_secret`. Claim shape and the
//! `"Token <jwt>"` header convention come from
//! `original_source/nlpipe/servers/utils.py`.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AuthError;

const CURRENT_VERSION: u32 = 1;
const AUTH_SCHEME_PREFIX: &str = "Token ";

/// Claims embedded in an NLPipe bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub version: u32,
    /// Issued-at, Unix seconds.
    pub iat: i64,
}

/// Issues and verifies bearer tokens against a single process-wide
/// secret (spec.md §3, §4.4).
#[derive(Clone)]
pub struct Authenticator {
    encoding_key: std::sync::Arc<EncodingKey>,
    decoding_key: std::sync::Arc<DecodingKey>,
    validation: Validation,
}

impl Authenticator {
    /// Build an authenticator from raw secret bytes.
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // We only ever issue tokens for ourselves; there's no external
        // issuer/audience to check.
        validation.validate_exp = false;
        Self {
            encoding_key: std::sync::Arc::new(EncodingKey::from_secret(secret)),
            decoding_key: std::sync::Arc::new(DecodingKey::from_secret(secret)),
            validation,
        }
    }

    /// Derive the process-wide secret the way `original_source`'s
    /// `_secret_key` does: from host identity, computed once and reused
    /// for the life of the process. Falls back to a random secret (with
    /// a one-time warning) when no stable host id is available, e.g. in
    /// a container without `/etc/machine-id`.
    ///
    /// Operators who need tokens to survive a server restart should
    /// supply `--secret-file`/`NLPIPE_SECRET_FILE` instead (DESIGN.md
    /// Open Question 2) — this derivation is a convenience default, not
    /// the only way to obtain a secret.
    pub fn from_host_identity() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_owned());
        let machine_id = read_machine_id().unwrap_or_else(|| {
            warn!("no stable machine id found; auth tokens will not survive a restart");
            format!("{:x}", rand_u64())
        });
        let secret = format!("__{machine_id}_{hostname}");
        Self::from_secret(secret.as_bytes())
    }

    /// Issue a new bearer token containing the current claim version and
    /// the current time as `iat`.
    pub fn issue_token(&self) -> Result<String, AuthError> {
        let claims = Claims {
            version: CURRENT_VERSION,
            iat: now_unix(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::InvalidToken)
    }

    /// Verify a raw token string (without the `Token ` prefix).
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }

    /// Verify an `Authorization` header value of the form
    /// `"Token <jwt>"` (spec.md §6.1).
    pub fn verify_header(&self, header_value: Option<&str>) -> Result<Claims, AuthError> {
        let value = header_value.ok_or(AuthError::MissingHeader)?;
        let token = value
            .strip_prefix(AUTH_SCHEME_PREFIX)
            .ok_or(AuthError::MalformedHeader)?;
        self.verify_token(token)
    }
}

fn read_machine_id() -> Option<String> {
    std::fs::read_to_string("/etc/machine-id")
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn rand_u64() -> u64 {
    // No `rand` dependency for one fallback value: mix process-local
    // entropy sources that are already on hand.
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::time::Instant::now().hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let auth = Authenticator::from_secret(b"test-secret");
        let token = auth.issue_token().unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.version, CURRENT_VERSION);
    }

    #[test]
    fn rejects_token_from_a_different_secret() {
        let issuer = Authenticator::from_secret(b"secret-a");
        let verifier = Authenticator::from_secret(b"secret-b");
        let token = issuer.issue_token().unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn header_verification_requires_token_scheme() {
        let auth = Authenticator::from_secret(b"test-secret");
        let token = auth.issue_token().unwrap();

        assert!(matches!(
            auth.verify_header(None),
            Err(AuthError::MissingHeader)
        ));
        assert!(matches!(
            auth.verify_header(Some(&token)),
            Err(AuthError::MalformedHeader)
        ));
        assert!(auth.verify_header(Some(&format!("Token {token}"))).is_ok());
    }
}
