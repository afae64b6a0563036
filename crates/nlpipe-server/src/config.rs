//! Server configuration.

use std::net::IpAddr;
use std::path::PathBuf;

/// Configuration for the REST facade's HTTP listener.
///
/// Grounded on `oxcrypt-webdav::server::ServerConfig`; extended with the
/// store root and authentication toggle the REST facade needs but a
/// WebDAV mount backend doesn't.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_address: IpAddr,
    /// Port to bind to (0 = auto-assign, useful for tests).
    pub port: u16,
    /// Root directory backing the store.
    pub root: PathBuf,
    /// When true, `/api/*` and `/checktoken` skip bearer-token checks.
    pub disable_authentication: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 0,
            root: std::env::temp_dir().join("nlpipe"),
            disable_authentication: false,
        }
    }
}
