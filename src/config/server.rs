//! Server and networking configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Inbound HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port for the gateway HTTP surface.
    pub port: u16,
    /// Size of the request-handling thread pool (tokio default when unset).
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8003,
            worker_threads: None,
        }
    }
}

impl ServerConfig {
    /// Socket address string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Outbound worker call configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Timeout applied to every call to a worker, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl OutboundConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve repeated GETs for finalized processes from the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let server = ServerConfig::default();
        assert_eq!(server.port, 8003);
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.bind_address(), "0.0.0.0:8003");
    }

    #[test]
    fn test_outbound_timeout() {
        let outbound = OutboundConfig { timeout_ms: 250 };
        assert_eq!(outbound.timeout(), Duration::from_millis(250));
    }
}
