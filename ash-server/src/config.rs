//! Server configuration for the ASH demonstration service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ash_core::Mode;

/// Which ASH wire variant this server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    V1,
    V2_1,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Which ASH wire variant to speak.
    pub variant: ProtocolVariant,
    /// Default context time-to-live when a request omits one.
    pub default_ttl_ms: i64,
    /// Default proof binding mode for newly issued contexts.
    pub default_mode: Mode,
    /// v2.1 freshness window: max allowed drift between a client-supplied
    /// timestamp and the server clock.
    pub max_clock_skew_ms: i64,
    /// TLS configuration (optional for initial dev).
    pub tls: Option<TlsConfig>,
    /// Read timeout for connections.
    pub read_timeout: Duration,
    /// Write timeout for connections.
    pub write_timeout: Duration,
    /// Max message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9443".parse().unwrap(),
            variant: ProtocolVariant::V1,
            default_ttl_ms: 30_000,
            default_mode: Mode::Balanced,
            max_clock_skew_ms: 5_000,
            tls: None,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            max_message_size: 1024 * 1024, // 1MB
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address.
    pub fn with_addr(addr: impl Into<SocketAddr>) -> Self {
        Self {
            bind_addr: addr.into(),
            ..Default::default()
        }
    }

    /// Enable TLS with certificate and key files.
    pub fn with_tls(mut self, cert_path: PathBuf, key_path: PathBuf) -> Self {
        self.tls = Some(TlsConfig {
            cert_path,
            key_path,
        });
        self
    }

    /// Select the wire variant.
    pub fn with_variant(mut self, variant: ProtocolVariant) -> Self {
        self.variant = variant;
        self
    }
}

/// TLS configuration.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,
    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9443);
        assert!(config.tls.is_none());
        assert_eq!(config.variant, ProtocolVariant::V1);
    }

    #[test]
    fn custom_config() {
        let config = ServerConfig::with_addr("0.0.0.0:8080".parse::<SocketAddr>().unwrap())
            .with_variant(ProtocolVariant::V2_1);

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.variant, ProtocolVariant::V2_1);
    }
}
