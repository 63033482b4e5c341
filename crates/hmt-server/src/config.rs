//! HTTP server configuration.

use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Basic auth username for operator endpoints (empty = disabled).
    #[serde(default)]
    pub username: String,
    /// Basic auth password for operator endpoints (empty = disabled).
    #[serde(default)]
    pub password: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl ServerConfig {
    /// Check if basic auth is enabled.
    pub fn auth_enabled(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ServerError::InvalidAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 9000,
            ..Default::default()
        };
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:9000");

        let bad = ServerConfig {
            bind_address: "localhost:1".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad.socket_addr(), Err(ServerError::InvalidAddress(_))));
    }

    #[test]
    fn test_auth_requires_both_credentials() {
        let mut config = ServerConfig::default();
        assert!(!config.auth_enabled());
        config.username = "ops".to_string();
        assert!(!config.auth_enabled());
        config.password = "secret".to_string();
        assert!(config.auth_enabled());
    }
}
