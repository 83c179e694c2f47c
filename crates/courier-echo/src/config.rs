//! Echo server configuration.
//!
//! ## Example Configuration
//!
//! ```toml
//! bind = "0.0.0.0"
//! port = 5000
//! digest_secret_key = "change-me"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EchoError, Result};

/// Echo server configuration loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoConfig {
    /// Address to bind (default: 127.0.0.1)
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on; 0 picks a free port (default: 5000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Key used to sign Digest nonces and derive the opaque value
    #[serde(default = "default_digest_secret_key")]
    pub digest_secret_key: String,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            digest_secret_key: default_digest_secret_key(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    5000
}

fn default_digest_secret_key() -> String {
    "test-secret-key-for-digest-auth".to_string()
}

impl EchoConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist or cannot be read
    /// - Deserialization fails
    /// - Validation fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(EchoError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| EchoError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml_str(&contents)
    }

    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization or validation fails.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address or the digest secret key is empty.
    pub fn validate(&self) -> Result<()> {
        if self.bind.trim().is_empty() {
            return Err(EchoError::Config("bind address must not be empty".to_string()));
        }

        if self.digest_secret_key.is_empty() {
            return Err(EchoError::Config(
                "digest_secret_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The `host:port` pair to bind.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = EchoConfig::from_toml_str("").unwrap();
        assert_eq!(config, EchoConfig::default());
        assert_eq!(config.address(), "127.0.0.1:5000");
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            bind = "0.0.0.0"
            port = 8080
            digest_secret_key = "s3cr3t"
        "#;

        let config = EchoConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.address(), "0.0.0.0:8080");
        assert_eq!(config.digest_secret_key, "s3cr3t");
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            EchoConfig::from_toml_str("bind = \" \""),
            Err(EchoError::Config(_))
        ));
        assert!(matches!(
            EchoConfig::from_toml_str("digest_secret_key = \"\""),
            Err(EchoError::Config(_))
        ));
        assert!(matches!(
            EchoConfig::from_toml_str("port = 70000"),
            Err(EchoError::Toml(_))
        ));
    }

    #[test]
    fn test_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 0").unwrap();

        let config = EchoConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 0);

        assert!(EchoConfig::load("/nonexistent/echo.toml").is_err());
    }
}
