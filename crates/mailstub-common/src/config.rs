//! Configuration for Mailstub

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server-wide configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// SMTP listener configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// POP3 listener configuration
    #[serde(default)]
    pub pop3: Pop3Config,

    /// Mail store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Server-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname announced in protocol banners
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Bind address for both listeners
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Greeting name used in banners
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            bind_address: default_bind_address(),
            greeting: default_greeting(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_greeting() -> String {
    "Mailstub".to_string()
}

/// SMTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Listen port
    #[serde(default = "default_smtp_port")]
    pub port: u16,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            port: default_smtp_port(),
        }
    }
}

fn default_smtp_port() -> u16 {
    1025
}

/// POP3 listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pop3Config {
    /// Listen port
    #[serde(default = "default_pop3_port")]
    pub port: u16,
}

impl Default for Pop3Config {
    fn default() -> Self {
        Self {
            port: default_pop3_port(),
        }
    }
}

fn default_pop3_port() -> u16 {
    1110
}

/// Mail store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of captured messages held in memory
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    10
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations, falling back to defaults
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./mailstub.toml"),
            std::path::PathBuf::from("/etc/mailstub/mailstub.toml"),
        ];

        for path in paths {
            if path.exists() {
                tracing::info!("Loading configuration from {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::debug!("No configuration file found, using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.hostname, "localhost");
        assert_eq!(config.smtp.port, 1025);
        assert_eq!(config.pop3.port, 1110);
        assert_eq!(config.store.capacity, 10);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [smtp]
            port = 2525

            [store]
            capacity = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.smtp.port, 2525);
        assert_eq!(config.pop3.port, 1110);
        assert_eq!(config.store.capacity, 100);
        assert_eq!(config.server.greeting, "Mailstub");
    }
}
