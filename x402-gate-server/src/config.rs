//! Gate server configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 8080
//! backend_url = "https://api.weatherxm.com"
//! backend_timeout_seconds = 60
//!
//! [extra_config."x402-payment-gate"]
//! facilitator_url = "https://facilitator.example"
//! backend_api_key = "$BACKEND_API_KEY"
//! payment_header_name = "X-PAYMENT"
//! auth_header_name = "X-API-KEY"
//! payment_address = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C"
//! max_amount_required = "10000"
//! network = "filecoin-calibration"
//! description = "Weather data"
//! asset = "0xb3042734b608a1B16e9e86B374A3f3e389B4cDf0"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `config.toml`)
//! - `HOST` - Override server bind address
//! - `PORT` - Override server port
//! - Secrets referenced by `$VAR` in the config file

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::ServerError;

/// Top-level gate server configuration.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `8080`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL of the protected backend.
    pub backend_url: Url,

    /// Budget for one backend round trip in seconds (default: `60`).
    #[serde(default = "default_backend_timeout_seconds")]
    pub backend_timeout_seconds: u64,

    /// Largest request body forwarded to the backend (default: 10 MiB).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Per-plugin configuration handed to the gate at registration.
    #[serde(default)]
    pub extra_config: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("backend_url", &self.backend_url.as_str())
            .field("backend_timeout_seconds", &self.backend_timeout_seconds)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("extra_config", &self.extra_config.keys().collect::<Vec<_>>())
            .finish()
    }
}

const fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    8080
}

const fn default_backend_timeout_seconds() -> u64 {
    60
}

const fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl ServerConfig {
    /// Loads configuration from a file path.
    ///
    /// After loading, all `$VAR` / `${VAR}` references are expanded from the
    /// process environment. `HOST` and `PORT` env vars override the file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path).map_err(|source| ServerError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content, |name| std::env::var(name).ok())?;

        if let Ok(host) = std::env::var("HOST")
            && let Ok(addr) = host.parse()
        {
            config.host = addr;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        Ok(config)
    }

    /// Parses configuration from TOML text, expanding variables with `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expanded text is not a valid configuration.
    pub fn from_toml(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ServerError> {
        let expanded = expand_vars(content, lookup);
        Ok(toml::from_str(&expanded)?)
    }
}

/// Expands `$VAR` and `${VAR}` patterns using `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.next_if_eq(&'{').is_some();
        let mut name = String::new();
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    closed = true;
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            name.push(c);
            chars.next();
        }

        match lookup(&name).filter(|_| !name.is_empty()) {
            Some(value) => result.push_str(&value),
            None => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&name);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "BACKEND_API_KEY" => Some("s3cr3t".to_owned()),
            "PORT_NUM" => Some("9090".to_owned()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_vars_plain_and_braced() {
        assert_eq!(expand_vars("key=$BACKEND_API_KEY;", env), "key=s3cr3t;");
        assert_eq!(expand_vars("key=${BACKEND_API_KEY}x", env), "key=s3cr3tx");
    }

    #[test]
    fn test_expand_vars_leaves_unresolved() {
        assert_eq!(
            expand_vars("$MISSING and ${ALSO_MISSING}", env),
            "$MISSING and ${ALSO_MISSING}"
        );
        assert_eq!(expand_vars("cost: 5$", env), "cost: 5$");
        assert_eq!(expand_vars("${", env), "${");
    }

    #[test]
    fn test_from_toml_applies_defaults_and_extra_config() {
        let content = r#"
            backend_url = "https://api.example.com"

            [extra_config."x402-payment-gate"]
            backend_api_key = "${BACKEND_API_KEY}"
            max_timeout_seconds = 60
        "#;
        let config = ServerConfig::from_toml(content, env).unwrap();
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.port, 8080);
        assert_eq!(config.backend_timeout_seconds, 60);
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        let gate = &config.extra_config["x402-payment-gate"];
        assert_eq!(gate["backend_api_key"], "s3cr3t");
        assert_eq!(gate["max_timeout_seconds"], 60);
        assert!(!format!("{config:?}").contains("s3cr3t"));
    }

    #[test]
    fn test_from_toml_expands_numbers() {
        let content = r#"
            port = $PORT_NUM
            backend_url = "http://127.0.0.1:3000"
        "#;
        let config = ServerConfig::from_toml(content, env).unwrap();
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_from_toml_requires_backend_url() {
        let err = ServerConfig::from_toml("port = 1", env).unwrap_err();
        assert!(matches!(err, ServerError::ParseConfig(_)));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ServerConfig::load_from(Path::new("/nonexistent/x402-gate.toml")).unwrap_err();
        assert!(matches!(err, ServerError::ReadConfig { .. }));
    }
}
