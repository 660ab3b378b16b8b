//! Service configuration from the environment
//!
//! Gateway credentials and the webhook secret are never compiled in.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_WEBHOOK_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_GATEWAY_URL: &str = "https://api.zapupi.com";
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: `{value}`")]
    Invalid { name: &'static str, value: String },
}

/// ZapUPI credentials and endpoint
#[derive(Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub token_key: String,
    pub secret_key: String,
    /// Where the hosted payment page sends the player afterwards
    pub redirect_url: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("token_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct ServiceConfig {
    pub api_addr: SocketAddr,
    /// The webhook receiver listens separately from the API
    pub webhook_addr: SocketAddr,
    pub gateway: GatewayConfig,
    /// HMAC key the gateway signs webhook bodies with
    pub webhook_secret: String,
    /// Uid promoted to admin at startup, if set
    pub bootstrap_admin: Option<String>,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_addr", &self.api_addr)
            .field("webhook_addr", &self.webhook_addr)
            .field("gateway", &self.gateway)
            .field("webhook_secret", &"<redacted>")
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));
        let addr = |name: &'static str, default: &str| -> Result<SocketAddr, ConfigError> {
            let value = optional(name).unwrap_or_else(|| default.to_string());
            value.parse().map_err(|_| ConfigError::Invalid { name, value })
        };

        let timeout_secs = match optional("ZAPUPI_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    name: "ZAPUPI_TIMEOUT_SECS",
                    value,
                })?,
            None => DEFAULT_GATEWAY_TIMEOUT_SECS,
        };

        let base_url =
            optional("ZAPUPI_BASE_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "ZAPUPI_BASE_URL",
                value: base_url,
            });
        }

        Ok(Self {
            api_addr: addr("ARENA_API_ADDR", DEFAULT_API_ADDR)?,
            webhook_addr: addr("ARENA_WEBHOOK_ADDR", DEFAULT_WEBHOOK_ADDR)?,
            gateway: GatewayConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                token_key: required("ZAPUPI_TOKEN_KEY")?,
                secret_key: required("ZAPUPI_SECRET_KEY")?,
                redirect_url: optional("ZAPUPI_REDIRECT_URL"),
                timeout: Duration::from_secs(timeout_secs),
            },
            webhook_secret: required("ZAPUPI_WEBHOOK_SECRET")?,
            bootstrap_admin: optional("ARENA_BOOTSTRAP_ADMIN"),
        })
    }
}
