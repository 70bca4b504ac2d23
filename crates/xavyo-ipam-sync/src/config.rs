//! Pool server configuration.
//!
//! Mirrors the settings an operator enters for one IPAM pool server. Values
//! deserialize with defaults for everything but the endpoint and credentials,
//! and [`PoolServerConfig::validate`] reports every bad field at once.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use url::Url;

use crate::error::{FieldError, IpamResult, ValidationErrors};

/// Fixed API prefix appended to the service origin.
const API_PREFIX: &str = "/api";

/// Configuration for one IPAM pool server.
#[derive(Clone, Deserialize)]
pub struct PoolServerConfig {
    /// Service root, with or without a path (e.g. "<https://ipam.example.com/api/>").
    pub service_url: String,

    /// Account used to obtain a session token.
    #[serde(default)]
    pub username: String,

    /// Password for `username`.
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub password: SecretString,

    /// Accept invalid TLS certificates from the service.
    #[serde(default)]
    pub ignore_tls_verify: bool,

    /// Minimum delay between two consecutive requests, in milliseconds.
    #[serde(default)]
    pub throttle_rate_ms: u64,

    /// Also mirror individual IP records for every pool.
    #[serde(default)]
    pub inventory_existing: bool,

    /// Per-request timeout (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Records requested per page (default: 100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Pagination ceiling per listing (default: 1000).
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Local pools loaded per group during address reconciliation (default: 50).
    #[serde(default = "default_pool_group_size")]
    pub pool_group_size: u32,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    1000
}

fn default_pool_group_size() -> u32 {
    50
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl std::fmt::Debug for PoolServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolServerConfig")
            .field("service_url", &self.service_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("ignore_tls_verify", &self.ignore_tls_verify)
            .field("throttle_rate_ms", &self.throttle_rate_ms)
            .field("inventory_existing", &self.inventory_existing)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("pool_group_size", &self.pool_group_size)
            .finish()
    }
}

impl PoolServerConfig {
    /// Create a configuration with defaults for everything but the endpoint
    /// and credentials.
    pub fn new(
        service_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            service_url: service_url.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            ignore_tls_verify: false,
            throttle_rate_ms: 0,
            inventory_existing: false,
            request_timeout_secs: default_request_timeout_secs(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            pool_group_size: default_pool_group_size(),
        }
    }

    /// Enable address inventory.
    #[must_use]
    pub fn with_inventory_existing(mut self, enabled: bool) -> Self {
        self.inventory_existing = enabled;
        self
    }

    /// Set the request throttle.
    #[must_use]
    pub fn with_throttle_rate_ms(mut self, ms: u64) -> Self {
        self.throttle_rate_ms = ms;
        self
    }

    /// Set the page size used for listings.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the pagination ceiling.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set the local pool group size.
    #[must_use]
    pub fn with_pool_group_size(mut self, size: u32) -> Self {
        self.pool_group_size = size;
        self
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// API base URL derived from `service_url`.
    pub fn api_base_url(&self) -> IpamResult<String> {
        api_base_url(&self.service_url)
    }

    /// Validate every field, collecting all problems.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if self.service_url.trim().is_empty() {
            errors.push(field_error("service_url", "is required"));
        } else {
            match Url::parse(self.service_url.trim()) {
                Ok(url) if !matches!(url.scheme(), "http" | "https") => errors.push(field_error(
                    "service_url",
                    format!("unsupported scheme: {}", url.scheme()),
                )),
                Ok(url) if url.host_str().is_none() => {
                    errors.push(field_error("service_url", "has no host"));
                }
                Ok(_) => {}
                Err(e) => errors.push(field_error("service_url", format!("is not a URL: {e}"))),
            }
        }

        if self.username.trim().is_empty() {
            errors.push(field_error("username", "is required"));
        }
        if self.password.expose_secret().is_empty() {
            errors.push(field_error("password", "is required"));
        }
        if self.request_timeout_secs == 0 {
            errors.push(field_error("request_timeout_secs", "must be > 0"));
        }
        if self.page_size == 0 {
            errors.push(field_error("page_size", "must be > 0"));
        }
        if self.max_pages == 0 {
            errors.push(field_error("max_pages", "must be > 0"));
        }
        if self.pool_group_size == 0 {
            errors.push(field_error("pool_group_size", "must be > 0"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }
}

fn field_error(field: &'static str, message: impl Into<String>) -> FieldError {
    FieldError {
        field,
        message: message.into(),
    }
}

/// Derive the API base from a service root.
///
/// Any path after the host is dropped and the fixed API prefix appended, so a
/// root configured with or without a path prefix resolves the same way.
pub fn api_base_url(service_url: &str) -> IpamResult<String> {
    let url = Url::parse(service_url.trim())?;
    let origin = url.origin().ascii_serialization();
    Ok(format!("{origin}{API_PREFIX}"))
}
