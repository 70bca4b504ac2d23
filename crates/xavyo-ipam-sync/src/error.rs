//! Error types for the IPAM sync crate.

use thiserror::Error;

/// Result type alias using `IpamError`.
pub type IpamResult<T> = Result<T, IpamError>;

/// Errors raised while talking to the IPAM service or the local inventory.
#[derive(Debug, Error)]
pub enum IpamError {
    /// The service host could not be reached at all.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Bad credentials or a malformed token response.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The service answered with a non-success status.
    #[error("IPAM API error: HTTP {status}: {detail}")]
    Api { status: u16, detail: String },

    /// A response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Single-record allocation failed.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Pool server configuration failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Local inventory operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Failure of a host-record allocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// The requested address is not an IPv4 or IPv6 literal.
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// The IPAM service failed or answered with an unexpected shape.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
}

/// Failure reported by an [`IpamStore`](crate::store::IpamStore) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced parent or record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a not-found error.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

/// A single invalid configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All field errors found while validating a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid configuration: {}", summarize(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    /// Whether the given field was reported.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
