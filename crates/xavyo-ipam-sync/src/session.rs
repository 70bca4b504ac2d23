//! Token session lifecycle against the IPAM service.
//!
//! A [`Session`] is an explicit value: it is opened once per cycle, passed to
//! every authenticated call, and consumed by [`Session::close`].

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::client::IpamClient;
use crate::config::PoolServerConfig;
use crate::error::IpamResult;

/// Username/password used to obtain a session token.
///
/// The [`Debug`] impl redacts the password to prevent accidental credential
/// exposure in log output.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Credentials configured for a pool server.
    #[must_use]
    pub fn from_config(config: &PoolServerConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// An authenticated session, scoped to one orchestration run.
pub struct Session {
    token: SecretString,
    expires_implicitly: bool,
}

impl Session {
    pub(crate) fn new(token: String, expires_implicitly: bool) -> Self {
        Self {
            token: SecretString::from(token),
            expires_implicitly,
        }
    }

    /// Obtain a token. Fails with [`IpamError::Auth`](crate::IpamError::Auth)
    /// when the call fails, is rejected, or returns no token.
    pub async fn open(client: &IpamClient, credentials: &Credentials) -> IpamResult<Self> {
        debug!(username = %credentials.username(), "Opening IPAM session");
        client.issue_token(credentials).await
    }

    /// Best-effort logout. Failures are logged and swallowed.
    pub async fn close(self, client: &IpamClient) {
        match client.logout(&self).await {
            Ok(()) => debug!("IPAM session closed"),
            Err(e) => warn!(error = %e, "IPAM logout failed"),
        }
    }

    /// Whether the service expires the token on its own.
    #[must_use]
    pub fn expires_implicitly(&self) -> bool {
        self.expires_implicitly
    }

    /// Value of the `Authorization` header for this session.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Token {}", self.token.expose_secret())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("expires_implicitly", &self.expires_implicitly)
            .finish()
    }
}
