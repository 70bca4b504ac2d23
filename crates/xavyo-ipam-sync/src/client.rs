//! IPAM REST client (reqwest-based).
//!
//! Thin typed wrapper over the service endpoints the sync engine needs:
//! token issue/logout, IP range listing, address CRUD and next-free
//! allocation. Every call goes through the shared [`RequestThrottle`] and the
//! client-wide timeout.

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::config::{api_base_url, PoolServerConfig};
use crate::error::{IpamError, IpamResult};
use crate::models::{AddressRecordRequest, Page, RemoteAddress};
use crate::session::{Credentials, Session};
use crate::throttle::RequestThrottle;

/// Remote collections that can be listed page by page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// IP ranges (pools).
    Networks,
    /// Individual IP records.
    Addresses,
}

impl ResourceKind {
    /// Path relative to the API base.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::Networks => "ipam/ip-ranges/",
            Self::Addresses => "ipam/ip-addresses/",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Networks => f.write_str("networks"),
            Self::Addresses => f.write_str("addresses"),
        }
    }
}

/// Body of the token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default, alias = "key")]
    token: Option<String>,
    #[serde(default)]
    expires: Option<serde_json::Value>,
}

/// Body sent to the token endpoint.
#[derive(Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// The service answers next-free allocation with either one record or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

/// HTTP client for one IPAM service.
#[derive(Debug, Clone)]
pub struct IpamClient {
    /// API base, e.g. "<https://ipam.example.com/api>".
    base_url: String,
    http_client: Client,
    throttle: RequestThrottle,
    connect_timeout: Duration,
}

impl IpamClient {
    /// Build a client from pool server settings.
    pub fn new(config: &PoolServerConfig) -> IpamResult<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.ignore_tls_verify)
            .user_agent("xavyo-ipam-sync/1.0")
            .build()
            .map_err(|e| IpamError::Connectivity(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.api_base_url()?,
            http_client,
            throttle: RequestThrottle::new(config.throttle_rate_ms),
            connect_timeout: config.request_timeout(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    pub fn with_http_client(service_url: &str, http_client: Client) -> IpamResult<Self> {
        Ok(Self {
            base_url: api_base_url(service_url)?,
            http_client,
            throttle: RequestThrottle::disabled(),
            connect_timeout: Duration::from_secs(5),
        })
    }

    /// Get the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ── Connectivity ──────────────────────────────────────────────────

    /// Check that the service host accepts TCP connections.
    pub async fn probe(&self) -> IpamResult<()> {
        let url = Url::parse(&self.base_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| IpamError::Connectivity("service URL has no host".to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| IpamError::Connectivity("service URL has no port".to_string()))?;

        debug!(host = %host, port, "Probing IPAM service");
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect((host.as_str(), port)))
            .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(IpamError::Connectivity(format!(
                "{host}:{port} not reachable: {e}"
            ))),
            Err(_) => Err(IpamError::Connectivity(format!(
                "{host}:{port} timed out after {:?}",
                self.connect_timeout
            ))),
        }
    }

    // ── Session ───────────────────────────────────────────────────────

    /// Exchange credentials for a session token (POST /auth/token).
    pub async fn issue_token(&self, credentials: &Credentials) -> IpamResult<Session> {
        let url = self.url("auth/token");
        debug!("IPAM POST {}", url);
        self.throttle.acquire().await;

        let response = self
            .http_client
            .post(&url)
            .json(&TokenRequest {
                username: credentials.username(),
                password: credentials.password(),
            })
            .send()
            .await
            .map_err(|e| IpamError::Auth(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(IpamError::Auth(format!(
                "Token endpoint returned {status}: {body}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| IpamError::Auth(format!("Failed to parse token response: {e}")))?;

        match body.token {
            Some(token) if !token.is_empty() => Ok(Session::new(
                token,
                body.expires.is_some_and(|v| !v.is_null()),
            )),
            _ => Err(IpamError::Auth(
                "Token response did not contain a token".to_string(),
            )),
        }
    }

    /// Revoke a session (GET /logout).
    pub async fn logout(&self, session: &Session) -> IpamResult<()> {
        let url = self.url("logout");
        debug!("IPAM GET {}", url);
        self.throttle.acquire().await;

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, session.authorization())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            self.handle_error_response(response).await
        }
    }

    // ── Listings ──────────────────────────────────────────────────────

    /// Fetch one page of a collection.
    pub async fn list_page<T: DeserializeOwned>(
        &self,
        session: &Session,
        kind: ResourceKind,
        filters: &[(&str, String)],
        limit: u32,
        offset: u64,
    ) -> IpamResult<Page<T>> {
        let mut query: Vec<(&str, String)> = filters.to_vec();
        query.push(("limit", limit.to_string()));
        query.push(("offset", offset.to_string()));
        self.get(session, kind.path(), &query).await
    }

    /// Find the address record at `address`, if one exists.
    pub async fn find_address(
        &self,
        session: &Session,
        address: &str,
    ) -> IpamResult<Option<RemoteAddress>> {
        let page: Page<RemoteAddress> = self
            .get(
                session,
                ResourceKind::Addresses.path(),
                &[("address", address.to_string())],
            )
            .await?;
        Ok(page.results.into_iter().next())
    }

    // ── Address records ───────────────────────────────────────────────

    /// Create an address record (POST /ipam/ip-addresses/).
    pub async fn create_address(
        &self,
        session: &Session,
        record: &AddressRecordRequest,
    ) -> IpamResult<RemoteAddress> {
        self.send_json(
            session,
            reqwest::Method::POST,
            ResourceKind::Addresses.path(),
            record,
        )
        .await
    }

    /// Replace an address record (PUT /ipam/ip-addresses/:id/).
    pub async fn replace_address(
        &self,
        session: &Session,
        id: u64,
        record: &AddressRecordRequest,
    ) -> IpamResult<RemoteAddress> {
        let path = format!("{}{id}/", ResourceKind::Addresses.path());
        self.send_json(session, reqwest::Method::PUT, &path, record)
            .await
    }

    /// Let the service pick the next free address in a range
    /// (POST /ipam/ip-ranges/:id/available-ips/).
    pub async fn allocate_next_address(
        &self,
        session: &Session,
        range_id: &str,
        record: &AddressRecordRequest,
    ) -> IpamResult<RemoteAddress> {
        let path = format!("{}{range_id}/available-ips/", ResourceKind::Networks.path());
        let body: OneOrMany<RemoteAddress> = self
            .send_json(session, reqwest::Method::POST, &path, record)
            .await?;
        match body {
            OneOrMany::One(address) => Ok(address),
            OneOrMany::Many(list) => list.into_iter().next().ok_or_else(|| {
                IpamError::Parse("available-ips returned an empty list".to_string())
            }),
        }
    }

    // ── Internal HTTP Methods ─────────────────────────────────────────

    async fn get<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        query: &[(&str, String)],
    ) -> IpamResult<T> {
        let url = self.url(path);
        debug!("IPAM GET {} (query={:?})", url, query);
        self.throttle.acquire().await;

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, session.authorization())
            .query(query)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        session: &Session,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> IpamResult<T> {
        let url = self.url(path);
        debug!("IPAM {} {}", method, url);
        self.throttle.acquire().await;

        let response = self
            .http_client
            .request(method, &url)
            .header(reqwest::header::AUTHORIZATION, session.authorization())
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    // ── Response Handling ─────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> IpamResult<T> {
        if response.status().is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| IpamError::Parse(format!("Failed to parse response: {e}")))
        } else {
            self.handle_error_response(response).await
        }
    }

    async fn handle_error_response<T>(&self, response: reqwest::Response) -> IpamResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IpamError::Auth(format!("Request rejected ({status}): {body}")));
        }

        let detail = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            body
        };
        Err(IpamError::Api {
            status: status.as_u16(),
            detail,
        })
    }
}
