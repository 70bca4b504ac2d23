//! Mock IPAM service using wiremock for integration testing.
//!
//! Serves the token, logout, range, address and allocation endpoints under
//! the `/api` prefix with canned or failing responses.

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xavyo_ipam_sync::{Credentials, IpamClient, PoolServerConfig, Session};

pub const TEST_USERNAME: &str = "admin";
pub const TEST_PASSWORD: &str = "s3cret";
pub const TEST_TOKEN: &str = "test-token-123";

pub const TOKEN_PATH: &str = "/api/auth/token";
pub const LOGOUT_PATH: &str = "/api/logout";
pub const RANGES_PATH: &str = "/api/ipam/ip-ranges/";
pub const ADDRESSES_PATH: &str = "/api/ipam/ip-addresses/";

/// A mock IPAM service.
pub struct MockIpamServer {
    server: MockServer,
}

impl MockIpamServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Pool server settings pointing at this mock.
    pub fn config(&self) -> PoolServerConfig {
        PoolServerConfig::new(self.uri(), TEST_USERNAME, TEST_PASSWORD)
    }

    /// Client without throttling, talking to this mock.
    pub fn client(&self) -> IpamClient {
        IpamClient::with_http_client(&self.uri(), reqwest::Client::new())
            .expect("mock uri is a valid URL")
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(TEST_USERNAME, TEST_PASSWORD)
    }

    /// Number of requests the mock has seen.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }

    // =========================================================================
    // Session mocks
    // =========================================================================

    /// Token endpoint accepting the test credentials.
    pub async fn mock_token_success(&self) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": TEST_TOKEN,
                "expires": null
            })))
            .mount(&self.server)
            .await;
    }

    /// Token endpoint answering with `status`.
    pub async fn mock_token_failure(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({ "detail": "Invalid credentials" })),
            )
            .mount(&self.server)
            .await;
    }

    /// Logout endpoint, expected to be called exactly `times` times.
    pub async fn mock_logout(&self, times: u64) {
        Mock::given(method("GET"))
            .and(path(LOGOUT_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Open a session against the mocked token endpoint.
    pub async fn open_session(&self, client: &IpamClient) -> Session {
        self.mock_token_success().await;
        Session::open(client, &self.credentials())
            .await
            .expect("mock token endpoint issues a session")
    }

    // =========================================================================
    // Listing mocks
    // =========================================================================

    /// The one-record test listing the refresh cycle issues before syncing.
    pub async fn mock_test_call(&self, status: u16) {
        let template = if status == 200 {
            ResponseTemplate::new(200).set_body_json(page_json(Vec::new(), None))
        } else {
            ResponseTemplate::new(status).set_body_string("upstream exploded")
        };
        Mock::given(method("GET"))
            .and(path(RANGES_PATH))
            .and(query_param("limit", "1"))
            .and(query_param("offset", "0"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Serve `items` from `list_path` in pages of `page_size`, each page
    /// expected exactly once. `filters` are required on every page request.
    pub async fn mock_pages(
        &self,
        list_path: &str,
        filters: &[(&str, &str)],
        items: Vec<Value>,
        page_size: usize,
    ) {
        let total = items.len();
        let chunks: Vec<Vec<Value>> = if items.is_empty() {
            vec![Vec::new()]
        } else {
            items.chunks(page_size).map(<[Value]>::to_vec).collect()
        };

        for (index, chunk) in chunks.into_iter().enumerate() {
            let offset = index * page_size;
            let next_offset = offset + page_size;
            let next = (next_offset < total).then(|| {
                format!(
                    "{}{list_path}?limit={page_size}&offset={next_offset}",
                    self.uri()
                )
            });

            let mut mock = Mock::given(method("GET"))
                .and(path(list_path))
                .and(header("Authorization", format!("Token {TEST_TOKEN}").as_str()))
                .and(query_param("limit", page_size.to_string().as_str()))
                .and(query_param("offset", offset.to_string().as_str()));
            for (key, value) in filters {
                mock = mock.and(query_param(*key, *value));
            }
            mock.respond_with(
                ResponseTemplate::new(200).set_body_json(page_json(chunk, next)),
            )
            .expect(1)
            .mount(&self.server)
            .await;
        }
    }

    /// A page request at `offset` that fails with `status`.
    pub async fn mock_page_failure(&self, list_path: &str, offset: usize, status: u16) {
        Mock::given(method("GET"))
            .and(path(list_path))
            .and(query_param("offset", offset.to_string().as_str()))
            .respond_with(ResponseTemplate::new(status).set_body_string("listing failed"))
            .expect(1)
            .mount(&self.server)
            .await;
    }
}

/// A listing page body.
pub fn page_json(results: Vec<Value>, next: Option<String>) -> Value {
    json!({
        "count": results.len(),
        "next": next,
        "previous": null,
        "results": results
    })
}

/// An IP range record.
pub fn network_json(id: u64, display: &str, start: &str, end: &str, size: u64) -> Value {
    let family = if start.contains(':') { 6 } else { 4 };
    json!({
        "id": id,
        "display": display,
        "start_address": start,
        "end_address": end,
        "size": size,
        "family": { "value": family, "label": format!("IPv{family}") }
    })
}

/// An IP address record.
pub fn address_json(id: u64, address: &str, status: &str, dns_name: &str) -> Value {
    json!({
        "id": id,
        "address": address,
        "status": { "value": status, "label": status },
        "dns_name": dns_name
    })
}
