//! Integration tests for paginated fetching.

mod helpers;

use helpers::mock_ipam_server::{
    address_json, network_json, MockIpamServer, ADDRESSES_PATH, RANGES_PATH,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};
use xavyo_ipam_sync::models::{RemoteAddress, RemoteNetwork};
use xavyo_ipam_sync::{fetch_all, PageLimits, ResourceKind};

fn networks(n: u64) -> Vec<serde_json::Value> {
    (1..=n)
        .map(|id| {
            network_json(
                id,
                &format!("range-{id}"),
                &format!("10.{}.{}.1/24", id / 256, id % 256),
                &format!("10.{}.{}.254/24", id / 256, id % 256),
                254,
            )
        })
        .collect()
}

fn limits(page_size: u32, max_pages: u32) -> PageLimits {
    PageLimits {
        page_size,
        max_pages,
    }
}

#[tokio::test]
async fn test_fetch_walks_every_page_in_order() {
    let server = MockIpamServer::new().await;
    let client = server.client();
    let session = server.open_session(&client).await;
    server.mock_pages(RANGES_PATH, &[], networks(25), 10).await;

    let outcome = fetch_all::<RemoteNetwork>(
        &client,
        &session,
        ResourceKind::Networks,
        &[],
        limits(10, 1000),
    )
    .await;

    assert!(outcome.is_complete());
    assert!(!outcome.truncated);
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.items.len(), 25);
    let ids: Vec<u64> = outcome.items.iter().map(|n| n.id).collect();
    assert_eq!(ids, (1..=25).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_fetch_exact_multiple_of_page_size() {
    let server = MockIpamServer::new().await;
    let client = server.client();
    let session = server.open_session(&client).await;
    server.mock_pages(RANGES_PATH, &[], networks(20), 10).await;

    let outcome = fetch_all::<RemoteNetwork>(
        &client,
        &session,
        ResourceKind::Networks,
        &[],
        limits(10, 1000),
    )
    .await;

    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.items.len(), 20);
}

#[tokio::test]
async fn test_fetch_follows_server_capped_pages() {
    let server = MockIpamServer::new().await;
    let client = server.client();
    let session = server.open_session(&client).await;
    // The service serves at most 5 records per page even though 10 are asked for.
    let all = networks(20);
    for (index, chunk) in all.chunks(5).enumerate() {
        let offset = index * 5;
        let next = (offset + 5 < all.len())
            .then(|| format!("http://ignored/?offset={}", offset + 5));
        Mock::given(method("GET"))
            .and(path(RANGES_PATH))
            .and(query_param("limit", "10"))
            .and(query_param("offset", offset.to_string().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 20,
                "next": next,
                "results": chunk.to_vec()
            })))
            .expect(1)
            .mount(server.server())
            .await;
    }

    let outcome = fetch_all::<RemoteNetwork>(
        &client,
        &session,
        ResourceKind::Networks,
        &[],
        limits(10, 1000),
    )
    .await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.pages, 4);
    let ids: Vec<u64> = outcome.items.iter().map(|n| n.id).collect();
    assert_eq!(ids, (1..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_fetch_empty_collection_is_complete() {
    let server = MockIpamServer::new().await;
    let client = server.client();
    let session = server.open_session(&client).await;
    server.mock_pages(RANGES_PATH, &[], Vec::new(), 10).await;

    let outcome = fetch_all::<RemoteNetwork>(
        &client,
        &session,
        ResourceKind::Networks,
        &[],
        limits(10, 1000),
    )
    .await;

    assert!(outcome.is_complete());
    assert!(outcome.items.is_empty());
    assert_eq!(outcome.pages, 1);
}

#[tokio::test]
async fn test_fetch_stops_on_empty_page_despite_next() {
    let server = MockIpamServer::new().await;
    let client = server.client();
    let session = server.open_session(&client).await;
    Mock::given(method("GET"))
        .and(path(RANGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 0,
            "next": "http://ignored/?offset=10",
            "results": []
        })))
        .expect(1)
        .mount(server.server())
        .await;

    let outcome = fetch_all::<RemoteNetwork>(
        &client,
        &session,
        ResourceKind::Networks,
        &[],
        limits(10, 1000),
    )
    .await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.pages, 1);
}

#[tokio::test]
async fn test_fetch_failure_keeps_earlier_pages() {
    let server = MockIpamServer::new().await;
    let client = server.client();
    let session = server.open_session(&client).await;
    // The first page claims 30 records; the second page request fails.
    Mock::given(method("GET"))
        .and(path(RANGES_PATH))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 30,
            "next": "http://ignored/?offset=10",
            "results": networks(10)
        })))
        .expect(1)
        .mount(server.server())
        .await;
    server.mock_page_failure(RANGES_PATH, 10, 502).await;

    let outcome = fetch_all::<RemoteNetwork>(
        &client,
        &session,
        ResourceKind::Networks,
        &[],
        limits(10, 1000),
    )
    .await;

    assert!(!outcome.is_complete());
    assert_eq!(outcome.items.len(), 10);
    assert_eq!(outcome.pages, 2);
    assert!(outcome.failure.unwrap().contains("502"));
}

#[tokio::test]
async fn test_fetch_stops_at_page_ceiling() {
    let server = MockIpamServer::new().await;
    let client = server.client();
    let session = server.open_session(&client).await;
    // Every page claims there is another one.
    Mock::given(method("GET"))
        .and(path(RANGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1000,
            "next": "http://ignored/?offset=next",
            "results": networks(5)
        })))
        .expect(3)
        .mount(server.server())
        .await;

    let outcome = fetch_all::<RemoteNetwork>(
        &client,
        &session,
        ResourceKind::Networks,
        &[],
        limits(5, 3),
    )
    .await;

    assert!(outcome.truncated);
    assert!(outcome.is_complete());
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.items.len(), 15);
}

#[tokio::test]
async fn test_fetch_unparseable_page_is_a_failure() {
    let server = MockIpamServer::new().await;
    let client = server.client();
    let session = server.open_session(&client).await;
    Mock::given(method("GET"))
        .and(path(ADDRESSES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": "nope" })))
        .mount(server.server())
        .await;

    let outcome = fetch_all::<RemoteAddress>(
        &client,
        &session,
        ResourceKind::Addresses,
        &[],
        limits(10, 1000),
    )
    .await;

    assert!(!outcome.is_complete());
    assert!(outcome.items.is_empty());
}

#[tokio::test]
async fn test_fetch_passes_filters() {
    let server = MockIpamServer::new().await;
    let client = server.client();
    let session = server.open_session(&client).await;
    server
        .mock_pages(
            ADDRESSES_PATH,
            &[("parent", "10.0.0.1/24")],
            vec![
                address_json(1, "10.0.0.5/24", "active", ""),
                address_json(2, "10.0.0.6/24", "reserved", "db.example.com"),
            ],
            10,
        )
        .await;

    let outcome = fetch_all::<RemoteAddress>(
        &client,
        &session,
        ResourceKind::Addresses,
        &[("parent", "10.0.0.1/24".to_string())],
        limits(10, 1000),
    )
    .await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.items.len(), 2);
    assert_eq!(outcome.items[1].status.as_deref(), Some("reserved"));
}
