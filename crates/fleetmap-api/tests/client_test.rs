#![allow(clippy::unwrap_used)]
// Integration tests for `MonitoringClient` using wiremock.

use futures_util::{StreamExt, pin_mut};
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleetmap_api::{Error, MonitoringClient, RosterQuery, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, MonitoringClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = MonitoringClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

const LOCATION: &str = "8a0f4a52-2bd6-4d4c-a0b4-8c5b1b7c3c11";

fn roster_path() -> String {
    format!("/api/v1/monitoring/location/{LOCATION}/device/")
}

fn floorplan_path() -> String {
    format!("/api/v1/monitoring/location/{LOCATION}/indoor-coordinates/")
}

// ── Bulk feed ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_locations_follow_next_cursor() {
    let (server, client) = setup().await;

    let second = format!("{}/api/v1/monitoring/geojson/?page=2", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/v1/monitoring/geojson/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "next": null,
            "features": [{
                "type": "Feature",
                "id": "loc-2",
                "geometry": { "type": "Point", "coordinates": [2.35, 48.85] },
                "properties": { "name": "Paris", "ok_count": 1 }
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/monitoring/geojson/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "next": second,
            "features": [{
                "type": "Feature",
                "id": "loc-1",
                "geometry": { "type": "Point", "coordinates": [12.49, 41.89] },
                "properties": { "name": "Rome", "critical_count": 2 }
            }]
        })))
        .mount(&server)
        .await;

    let stream = client.locations();
    pin_mut!(stream);

    let mut names = Vec::new();
    while let Some(page) = stream.next().await {
        let page = page.unwrap();
        for feature in page.features {
            names.push(feature.properties.name.unwrap());
        }
    }

    assert_eq!(names, vec!["Rome".to_string(), "Paris".to_string()]);
}

// ── Roster ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_roster_sends_search_and_repeated_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(roster_path()))
        .and(query_param("search", "ap-01"))
        .and(query_param("status", "critical"))
        .and(query_param("status", "problem"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "next": null,
            "previous": null,
            "has_floorplan": true,
            "results": [{
                "id": "d1",
                "name": "ap-01",
                "mac_address": "00:11:22:33:44:55",
                "admin_edit_url": "/admin/config/device/d1/change/",
                "monitoring": { "status": "critical", "status_label": "critical" }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = RosterQuery {
        search: Some("ap-01".into()),
        statuses: vec!["critical".into(), "problem".into()],
    };
    let page = client.roster(LOCATION, &query).await.unwrap();

    assert_eq!(page.count, 1);
    assert!(page.has_floorplan);
    assert_eq!(page.results[0].name, "ap-01");
    assert_eq!(
        page.results[0].monitoring.as_ref().unwrap().status,
        "critical"
    );
}

#[tokio::test]
async fn test_roster_without_filter_has_no_query() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(roster_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 0, "next": null, "previous": null, "results": []
        })))
        .mount(&server)
        .await;

    client
        .roster(LOCATION, &RosterQuery::default())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn test_roster_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(roster_path()))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = client.roster(LOCATION, &RosterQuery::default()).await;
    assert!(
        matches!(result, Err(Error::Http { status: 500, .. })),
        "expected Http error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(roster_path()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Authentication credentials were not provided."
        })))
        .mount(&server)
        .await;

    let result = client.roster(LOCATION, &RosterQuery::default()).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_malformed_body_keeps_raw_text() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(roster_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    match client.roster(LOCATION, &RosterQuery::default()).await {
        Err(Error::Deserialization { body, .. }) => assert_eq!(body, "<html>login</html>"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

// ── Floorplan ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_floorplan_with_floor_param() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(floorplan_path()))
        .and(query_param("floor", "-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floors": [2, 1, -1],
            "next": null,
            "results": [{
                "device_id": "d9",
                "device_name": "basement-sw",
                "mac_address": "00:11:22:33:44:99",
                "floor": -1,
                "floor_name": "Basement",
                "image": "/media/floorplans/basement.png",
                "coordinates": { "x": 120.0, "y": -40.0 }
            }]
        })))
        .mount(&server)
        .await;

    let page = tokio_test::assert_ok!(client.floorplan(LOCATION, Some(-1)).await);
    assert_eq!(page.floors, vec![2, 1, -1]);
    assert_eq!(page.results[0].floor, -1);
    assert_eq!(page.results[0].floor_name.as_deref(), Some("Basement"));
}

#[tokio::test]
async fn test_floor_image_resolves_against_server_root() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/media/floorplans/basement.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1_u8, 2, 3]))
        .mount(&server)
        .await;

    let bytes = client.floor_image("/media/floorplans/basement.png").await.unwrap();
    assert_eq!(bytes, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_missing_floor_image() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/media/floorplans/gone.png"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    match client.floor_image("/media/floorplans/gone.png").await {
        Err(Error::Http { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "not here");
        }
        other => panic!("expected HTTP 404, got {other:?}"),
    }
}

// ── Transport ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/monitoring/geojson/"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 0, "next": null, "features": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = TransportConfig {
        token: Some(secrecy::SecretString::from("s3cret".to_string())),
        ..TransportConfig::default()
    };
    let client = MonitoringClient::new(Url::parse(&server.uri()).unwrap(), &transport).unwrap();

    let page = client.locations_page(None).await.unwrap();
    assert!(page.is_empty());
    assert_eq!(client.authorization(), Some("Bearer s3cret"));
}
