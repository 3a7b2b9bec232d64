#![allow(clippy::unwrap_used)]
// Floor images measured through `MonitoringClient`, against wiremock.

use std::io::Cursor;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleetmap_api::{MonitoringClient, TransportConfig};
use fleetmap_core::{
    CoreError, EntityId, FloorImageLoader, FloorPlanSession, ImageDimensions, IndoorProjector,
    StatusPalette,
};

const LOCATION: &str = "loc-1";

async fn setup() -> (MockServer, Arc<MonitoringClient>) {
    let server = MockServer::start().await;
    let client =
        MonitoringClient::new(Url::parse(&server.uri()).unwrap(), &TransportConfig::default())
            .unwrap();
    (server, Arc::new(client))
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbImage::new(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

async fn mount_floorplan(server: &MockServer, image: &str) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v1/monitoring/location/{LOCATION}/indoor-coordinates/"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floors": [1],
            "next": null,
            "results": [{
                "device_id": "d1",
                "device_name": "lobby-ap",
                "floor": 1,
                "floor_name": "Lobby",
                "image": image,
                "coordinates": { "x": 320.0, "y": -240.0 }
            }]
        })))
        .mount(server)
        .await;
}

async fn open(client: &Arc<MonitoringClient>) -> FloorPlanSession<MonitoringClient> {
    FloorPlanSession::open(
        EntityId::from(LOCATION),
        Arc::clone(client),
        IndoorProjector::for_max_zoom(2),
        StatusPalette::default(),
        5,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_dimensions_come_from_the_image() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/media/floorplans/lobby.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(640, 480)))
        .mount(&server)
        .await;

    let size = client.dimensions("/media/floorplans/lobby.png").await.unwrap();
    assert_eq!(size, ImageDimensions::new(640.0, 480.0));
}

#[tokio::test]
async fn test_floor_view_uses_measured_size() {
    let (server, client) = setup().await;
    mount_floorplan(&server, "/media/floorplans/lobby.png").await;
    Mock::given(method("GET"))
        .and(path("/media/floorplans/lobby.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(640, 480)))
        .mount(&server)
        .await;

    let mut session = open(&client).await;
    let view = session.show_selected(client.as_ref()).await.unwrap();

    assert_eq!(view.level, 1);
    assert_eq!(view.image_size, ImageDimensions::new(640.0, 480.0));
    assert_eq!(view.markers.len(), 1);
}

#[tokio::test]
async fn test_missing_image_fails_projection() {
    let (server, client) = setup().await;
    mount_floorplan(&server, "/media/floorplans/gone.png").await;
    Mock::given(method("GET"))
        .and(path("/media/floorplans/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut session = open(&client).await;
    let err = session.show_selected(client.as_ref()).await.unwrap_err();

    assert!(
        matches!(err, CoreError::ProjectionFailed { level: 1, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_undecodable_image_fails_projection() {
    let (server, client) = setup().await;
    mount_floorplan(&server, "/media/floorplans/lobby.png").await;
    Mock::given(method("GET"))
        .and(path("/media/floorplans/lobby.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let mut session = open(&client).await;
    let err = session.show_selected(client.as_ref()).await.unwrap_err();

    assert!(matches!(err, CoreError::ProjectionFailed { level: 1, .. }));
}
