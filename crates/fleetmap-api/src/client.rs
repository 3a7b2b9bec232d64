// Monitoring API HTTP client
//
// Wraps `reqwest::Client` with URL construction for the geo feed, the
// per-location roster and the indoor floorplan endpoints. Pagination
// cursors are the absolute `next` URLs the server hands back; the client
// follows them verbatim.

use async_stream::try_stream;
use futures_core::Stream;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{FloorPlanResponse, GeoCollection, RosterResponse};
use crate::transport::TransportConfig;

const GEOJSON_PATH: &str = "api/v1/monitoring/geojson/";
const LOCATION_STREAM_PATH: &str = "ws/loci/location/";

/// Longest response body kept in an `Error::Http` message.
const ERROR_BODY_LIMIT: usize = 512;

/// Filter parameters for a roster request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterQuery {
    pub search: Option<String>,
    pub statuses: Vec<String>,
}

/// HTTP client for the monitoring endpoints.
pub struct MonitoringClient {
    http: reqwest::Client,
    base_url: Url,
    authorization: Option<String>,
}

impl MonitoringClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the server root, e.g. `https://monitoring.example.com/`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: normalize_base(base_url),
            authorization: transport.authorization(),
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            authorization: None,
        }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The `Authorization` header value to reuse on the websocket upgrade.
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    // ── URL builders ─────────────────────────────────────────────────

    fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    fn roster_url(&self, location_id: &str) -> Result<Url, Error> {
        self.api_url(&format!("api/v1/monitoring/location/{location_id}/device/"))
    }

    fn floorplan_url(&self, location_id: &str) -> Result<Url, Error> {
        self.api_url(&format!(
            "api/v1/monitoring/location/{location_id}/indoor-coordinates/"
        ))
    }

    /// Websocket URL of the live location stream (`ws` for http, `wss` for https).
    pub fn location_stream_url(&self) -> Result<Url, Error> {
        let mut url = self.api_url(LOCATION_STREAM_PATH)?;
        let scheme = if self.base_url.scheme() == "http" {
            "ws"
        } else {
            "wss"
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot use scheme {scheme}")))?;
        Ok(url)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Fetch one page of the bulk location feed. `None` fetches the first page.
    pub async fn locations_page(&self, cursor: Option<&str>) -> Result<GeoCollection, Error> {
        let url = match cursor {
            Some(next) => Url::parse(next)?,
            None => self.api_url(GEOJSON_PATH)?,
        };
        self.get_json(url).await
    }

    /// Stream every page of the bulk location feed, following `next` cursors.
    pub fn locations(&self) -> impl Stream<Item = Result<GeoCollection, Error>> + '_ {
        try_stream! {
            let mut cursor: Option<String> = None;
            loop {
                let page = self.locations_page(cursor.as_deref()).await?;
                cursor = page.next.clone();
                yield page;
                if cursor.is_none() {
                    break;
                }
            }
        }
    }

    /// Fetch the first roster page for a location with the given filter.
    pub async fn roster(
        &self,
        location_id: &str,
        query: &RosterQuery,
    ) -> Result<RosterResponse, Error> {
        let mut url = self.roster_url(location_id)?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
                pairs.append_pair("search", search);
            }
            for status in &query.statuses {
                pairs.append_pair("status", status);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        self.get_json(url).await
    }

    /// Fetch a roster page from an opaque `next` cursor.
    pub async fn roster_page(&self, cursor: &str) -> Result<RosterResponse, Error> {
        self.get_json(Url::parse(cursor)?).await
    }

    /// Fetch indoor coordinates for a location, optionally restricted to a floor.
    pub async fn floorplan(
        &self,
        location_id: &str,
        floor: Option<i32>,
    ) -> Result<FloorPlanResponse, Error> {
        let mut url = self.floorplan_url(location_id)?;
        if let Some(floor) = floor {
            url.query_pairs_mut()
                .append_pair("floor", &floor.to_string());
        }
        self.get_json(url).await
    }

    /// Fetch a floorplan page from an opaque `next` cursor.
    pub async fn floorplan_page(&self, cursor: &str) -> Result<FloorPlanResponse, Error> {
        self.get_json(Url::parse(cursor)?).await
    }

    /// Download a floor image. `image` is an absolute URL or a path
    /// resolved against the server root.
    pub async fn floor_image(&self, image: &str) -> Result<Vec<u8>, Error> {
        let url = self.base_url.join(image)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        let bytes = resp.bytes().await?;
        trace!(bytes = bytes.len(), "floor image received");
        Ok(bytes.to_vec())
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        trace!(status = status.as_u16(), bytes = body.len(), "response received");

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

fn status_error(status: reqwest::StatusCode, body: &str) -> Error {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        Error::Authentication {
            message: truncate(body),
        }
    } else {
        Error::Http {
            status: status.as_u16(),
            message: truncate(body),
        }
    }
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> MonitoringClient {
        MonitoringClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let c = client("https://monitor.example.com/prefix");
        assert_eq!(c.base_url().as_str(), "https://monitor.example.com/prefix/");
        assert_eq!(
            c.roster_url("abc").unwrap().as_str(),
            "https://monitor.example.com/prefix/api/v1/monitoring/location/abc/device/"
        );
    }

    #[test]
    fn stream_url_switches_scheme() {
        assert_eq!(
            client("https://monitor.example.com/")
                .location_stream_url()
                .unwrap()
                .as_str(),
            "wss://monitor.example.com/ws/loci/location/"
        );
        assert_eq!(
            client("http://localhost:8000")
                .location_stream_url()
                .unwrap()
                .as_str(),
            "ws://localhost:8000/ws/loci/location/"
        );
    }

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate("oops"), "oops");
        let long = "x".repeat(ERROR_BODY_LIMIT + 10);
        assert_eq!(truncate(&long).len(), ERROR_BODY_LIMIT + 3);
    }
}
