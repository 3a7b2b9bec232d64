//! Live location stream with auto-reconnect.
//!
//! A spawned task keeps one websocket to the server's location channel
//! open and fans parsed [`LocationEvent`]s out through a
//! [`tokio::sync::broadcast`] channel. Lost connections are retried with
//! capped exponential backoff. The connection state is published on a
//! `watch` channel so a front-end can show a "live" indicator.
//!
//! Delivery is at-least-once: after a reconnect the server may resend
//! recent positions, so consumers must apply events idempotently.
//!
//! ```rust,ignore
//! let url = client.location_stream_url()?;
//! let handle = LocationStreamHandle::connect(url, ReconnectConfig::default(), cancel, None);
//! let mut rx = handle.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     println!("{} moved", event.id);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::models::LocationEvent;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── Configuration ────────────────────────────────────────────────────

/// Reconnect policy for the location stream.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Ceiling for the wait between retries. Default: 30s.
    pub max_delay: Duration,
    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Where the background task currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Live,
    /// Waiting before retry number `attempt`.
    Retrying { attempt: u32, delay: Duration },
    /// Cancelled, or retries exhausted.
    Stopped,
}

// ── Handle ───────────────────────────────────────────────────────────

/// Handle to a running location stream.
///
/// [`shutdown`](Self::shutdown) (or cancelling the token given to
/// [`connect`](Self::connect)) stops the background task.
pub struct LocationStreamHandle {
    events: broadcast::Receiver<Arc<LocationEvent>>,
    state: watch::Receiver<StreamState>,
    cancel: CancellationToken,
}

impl LocationStreamHandle {
    /// Spawn the stream task and return immediately.
    ///
    /// `authorization` is sent as the `Authorization` header of the
    /// upgrade request. Must be called from within a tokio runtime.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        authorization: Option<String>,
    ) -> Self {
        let (event_tx, events) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(StreamState::Connecting);

        let task = StreamTask {
            url: ws_url,
            authorization,
            events: event_tx,
            state: state_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run(reconnect));

        Self {
            events,
            state,
            cancel,
        }
    }

    /// A new receiver of location events. A receiver that falls behind
    /// gets [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LocationEvent>> {
        self.events.resubscribe()
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Follow state changes.
    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.state.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background task ──────────────────────────────────────────────────

struct StreamTask {
    url: Url,
    authorization: Option<String>,
    events: broadcast::Sender<Arc<LocationEvent>>,
    state: watch::Sender<StreamState>,
    cancel: CancellationToken,
}

impl StreamTask {
    async fn run(self, reconnect: ReconnectConfig) {
        let max_retries = reconnect.max_retries;
        let mut backoff = Backoff::new(reconnect);

        while !self.cancel.is_cancelled() {
            self.state.send_replace(StreamState::Connecting);
            match self.session().await {
                Ok(true) => {
                    info!("location stream closed by server, reconnecting");
                    backoff.reset();
                    continue;
                }
                Ok(false) => break,
                Err(e) if e.is_transient() || matches!(e, Error::WebSocketClosed { .. }) => {
                    warn!(error = %e, failures = backoff.failures(), "location stream error");
                }
                Err(e) => {
                    warn!(error = %e, "location stream failed, not retrying");
                    break;
                }
            }

            if max_retries.is_some_and(|max| backoff.failures() >= max) {
                warn!(failures = backoff.failures(), "giving up on the location stream");
                break;
            }

            let delay = backoff.next_delay();
            self.state.send_replace(StreamState::Retrying {
                attempt: backoff.failures(),
                delay,
            });
            debug!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "retrying");

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.state.send_replace(StreamState::Stopped);
        debug!("location stream task exiting");
    }

    /// One connection. `Ok(true)` when the server ended it and a new one
    /// should follow, `Ok(false)` when cancelled.
    async fn session(&self) -> Result<bool, Error> {
        info!(url = %self.url, "connecting to location stream");

        let uri: tungstenite::http::Uri = self
            .url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
        let mut request = ClientRequestBuilder::new(uri);
        if let Some(value) = self.authorization.as_deref() {
            request = request.with_header("Authorization", value);
        }

        let connect = tokio_tungstenite::connect_async(request);
        let (socket, _response) = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(false),
            result = connect => result.map_err(handshake_error)?,
        };

        self.state.send_replace(StreamState::Live);
        info!("location stream live");

        let (_sink, mut frames) = socket.split();
        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(false),
                frame = frames.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    for event in parse_frame(&text) {
                        // No subscribers is fine.
                        let _ = self.events.send(Arc::new(event));
                    }
                }
                Some(Ok(Message::Close(close))) => {
                    return match close {
                        Some(cf) if cf.code != CloseCode::Normal => {
                            Err(Error::WebSocketClosed {
                                code: u16::from(cf.code),
                                reason: cf.reason.to_string(),
                            })
                        }
                        _ => Ok(true),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                None => return Ok(true),
            }
        }
    }
}

fn handshake_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::Http(ref response) if matches!(response.status().as_u16(), 401 | 403) => {
            Error::Authentication {
                message: format!("location stream refused (HTTP {})", response.status()),
            }
        }
        other => Error::WebSocketConnect(other.to_string()),
    }
}

// ── Frames ───────────────────────────────────────────────────────────

/// Events in one text frame: a single event object or an array of them.
/// Unreadable frames and entries are logged and skipped.
fn parse_frame(text: &str) -> Vec<LocationEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "unreadable location frame");
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<LocationEvent>(item) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!(error = %e, "skipping location event");
                None
            }
        })
        .collect()
}

// ── Backoff ──────────────────────────────────────────────────────────

/// Capped exponential backoff. The delay doubles per consecutive
/// failure and is spread ±25% so many clients don't retry in lockstep.
#[derive(Debug)]
struct Backoff {
    config: ReconnectConfig,
    failures: u32,
}

impl Backoff {
    fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    fn failures(&self) -> u32 {
        self.failures
    }

    fn reset(&mut self) {
        self.failures = 0;
    }

    /// Delay before the next retry; counts one more failure.
    fn next_delay(&mut self) -> Duration {
        let exponent = i32::try_from(self.failures.min(30)).unwrap_or(30);
        let base = self.config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
        let capped = base.min(self.config.max_delay.as_secs_f64());
        // Deterministic spread from the failure count.
        let spread = 1.0 + 0.25 * (f64::from(self.failures) * 7.3).sin();
        self.failures = self.failures.saturating_add(1);
        Duration::from_secs_f64((capped * spread).max(0.0))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_then_caps() {
        let mut backoff = Backoff::new(ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        });
        let first = backoff.next_delay();
        let second = backoff.next_delay();
        let third = backoff.next_delay();
        assert!(second > first && third > second, "{first:?} {second:?} {third:?}");

        for _ in 0..20 {
            assert!(backoff.next_delay() <= Duration::from_millis(12_500));
        }
        assert_eq!(backoff.failures(), 23);

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
    }

    #[test]
    fn backoff_survives_huge_failure_counts() {
        let mut backoff = Backoff::new(ReconnectConfig::default());
        backoff.failures = u32::MAX;
        assert!(backoff.next_delay() <= Duration::from_millis(37_500));
        assert_eq!(backoff.failures(), u32::MAX);
    }

    #[test]
    fn single_event_frame() {
        let raw = serde_json::json!({
            "id": "3f1c2b8e-6d0c-4c8e-9a55-2d2f7c1f0a01",
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [12.49, 41.89] },
            "properties": { "name": "Rome" }
        });
        let events = parse_frame(&raw.to_string());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "3f1c2b8e-6d0c-4c8e-9a55-2d2f7c1f0a01");
        assert_eq!(
            events[0].geometry.as_ref().unwrap().coordinates,
            serde_json::json!([12.49, 41.89])
        );
    }

    #[test]
    fn batched_frame_skips_bad_entries() {
        let raw = serde_json::json!([
            { "id": 7, "geometry": { "coordinates": [1.0, 2.0] } },
            "garbage",
            { "id": 8, "sequence": 3 }
        ]);
        let events = parse_frame(&raw.to_string());
        let ids: Vec<_> = events.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec![serde_json::json!(7), serde_json::json!(8)]);
    }

    #[test]
    fn unreadable_frame_yields_nothing() {
        assert!(parse_frame("not json at all").is_empty());
    }
}
