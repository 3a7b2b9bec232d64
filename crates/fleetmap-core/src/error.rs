// ── Core error types ──
//
// User-facing errors from fleetmap-core. Consumers never see raw HTTP
// status codes or JSON parse failures; the `From<fleetmap_api::Error>`
// impl translates transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Fetch errors ─────────────────────────────────────────────────
    #[error("Fetch failed: {message}")]
    FetchFailed {
        message: String,
        /// HTTP status code (if the server answered at all).
        status: Option<u16>,
    },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    /// A record had missing or invalid fields. The record is skipped,
    /// the rest of the dataset is kept.
    #[error("Invalid {entity} {identifier}: {reason}")]
    DataShapeMismatch {
        entity: &'static str,
        identifier: String,
        reason: String,
    },

    #[error("Location not found: {identifier}")]
    LocationNotFound { identifier: String },

    #[error("Floor {level} not found")]
    FloorNotFound { level: i32 },

    // ── Rendering errors ─────────────────────────────────────────────
    #[error("Cannot place floor {level}: {reason}")]
    ProjectionFailed { level: i32, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn shape(
        entity: &'static str,
        identifier: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DataShapeMismatch {
            entity,
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Message suitable for an alert box.
    pub fn user_message(&self) -> String {
        match self {
            Self::FetchFailed { status: Some(code), .. } => {
                format!("Could not load data from the server (HTTP {code})")
            }
            Self::FetchFailed { status: None, .. } => {
                "Could not load data from the server".into()
            }
            other => other.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fleetmap_api::Error> for CoreError {
    fn from(err: fleetmap_api::Error) -> Self {
        match err {
            fleetmap_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            fleetmap_api::Error::Transport(ref e) => CoreError::FetchFailed {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            fleetmap_api::Error::InvalidUrl(e) => CoreError::FetchFailed {
                message: format!("Invalid URL: {e}"),
                status: None,
            },
            fleetmap_api::Error::Timeout { timeout_secs } => CoreError::FetchFailed {
                message: format!("request timed out after {timeout_secs}s"),
                status: None,
            },
            fleetmap_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            fleetmap_api::Error::Http { status, message } => CoreError::FetchFailed {
                message,
                status: Some(status),
            },
            fleetmap_api::Error::WebSocketConnect(reason) => CoreError::FetchFailed {
                message: format!("location stream connection failed: {reason}"),
                status: None,
            },
            fleetmap_api::Error::WebSocketClosed { code, reason } => CoreError::FetchFailed {
                message: format!("location stream closed (code {code}): {reason}"),
                status: None,
            },
            fleetmap_api::Error::Deserialization { message, body: _ } => {
                CoreError::FetchFailed {
                    message: format!("unexpected response shape: {message}"),
                    status: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_keeps_status() {
        let err = CoreError::from(fleetmap_api::Error::Http {
            status: 502,
            message: "bad gateway".into(),
        });
        assert!(matches!(
            err,
            CoreError::FetchFailed {
                status: Some(502),
                ..
            }
        ));
        assert_eq!(
            err.user_message(),
            "Could not load data from the server (HTTP 502)"
        );
    }

    #[test]
    fn authentication_is_not_a_fetch_failure() {
        let err = CoreError::from(fleetmap_api::Error::Authentication {
            message: "token expired".into(),
        });
        assert_eq!(err.to_string(), "Authentication failed: token expired");
    }
}
