// Shared transport configuration for building reqwest::Client instances.
//
// TLS, timeout and the bearer token live here so the HTTP client and the
// websocket upgrade request agree on how to reach the server.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// TLS verification mode (api-level mirror of core's TlsVerification).
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (for self-signed servers).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    pub token: Option<SecretString>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            token: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// When a token is configured it is sent as `Authorization: Bearer ...`
    /// on every request and marked sensitive so it never shows up in logs.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("fleetmap/", env!("CARGO_PKG_VERSION")))
            .default_headers(self.default_headers()?);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// The `Authorization` header value, if a token is configured.
    pub fn authorization(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }

    fn default_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        if let Some(value) = self.authorization() {
            let mut value = HeaderValue::from_str(&value).map_err(|_| Error::Authentication {
                message: "token contains characters not allowed in a header".into(),
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn authorization_uses_bearer_scheme() {
        let config = TransportConfig {
            token: Some(SecretString::from("abc123".to_string())),
            ..TransportConfig::default()
        };
        assert_eq!(config.authorization().as_deref(), Some("Bearer abc123"));
        let headers = config.default_headers().unwrap();
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
    }

    #[test]
    fn no_token_means_no_header() {
        let config = TransportConfig::default();
        assert!(config.authorization().is_none());
        assert!(config.default_headers().unwrap().is_empty());
    }

    #[test]
    fn rejects_token_with_newline() {
        let config = TransportConfig {
            token: Some(SecretString::from("bad\ntoken".to_string())),
            ..TransportConfig::default()
        };
        assert!(matches!(
            config.build_client(),
            Err(Error::Authentication { .. })
        ));
    }
}
