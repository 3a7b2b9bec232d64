//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fleetmap_config::ConfigError;
use fleetmap_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not load data from {url}")]
    #[diagnostic(
        code(fleetmap::fetch_failed),
        help(
            "{reason}\n\
             Check that the server is reachable, or try: fleetmap locations --insecure"
        )
    )]
    FetchFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(fleetmap::auth_failed),
        help(
            "Verify the API token for profile '{profile}'.\n\
             Store one with: fleetmap config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(fleetmap::not_found),
        help("Run: fleetmap {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Server sent data fleetmap cannot read: {message}")]
    #[diagnostic(code(fleetmap::data_shape))]
    DataShape { message: String },

    #[error("Cannot draw floor {level}: {reason}")]
    #[diagnostic(
        code(fleetmap::projection),
        help("Pass the floor image size with --image-size WIDTHxHEIGHT")
    )]
    Projection { level: i32, reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fleetmap::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fleetmap::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: fleetmap config init --server <URL>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(fleetmap::no_config),
        help(
            "Create a profile with: fleetmap config init --server <URL>\n\
             Or pass --server / set FLEETMAP_SERVER.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(fleetmap::config))]
    Config { message: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(fleetmap::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    #[diagnostic(code(fleetmap::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FetchFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::FetchFailed {
                status: Some(401 | 403),
                ..
            }
            | CoreError::AuthenticationFailed { .. } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::FetchFailed { message, status } => CliError::FetchFailed {
                url: "the monitoring server".into(),
                reason: status.map_or_else(
                    || message.clone(),
                    |code| format!("HTTP {code}: {message}"),
                ),
            },

            CoreError::DataShapeMismatch { .. } => CliError::DataShape {
                message: err.to_string(),
            },

            CoreError::LocationNotFound { identifier } => CliError::NotFound {
                resource_type: "location".into(),
                identifier,
                list_command: "locations".into(),
            },

            CoreError::FloorNotFound { level } => CliError::NotFound {
                resource_type: "floor".into(),
                identifier: level.to_string(),
                list_command: "floors <LOCATION> --list".into(),
            },

            CoreError::ProjectionFailed { level, reason } => {
                CliError::Projection { level, reason }
            }

            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_fetch_is_an_auth_failure() {
        let err = CliError::from(CoreError::FetchFailed {
            message: "forbidden".into(),
            status: Some(403),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn server_error_is_a_connection_failure() {
        let err = CliError::from(CoreError::FetchFailed {
            message: "bad gateway".into(),
            status: Some(502),
        });
        assert!(matches!(&err, CliError::FetchFailed { reason, .. } if reason.contains("502")));
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn missing_floor_points_at_the_list() {
        let err = CliError::from(CoreError::FloorNotFound { level: -2 });
        assert!(
            matches!(&err, CliError::NotFound { identifier, .. } if identifier == "-2")
        );
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
    }
}
