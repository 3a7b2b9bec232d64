//! Shared configuration for fleetmap.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `fleetmap_core::ServerConfig` / `ViewerConfig`. The CLI
//! layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use fleetmap_core::{ServerConfig, TlsVerification, ViewerConfig};

const KEYRING_SERVICE: &str = "fleetmap";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' is not configured")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Map behaviour: palette, debounce timings, floor window, limits.
    #[serde(default)]
    pub viewer: ViewerConfig,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            viewer: ViewerConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
            .to_owned();
        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile)),
            None => Err(ConfigError::UnknownProfile { name }),
        }
    }

    /// Reject viewer settings the map cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.viewer.max_points_fetched == 0 {
            return Err(ConfigError::Validation {
                field: "viewer.max_points_fetched".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.viewer.floors.window_size == 0 {
            return Err(ConfigError::Validation {
                field: "viewer.floors.window_size".into(),
                reason: "must be at least 1".into(),
            });
        }
        if !self.viewer.roster.scroll_threshold_px.is_finite()
            || self.viewer.roster.scroll_threshold_px < 0.0
        {
            return Err(ConfigError::Validation {
                field: "viewer.roster.scroll_threshold_px".into(),
                reason: "must be a non-negative number".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named server profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Server root URL (e.g., "https://monitor.example.com").
    pub server: String,

    /// API token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the API token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Subscribe to live location updates.
    pub websocket: Option<bool>,
}

impl Profile {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "fleetmap", "fleetmap").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fleetmap");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + `FLEETMAP_*` environment variables. A missing file
/// yields the defaults. Nested keys use `__`, e.g.
/// `FLEETMAP_DEFAULTS__TIMEOUT=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FLEETMAP_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Resolve the API token: `token_env` variable, then the system keyring,
/// then plaintext. `None` means the server is queried anonymously.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    token_chain(
        profile,
        |var| std::env::var(var).ok(),
        || keyring_token(profile_name),
    )
}

fn token_chain(
    profile: &Profile,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl FnOnce() -> Option<String>,
) -> Option<SecretString> {
    // 1. Profile's token_env → env var lookup
    if let Some(value) = profile.token_env.as_deref().and_then(env) {
        return Some(SecretString::from(value));
    }

    // 2. System keyring
    if let Some(secret) = keyring() {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    profile.token.clone().map(SecretString::from)
}

fn keyring_token(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
        .and_then(|entry| entry.get_password())
        .ok()
}

/// Store a profile's token in the system keyring.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))?;
    entry.set_password(token)?;
    Ok(())
}

// ── Translation to core config ──────────────────────────────────────

/// Build a `ServerConfig` from a profile, no CLI flag overrides.
pub fn profile_to_server_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ServerConfig, ConfigError> {
    build_server_config(profile, defaults, resolve_token(profile, profile_name))
}

fn build_server_config(
    profile: &Profile,
    defaults: &Defaults,
    token: Option<SecretString>,
) -> Result<ServerConfig, ConfigError> {
    let url = parse_server_url(&profile.server)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let timeout_secs = profile.timeout.unwrap_or(defaults.timeout);
    if timeout_secs == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    Ok(ServerConfig {
        url,
        token,
        tls,
        timeout: Duration::from_secs(timeout_secs),
        websocket_enabled: profile.websocket.unwrap_or(true),
    })
}

/// Parse and check a server URL. Only http(s) is accepted.
pub fn parse_server_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.trim().parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("expected http or https, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout, 30);
        assert_eq!(cfg.viewer, ViewerConfig::default());
    }

    #[test]
    fn profiles_and_viewer_overrides_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r##"
default_profile = "lab"

[viewer]
max_points_fetched = 500

[viewer.roster]
search_debounce = 450

[viewer.palette]
ok = "#00ff00"

[profiles.lab]
server = "https://monitor.lab.example"
timeout = 5
websocket = false
"##,
        );

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.viewer.max_points_fetched, 500);
        assert_eq!(cfg.viewer.roster.search_debounce, Duration::from_millis(450));
        assert_eq!(cfg.viewer.roster.scroll_debounce, Duration::from_millis(100));
        assert_eq!(cfg.viewer.palette.ok, "#00ff00");
        assert_eq!(cfg.viewer.palette.critical, "#a72d1d");

        let (name, profile) = cfg.profile(None).unwrap();
        assert_eq!(name, "lab");
        let server = build_server_config(profile, &cfg.defaults, None).unwrap();
        assert_eq!(server.url.as_str(), "https://monitor.lab.example/");
        assert_eq!(server.timeout, Duration::from_secs(5));
        assert!(!server.websocket_enabled);
        assert_eq!(server.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn zero_point_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[viewer]\nmax_points_fetched = 0\n");
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = Config::default();
        let err = cfg.profile(Some("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { name } if name == "nope"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles
            .insert("default".into(), Profile::new("http://localhost:8000"));
        cfg.viewer.floors.window_size = 7;

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.viewer.floors.window_size, 7);
        assert_eq!(loaded.profiles["default"].server, "http://localhost:8000");
    }

    #[test]
    fn token_chain_order() {
        let profile = Profile {
            token: Some("plain".into()),
            token_env: Some("FLEETMAP_TEST_TOKEN".into()),
            ..Profile::new("https://m.example")
        };

        let from_env = token_chain(&profile, |_| Some("env".into()), || Some("ring".into()));
        assert_eq!(from_env.unwrap().expose_secret(), "env");

        let from_ring = token_chain(&profile, |_| None, || Some("ring".into()));
        assert_eq!(from_ring.unwrap().expose_secret(), "ring");

        let plain = token_chain(&profile, |_| None, || None);
        assert_eq!(plain.unwrap().expose_secret(), "plain");

        let anonymous = token_chain(&Profile::new("https://m.example"), |_| None, || None);
        assert!(anonymous.is_none());
    }

    #[test]
    fn insecure_beats_custom_ca() {
        let profile = Profile {
            insecure: Some(true),
            ca_cert: Some(PathBuf::from("/etc/ca.pem")),
            ..Profile::new("https://m.example")
        };
        let tls = build_server_config(&profile, &Defaults::default(), None)
            .unwrap()
            .tls;
        assert_eq!(tls, TlsVerification::DangerAcceptInvalid);

        let profile = Profile {
            insecure: Some(false),
            ..profile
        };
        let tls = build_server_config(&profile, &Defaults::default(), None)
            .unwrap()
            .tls;
        assert_eq!(tls, TlsVerification::CustomCa(PathBuf::from("/etc/ca.pem")));
    }

    #[test]
    fn server_url_must_be_http() {
        assert!(parse_server_url("https://m.example").is_ok());
        assert!(matches!(
            parse_server_url("ftp://m.example"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            parse_server_url("not a url"),
            Err(ConfigError::Validation { .. })
        ));
    }
}
