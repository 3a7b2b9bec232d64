//! CLI-specific configuration layer: `GlobalOpts` overrides on top of the
//! shared `fleetmap-config` crate.
//!
//! Core never sees these types -- it receives a pre-built `ServerConfig`
//! and `ViewerConfig`.

use std::time::Duration;

use secrecy::SecretString;

use fleetmap_config::{Config, parse_server_url, profile_to_server_config};
use fleetmap_core::{ServerConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use fleetmap_config::{config_path, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `ServerConfig` from the config file, profile, and CLI overrides.
///
/// Without a matching profile, `--server` alone is enough.
pub fn resolve_server_config(global: &GlobalOpts, cfg: &Config) -> Result<ServerConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let mut server = if let Some(profile) = cfg.profiles.get(&profile_name) {
        profile_to_server_config(profile, &profile_name, &cfg.defaults)?
    } else if global.profile.is_some() {
        let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
        available.sort();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    } else {
        let url_str = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;
        let mut server = ServerConfig::new(parse_server_url(url_str)?);
        server.timeout = Duration::from_secs(cfg.defaults.timeout);
        if cfg.defaults.insecure {
            server.tls = TlsVerification::DangerAcceptInvalid;
        }
        server
    };

    apply_overrides(&mut server, global)?;
    Ok(server)
}

fn apply_overrides(server: &mut ServerConfig, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(ref url) = global.server {
        server.url = parse_server_url(url)?;
    }
    if let Some(ref token) = global.token {
        server.token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        server.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        server.timeout = Duration::from_secs(secs);
    }
    Ok(())
}
