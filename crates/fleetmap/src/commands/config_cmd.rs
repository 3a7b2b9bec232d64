//! Config subcommand handlers.

use std::io::{self, BufRead};

use fleetmap_config::{Config, Profile, parse_server_url, store_token};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the plaintext token.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let viewer = &cfg.viewer;
    let _ = writeln!(out);
    let _ = writeln!(out, "[viewer]");
    let _ = writeln!(out, "max_points_fetched = {}", viewer.max_points_fetched);
    let _ = writeln!(
        out,
        "default_center = {{ lat = {}, lng = {} }}",
        viewer.default_center.lat, viewer.default_center.lng
    );
    let _ = writeln!(out, "default_zoom = {}", viewer.default_zoom);
    let _ = writeln!(out, "floors.window_size = {}", viewer.floors.window_size);
    let _ = writeln!(out, "floors.max_zoom = {}", viewer.floors.max_zoom);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "server = \"{}\"", p.server);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(websocket) = p.websocket {
            let _ = writeln!(out, "websocket = {websocket}");
        }
    }

    out
}

fn parse_bool(field: &str, value: &str) -> Result<bool, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: "must be 'true' or 'false'".into(),
    })
}

/// Apply `key = value` to a profile.
fn set_profile_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "server" => {
            parse_server_url(&value)?;
            profile.server = value;
        }
        "token_env" | "token-env" => profile.token_env = Some(value),
        "insecure" => profile.insecure = Some(parse_bool("insecure", &value)?),
        "websocket" => profile.websocket = Some(parse_bool("websocket", &value)?),
        "timeout" => {
            let secs: u64 = value.parse().map_err(|_| CliError::Validation {
                field: "timeout".into(),
                reason: "must be a number (seconds)".into(),
            })?;
            if secs == 0 {
                return Err(CliError::Validation {
                    field: "timeout".into(),
                    reason: "must be at least 1 second".into(),
                });
            }
            profile.timeout = Some(secs);
        }
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: server, token_env, \
                     insecure, timeout, websocket, ca_cert"
                ),
            });
        }
    }
    Ok(())
}

fn profile_not_found(name: String, cfg: &Config) -> CliError {
    let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init {
            server,
            name,
            token_env,
        } => {
            parse_server_url(&server)?;
            let mut cfg = config::load_config_or_default();
            let profile = Profile {
                token_env,
                ..Profile::new(server)
            };
            cfg.profiles.insert(name.clone(), profile);
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;

            eprintln!("✓ Configuration written to {}", config::config_path().display());
            eprintln!("  Active profile: {name}");
            eprintln!("  Store a token with: fleetmap config set-token");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_profile_key(profile, &key, value)?;

            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: fleetmap config init --server <URL>");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(name, &cfg));
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetToken ────────────────────────────────────────────────
        ConfigCommand::SetToken => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(profile_name, &cfg));
            }

            let mut token = String::new();
            io::stdin().lock().read_line(&mut token)?;
            let token = token.trim();
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token read from stdin is empty".into(),
                });
            }

            store_token(&profile_name, token)?;
            eprintln!("✓ Token for '{profile_name}' stored in system keyring");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn redacted_config_hides_token() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                token: Some("s3cret".into()),
                websocket: Some(false),
                ..Profile::new("https://lab.example")
            },
        );
        let out = format_config_redacted(&cfg);
        assert!(out.contains("[profiles.lab]"));
        assert!(out.contains("token = \"****\""));
        assert!(out.contains("websocket = false"));
        assert!(!out.contains("s3cret"));
    }

    #[test]
    fn set_known_keys() {
        let mut p = Profile::default();
        set_profile_key(&mut p, "server", "https://m.example".into()).unwrap();
        set_profile_key(&mut p, "timeout", "12".into()).unwrap();
        set_profile_key(&mut p, "websocket", "false".into()).unwrap();
        assert_eq!(p.server, "https://m.example");
        assert_eq!(p.timeout, Some(12));
        assert_eq!(p.websocket, Some(false));
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut p = Profile::default();
        assert!(set_profile_key(&mut p, "timeout", "0".into()).is_err());
        assert!(set_profile_key(&mut p, "insecure", "maybe".into()).is_err());
        assert!(set_profile_key(&mut p, "server", "ftp://x".into()).is_err());
        let err = set_profile_key(&mut p, "colour", "red".into()).unwrap_err();
        assert!(matches!(err, CliError::Validation { field, .. } if field == "colour"));
    }
}
