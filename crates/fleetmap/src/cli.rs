//! Clap derive structures for the `fleetmap` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

use fleetmap_core::Status;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetmap -- device locations, rosters and floor plans from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "fleetmap",
    version,
    about = "Inspect fleet device locations from the command line",
    long_about = "Reads the monitoring server's location feed, device rosters and\n\
        indoor floor plans, and follows live location updates.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "FLEETMAP_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "FLEETMAP_SERVER", global = true)]
    pub server: Option<String>,

    /// API token
    #[arg(long, env = "FLEETMAP_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLEETMAP_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FLEETMAP_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "FLEETMAP_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List locations with their aggregated device status
    #[command(alias = "loc", alias = "l")]
    Locations(LocationsArgs),

    /// List the devices of one location
    #[command(alias = "r")]
    Roster(RosterArgs),

    /// Show the indoor floor plan of one location
    #[command(alias = "f")]
    Floors(FloorsArgs),

    /// Follow live location updates
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

fn parse_status(raw: &str) -> Result<Status, String> {
    raw.parse::<Status>().map_err(|_| {
        format!("unknown status '{raw}' (expected ok, problem, critical, unknown, deactivated)")
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LOCATIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LocationsArgs {
    /// Only show locations resolving to this status (repeatable)
    #[arg(long, value_parser = parse_status)]
    pub status: Vec<Status>,

    /// Stop fetching after this many locations (overrides config)
    #[arg(long)]
    pub max_points: Option<usize>,

    /// Print the initial map view instead of the location list
    #[arg(long)]
    pub view: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ROSTER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RosterArgs {
    /// Location ID
    pub location: String,

    /// Search device names and MAC addresses
    #[arg(long)]
    pub search: Option<String>,

    /// Only include devices with this status (repeatable)
    #[arg(long, value_parser = parse_status)]
    pub status: Vec<Status>,

    /// Fetch all pages automatically
    #[arg(long, short = 'a')]
    pub all: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  FLOORS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct FloorsArgs {
    /// Location ID
    pub location: String,

    /// Floor level to show (default: floor of the first device)
    #[arg(long, allow_negative_numbers = true)]
    pub floor: Option<i32>,

    /// List floors and the visible floor window instead of devices
    #[arg(long)]
    pub list: bool,

    /// Project onto an image of this size (WIDTHxHEIGHT) instead of
    /// downloading and measuring the floor image
    #[arg(long, value_parser = parse_image_size)]
    pub image_size: Option<(f64, f64)>,
}

fn parse_image_size(raw: &str) -> Result<(f64, f64), String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{raw}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && *n > 0.0)
            .ok_or_else(|| format!("invalid image dimension '{v}'"))
    };
    Ok((parse(w)?, parse(h)?))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Exit after this many applied updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Only report updates for this location ID (repeatable)
    #[arg(long)]
    pub location: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile
    Init {
        /// Server URL
        #[arg(long)]
        server: String,

        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Environment variable holding the API token
        #[arg(long)]
        token_env: Option<String>,
    },

    /// Display current resolved configuration
    Show,

    /// Set a profile value
    Set {
        /// Profile key (server, token_env, insecure, timeout, websocket, ca_cert)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an API token in the system keyring (read from stdin)
    SetToken,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
