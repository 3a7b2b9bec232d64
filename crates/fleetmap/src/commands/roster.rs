//! Roster command handler.

use std::sync::Arc;
use std::time::Duration;

use tabled::Tabled;
use tracing::debug;

use fleetmap_api::MonitoringClient;
use fleetmap_core::roster::EMPTY_ROSTER_MESSAGE;
use fleetmap_core::{
    CoreError, Device, EntityId, RosterConfig, RosterOutcome, RosterPaginator, Status,
    StatusPalette,
};

use crate::cli::{GlobalOpts, OutputFormat, RosterArgs};
use crate::error::CliError;
use crate::output;

use super::util::Context;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn row(d: &Device, palette: &StatusPalette, color: bool) -> DeviceRow {
    DeviceRow {
        id: d.id.to_string(),
        name: d.name.clone(),
        mac: d
            .mac
            .as_ref()
            .map_or_else(|| "-".into(), |m| m.as_str().to_owned()),
        status: output::paint_status(d.status, palette, color),
    }
}

async fn fetch_pages(
    roster: &RosterPaginator<MonitoringClient>,
    search: Option<&str>,
    statuses: Vec<Status>,
    all: bool,
) -> Result<Vec<RosterOutcome>, CoreError> {
    let first = if search.is_some() || !statuses.is_empty() {
        roster
            .set_filter(search.unwrap_or_default(), statuses)
            .await?
    } else {
        roster.open().await?
    };

    let mut outcomes = vec![first];
    while all && roster.has_more() {
        match roster.load_more().await? {
            outcome @ RosterOutcome::Appended { .. } => outcomes.push(outcome),
            _ => break,
        }
    }
    Ok(outcomes)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: Context, args: RosterArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let location = EntityId::from(args.location.as_str());

    // No keystrokes to coalesce on the command line.
    let config = RosterConfig {
        search_debounce: Duration::ZERO,
        status_debounce: Duration::ZERO,
        scroll_debounce: Duration::ZERO,
        ..ctx.viewer.roster
    };
    let roster = RosterPaginator::new(location.clone(), Arc::clone(&ctx.client), config);

    let spinner = output::spinner(&format!("Loading devices of location {location}"), global.quiet);
    let fetched = fetch_pages(&roster, args.search.as_deref(), args.status, args.all).await;
    spinner.finish_and_clear();
    let outcomes = fetched.map_err(|e| ctx.fetch_error(e))?;
    debug!(?outcomes, "roster fetched");

    if !global.quiet {
        eprintln!("{}", roster.title(&location.to_string()));
        if roster.has_more() {
            eprintln!("More devices available; pass --all to fetch every page");
        }
    }

    let devices = roster.devices();
    if devices.is_empty() && matches!(global.output, OutputFormat::Table) {
        output::print_output(EMPTY_ROSTER_MESSAGE, global.quiet);
        return Ok(());
    }

    let palette = &ctx.viewer.palette;
    let out = output::render_list(
        &global.output,
        &devices,
        |d| row(d, palette, ctx.color),
        |d| d.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
