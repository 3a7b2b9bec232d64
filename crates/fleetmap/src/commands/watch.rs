//! Watch command: load the map, then follow the live location stream.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fleetmap_api::websocket::{LocationStreamHandle, ReconnectConfig, StreamState};
use fleetmap_core::{
    AppliedUpdate, DeviceLocation, EntityId, FieldChange, GeoPoint, LocationUpdate, Status,
    StatusPalette,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util::{self, Context};

/// One applied update, as printed.
#[derive(Debug, Serialize)]
struct WatchLine {
    at: DateTime<Utc>,
    id: EntityId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    moved_to: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
}

impl WatchLine {
    fn text(&self, palette: &StatusPalette, color: bool) -> String {
        let mut line = format!("{} {} {}", self.at.format("%H:%M:%S"), self.id, self.name);
        if let Some(to) = self.moved_to {
            line.push_str(&format!("  moved to {}", util::format_point(to)));
        }
        if let Some(status) = self.status {
            line.push_str("  now ");
            line.push_str(&output::paint_status(status, palette, color));
        }
        line
    }
}

fn render_line(
    line: &WatchLine,
    format: &OutputFormat,
    palette: &StatusPalette,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(line.text(palette, color)),
        OutputFormat::Plain => Ok(line.id.to_string()),
        // One document per line so the stream stays parseable.
        _ => output::render_json(line, true),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: Context, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if !ctx.websocket_enabled {
        return Err(CliError::Validation {
            field: "websocket".into(),
            reason: "live updates are disabled for this profile".into(),
        });
    }

    let mut viewer = ctx.map_viewer();
    let summary = ctx.load(&mut viewer, global.quiet).await?;
    if !global.quiet {
        eprintln!(
            "Watching {} locations on {} (Ctrl+C to stop)",
            summary.locations, ctx.server_url
        );
    }

    let ws_url = ctx
        .client
        .location_stream_url()
        .map_err(|e| ctx.fetch_error(e.into()))?;
    let handle = LocationStreamHandle::connect(
        ws_url,
        ReconnectConfig::default(),
        CancellationToken::new(),
        ctx.client.authorization().map(str::to_owned),
    );
    let mut events = handle.subscribe();
    let mut state = handle.watch_state();

    let filter: Vec<EntityId> = args.location.iter().map(|s| EntityId::from(s.as_str())).collect();
    let palette = ctx.viewer.palette.clone();
    let mut printed = 0usize;
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        if args.count.is_some_and(|n| printed >= n) {
            break;
        }
        let event = tokio::select! {
            _ = &mut interrupted => {
                info!("interrupted");
                break;
            }
            Ok(()) = state.changed() => {
                let current = *state.borrow_and_update();
                report_state(current, global.quiet);
                continue;
            }
            recv = events.recv() => recv,
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "live stream lagged; some updates were dropped");
                if !global.quiet {
                    eprintln!("{}", lag_notice(skipped));
                }
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let update = match LocationUpdate::try_from(Arc::as_ref(&event)) {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable location event");
                continue;
            }
        };

        let Some(applied) = viewer.apply_update(&update) else {
            debug!(id = %update.id, "update for unknown location");
            continue;
        };
        viewer.surface_mut().take_moves();

        if !applied.changed() || (!filter.is_empty() && !filter.contains(&update.id)) {
            continue;
        }

        let current = viewer.store().location(&update.id);
        let line = describe(current.as_deref(), &update, applied);
        let out = render_line(&line, &global.output, &palette, ctx.color)?;
        output::print_output(&out, global.quiet);
        printed += 1;
    }

    handle.shutdown();
    Ok(())
}

fn lag_notice(skipped: u64) -> String {
    format!(
        "Fell behind the live stream: {skipped} update(s) skipped; \
         run `fleetmap locations` for the current state"
    )
}

fn report_state(state: StreamState, quiet: bool) {
    debug!(?state, "live stream state");
    if quiet {
        return;
    }
    match state {
        StreamState::Connecting => {}
        StreamState::Live => eprintln!("Live updates connected"),
        StreamState::Retrying { attempt, delay } => eprintln!(
            "Live updates interrupted; retry {attempt} in {:.1}s",
            delay.as_secs_f64()
        ),
        StreamState::Stopped => eprintln!("Live updates stopped"),
    }
}

fn describe(
    current: Option<&DeviceLocation>,
    update: &LocationUpdate,
    applied: AppliedUpdate,
) -> WatchLine {
    WatchLine {
        at: Utc::now(),
        id: update.id.clone(),
        name: current.map(|l| l.name.clone()).unwrap_or_default(),
        moved_to: update.position.filter(|_| applied.moved()),
        status: (applied.status == FieldChange::Applied)
            .then(|| current.map(|l| l.counts.resolve()))
            .flatten(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line() -> WatchLine {
        WatchLine {
            at: DateTime::parse_from_rfc3339("2026-03-01T08:15:00Z")
                .unwrap()
                .with_timezone(&Utc),
            id: EntityId::from("12"),
            name: "Depot".into(),
            moved_to: Some(GeoPoint::new(45.0, 9.25)),
            status: Some(Status::Critical),
        }
    }

    #[test]
    fn table_line_reads_as_a_sentence() {
        let text = line().text(&StatusPalette::default(), false);
        assert_eq!(text, "08:15:00 12 Depot  moved to 45.0000, 9.2500  now CRITICAL");
    }

    #[test]
    fn json_line_is_compact() {
        let out = render_line(&line(), &OutputFormat::Json, &StatusPalette::default(), false).unwrap();
        assert!(!out.contains('\n'));
        assert!(out.contains(r#""moved_to":{"lat":45.0,"lng":9.25}"#));
    }

    #[test]
    fn status_only_update_omits_position() {
        let applied = AppliedUpdate {
            position: FieldChange::Absent,
            status: FieldChange::Applied,
        };
        let update = LocationUpdate {
            id: EntityId::from("12"),
            position: None,
            counts: None,
            revision: None,
        };
        let described = describe(None, &update, applied);
        assert!(described.moved_to.is_none());
        assert!(described.status.is_none());
        assert_eq!(described.name, "");
    }

    #[test]
    fn lag_notice_names_the_gap() {
        let notice = lag_notice(17);
        assert!(notice.contains("17 update(s) skipped"), "{notice}");
        assert!(notice.contains("fleetmap locations"));
    }
}
