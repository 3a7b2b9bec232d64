//! Floor plan command handler.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use fleetmap_api::MonitoringClient;
use fleetmap_core::{
    CoreError, EntityId, FixedImageSize, FloorImageLoader, FloorPlanSession, FloorView,
    ImageDimensions, IndoorMarker, IndoorProjector, StatusPalette,
};

use crate::cli::{FloorsArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util::{self, Context};

// ── Rows ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct FloorEntry {
    level: i32,
    selected: bool,
    visible: bool,
    cached: bool,
}

#[derive(Tabled)]
struct FloorRow {
    #[tabled(rename = "Floor")]
    level: String,
    #[tabled(rename = "Visible")]
    visible: &'static str,
    #[tabled(rename = "Loaded")]
    cached: &'static str,
}

fn floor_row(f: &FloorEntry) -> FloorRow {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    FloorRow {
        level: if f.selected {
            format!("> {}", f.level)
        } else {
            f.level.to_string()
        },
        visible: yes_no(f.visible),
        cached: yes_no(f.cached),
    }
}

#[derive(Tabled)]
struct MarkerRow {
    #[tabled(rename = "Device")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Map point")]
    point: String,
}

fn marker_row(m: &IndoorMarker, palette: &StatusPalette, color: bool) -> MarkerRow {
    MarkerRow {
        id: m.device_id.to_string(),
        name: m.name.clone(),
        status: output::paint_status(m.status, palette, color),
        point: util::format_point(m.point),
    }
}

fn listing<S>(session: &FloorPlanSession<S>) -> Vec<FloorEntry>
where
    S: fleetmap_core::FloorPlanSource,
{
    let nav = session.navigator();
    let selected = nav.selected_level();
    let visible = nav.visible();
    nav.floors()
        .iter()
        .map(|&level| FloorEntry {
            level,
            selected: selected == Some(level),
            visible: visible.contains(&level),
            cached: session.is_cached(level),
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: Context, args: FloorsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let location = EntityId::from(args.location.as_str());
    let palette = ctx.viewer.palette.clone();

    let spinner = output::spinner(&format!("Loading floor plan of location {location}"), global.quiet);
    let opened = FloorPlanSession::open(
        location,
        Arc::clone(&ctx.client),
        IndoorProjector::for_max_zoom(ctx.viewer.floors.max_zoom),
        palette.clone(),
        ctx.viewer.floors.window_size,
    )
    .await;
    spinner.finish_and_clear();
    let mut session = opened.map_err(|e| ctx.fetch_error(e))?;

    if session.navigator().is_empty() {
        return Err(CliError::NotFound {
            resource_type: "Floor".into(),
            identifier: format!("any floor of location {}", args.location),
            list_command: "locations".into(),
        });
    }

    if args.list {
        let entries = listing(&session);
        let out = output::render_list(&global.output, &entries, floor_row, |f| {
            f.level.to_string()
        })?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let view = match args.image_size {
        Some((width, height)) => {
            let fixed = FixedImageSize(ImageDimensions::new(width, height));
            show(&mut session, args.floor, &fixed).await
        }
        None => show(&mut session, args.floor, ctx.client.as_ref()).await,
    }
    .map_err(|e| ctx.fetch_error(e))?;

    print_view(&view, &palette, ctx.color, global)
}

async fn show<L: FloorImageLoader>(
    session: &mut FloorPlanSession<MonitoringClient>,
    floor: Option<i32>,
    loader: &L,
) -> Result<FloorView, CoreError> {
    match floor {
        Some(level) => session.show_floor(level, loader).await,
        None => session.show_selected(loader).await,
    }
}

fn print_view(
    view: &FloorView,
    palette: &StatusPalette,
    color: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match global.output {
        OutputFormat::Table => {
            if !global.quiet {
                eprintln!(
                    "{} ({}, {}x{})",
                    view.heading, view.image, view.image_size.width, view.image_size.height
                );
            }
            let out = output::render_list(
                &global.output,
                &view.markers,
                |m| marker_row(m, palette, color),
                |m| m.device_id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
        }
        OutputFormat::Plain => {
            let ids: Vec<String> = view.markers.iter().map(|m| m.device_id.to_string()).collect();
            output::print_output(&ids.join("\n"), global.quiet);
        }
        _ => {
            let out = output::render_single(&global.output, view, |v| v.heading.clone(), |v| {
                v.level.to_string()
            })?;
            output::print_output(&out, global.quiet);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn selected_floor_is_marked() {
        let entry = FloorEntry {
            level: -1,
            selected: true,
            visible: true,
            cached: false,
        };
        let row = floor_row(&entry);
        assert_eq!(row.level, "> -1");
        assert_eq!(row.visible, "yes");
        assert_eq!(row.cached, "no");
    }
}
