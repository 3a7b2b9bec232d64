//! Location command handler.

use tabled::Tabled;

use fleetmap_core::{InitialView, RenderFeature, StatusPalette};

use crate::cli::{GlobalOpts, LocationsArgs};
use crate::error::CliError;
use crate::output;

use super::util::{self, Context};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LocationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Devices")]
    devices: u64,
    #[tabled(rename = "Lat, Lng")]
    point: String,
}

fn row(f: &RenderFeature, palette: &StatusPalette, color: bool) -> LocationRow {
    LocationRow {
        id: f.id.to_string(),
        name: f.name.clone(),
        status: output::paint_status(f.status, palette, color),
        devices: f.device_count,
        point: util::format_point(f.point),
    }
}

fn view_detail(view: &InitialView) -> String {
    match view {
        InitialView::Center { point, zoom } => {
            format!("Center: {}\nZoom:   {zoom}", util::format_point(*point))
        }
        InitialView::Fit { bounds } => format!(
            "Fit:    {:.4}, {:.4} .. {:.4}, {:.4}",
            bounds.south, bounds.west, bounds.north, bounds.east
        ),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    mut ctx: Context,
    args: LocationsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(max) = args.max_points {
        if max == 0 {
            return Err(CliError::Validation {
                field: "max-points".into(),
                reason: "must be at least 1".into(),
            });
        }
        ctx.viewer.max_points_fetched = max;
    }

    let mut viewer = ctx.map_viewer();
    let summary = ctx.load(&mut viewer, global.quiet).await?;
    if summary.skipped > 0 && !global.quiet {
        eprintln!("{} malformed location(s) skipped", summary.skipped);
    }
    if summary.truncated && !global.quiet {
        eprintln!(
            "Stopped after {} locations (limit {})",
            summary.locations, ctx.viewer.max_points_fetched
        );
    }

    if args.view {
        let view = viewer.on_ready();
        let out = output::render_single(&global.output, &view, view_detail, |_| "view".into())?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let features: Vec<RenderFeature> = viewer
        .surface()
        .features
        .iter()
        .filter(|f| !f.is_ghost())
        .filter(|f| args.status.is_empty() || args.status.contains(&f.status))
        .cloned()
        .collect();

    let palette = &ctx.viewer.palette;
    let out = output::render_list(
        &global.output,
        &features,
        |f| row(f, palette, ctx.color),
        |f| f.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
