//! `lp roadmaps`: the roadmap list with per-roadmap progress.

use clap::Args;
use learnpath_core::SyncClient;
use learnpath_core::model::RoadmapSummary;
use std::io::Write;

use super::{load_failed, truncate};
use crate::output::{OutputMode, pretty_section, progress_bar, render_mode};

#[derive(Args, Debug)]
pub struct RoadmapsArgs {
    /// Include archived roadmaps.
    #[arg(long)]
    pub archived: bool,
}

pub async fn run_roadmaps(
    args: &RoadmapsArgs,
    client: &SyncClient,
    output: OutputMode,
) -> anyhow::Result<()> {
    let rows = client
        .load_roadmaps()
        .await
        .map_err(|e| load_failed(output, "roadmaps", &e))?;
    render_roadmaps(output, &rows, args.archived)
}

/// Render the cached list, archived rows included.
pub fn render_cached_roadmaps(client: &SyncClient, output: OutputMode) -> anyhow::Result<()> {
    let rows = client.roadmaps().unwrap_or_default();
    render_roadmaps(output, &rows, true)
}

pub fn render_roadmaps(
    output: OutputMode,
    rows: &[RoadmapSummary],
    include_archived: bool,
) -> anyhow::Result<()> {
    let visible: Vec<&RoadmapSummary> = rows
        .iter()
        .filter(|r| include_archived || !r.is_archived)
        .collect();
    render_mode(output, &visible, render_text, render_pretty)
}

fn render_pretty(rows: &Vec<&RoadmapSummary>, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Roadmaps ({})", rows.len()))?;
    if rows.is_empty() {
        writeln!(w, "(none yet; create one with `lp roadmap create <title>`)")?;
    }
    for row in rows {
        let archived = if row.is_archived { "  (archived)" } else { "" };
        writeln!(
            w,
            "{:<28} {} {:>5.1}%  {}/{}  [{}]{archived}",
            truncate(&row.title, 28),
            progress_bar(row.progress_percent, 12),
            row.progress_percent,
            row.completed_tasks,
            row.total_tasks,
            row.id
        )?;
    }
    Ok(())
}

fn render_text(rows: &Vec<&RoadmapSummary>, w: &mut dyn Write) -> std::io::Result<()> {
    for row in rows {
        writeln!(
            w,
            "{}\t{}\t{}/{}\t{:.1}\t{}",
            row.id,
            row.title,
            row.completed_tasks,
            row.total_tasks,
            row.progress_percent,
            if row.is_archived { "archived" } else { "active" }
        )?;
    }
    Ok(())
}
