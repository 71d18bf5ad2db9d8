//! `lp dashboard`: cross-roadmap totals, streak and 30-day activity.

use learnpath_core::SyncClient;
use learnpath_core::model::{DailyCompletions, DashboardStats};
use std::io::Write;

use super::load_failed;
use crate::output::{OutputMode, pretty_kv, pretty_section, progress_bar, render_mode};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub async fn run_dashboard(client: &SyncClient, output: OutputMode) -> anyhow::Result<()> {
    let stats = client
        .load_dashboard()
        .await
        .map_err(|e| load_failed(output, "dashboard", &e))?;
    render_mode(output, stats.as_ref(), render_text, render_pretty)
}

/// One character per day, scaled to the busiest day. Zero days are `·`.
fn sparkline(days: &[DailyCompletions]) -> String {
    let max = days.iter().map(|d| d.count).max().unwrap_or(0);
    days.iter()
        .map(|d| {
            if d.count == 0 || max == 0 {
                return '·';
            }
            let idx = (d.count as usize * (SPARK.len() - 1)) / max as usize;
            SPARK[idx.min(SPARK.len() - 1)]
        })
        .collect()
}

fn render_pretty(stats: &DashboardStats, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Dashboard")?;
    pretty_kv(w, "roadmaps", stats.total_roadmaps.to_string())?;
    pretty_kv(w, "topics", stats.total_topics.to_string())?;
    pretty_kv(
        w,
        "tasks",
        format!(
            "{} {}/{} completed ({:.1}%)",
            progress_bar(stats.completion_percent, 20),
            stats.completed_tasks,
            stats.total_tasks,
            stats.completion_percent
        ),
    )?;
    let unit = if stats.current_streak == 1 { "day" } else { "days" };
    pretty_kv(w, "streak", format!("{} {unit}", stats.current_streak))?;

    if !stats.tasks_completed_per_day.is_empty() {
        let best = stats
            .best_day()
            .map(|d| format!(", best {} ({})", d.date, d.count))
            .unwrap_or_default();
        pretty_kv(
            w,
            "last 30d",
            format!("{} completed{best}", stats.completed_in_window()),
        )?;
        pretty_kv(w, "activity", sparkline(&stats.tasks_completed_per_day))?;
    }
    Ok(())
}

fn render_text(stats: &DashboardStats, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "roadmaps\t{}", stats.total_roadmaps)?;
    writeln!(w, "topics\t{}", stats.total_topics)?;
    writeln!(w, "tasks\t{}", stats.total_tasks)?;
    writeln!(w, "completed\t{}", stats.completed_tasks)?;
    writeln!(w, "percent\t{:.1}", stats.completion_percent)?;
    writeln!(w, "streak\t{}", stats.current_streak)?;
    for day in &stats.tasks_completed_per_day {
        writeln!(w, "day\t{}\t{}", day.date, day.count)?;
    }
    Ok(())
}
