//! `lp show`: one roadmap's topic/task tree, or a single task with notes.

use chrono::{DateTime, Local, Utc};
use clap::Args;
use learnpath_core::SyncClient;
use learnpath_core::error::ErrorCode;
use learnpath_core::model::{RoadmapDetail, Task, TaskStatus};
use serde::Serialize;
use std::io::Write;

use super::load_failed;
use crate::markdown::render_notes;
use crate::output::{
    CliError, OutputMode, fail, pretty_kv, pretty_rule, pretty_section, progress_bar, render_mode,
};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Roadmap ID.
    pub roadmap: String,

    /// Show a single task, with its notes, instead of the whole tree.
    #[arg(long, value_name = "TASK_ID")]
    pub task: Option<String>,
}

/// A task with enough context to render on its own.
#[derive(Debug, Serialize)]
pub struct TaskView<'a> {
    pub roadmap_id: &'a str,
    pub topic_id: &'a str,
    pub topic_title: &'a str,
    pub task: &'a Task,
    /// Notes rendered from markdown to terminal text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes_text: Option<String>,
}

impl<'a> TaskView<'a> {
    pub fn find(tree: &'a RoadmapDetail, task_id: &str) -> Option<Self> {
        tree.topics.iter().find_map(|topic| {
            topic.task(task_id).map(|task| Self {
                roadmap_id: &tree.id,
                topic_id: &topic.id,
                topic_title: &topic.title,
                task,
                notes_text: task.notes.as_deref().map(render_notes),
            })
        })
    }
}

/// Execute `lp show <roadmap> [--task <id>]`.
///
/// # Errors
///
/// A load failure is blocking; so is a task ID the roadmap does not contain.
pub async fn run_show(
    args: &ShowArgs,
    client: &SyncClient,
    output: OutputMode,
) -> anyhow::Result<()> {
    let tree = client
        .load_roadmap(&args.roadmap)
        .await
        .map_err(|e| load_failed(output, &format!("roadmap '{}'", args.roadmap), &e))?;

    let Some(task_id) = args.task.as_deref() else {
        return render_tree(output, &tree);
    };
    let Some(view) = TaskView::find(&tree, task_id) else {
        return Err(fail(
            output,
            &CliError::coded(
                ErrorCode::NotCached,
                format!("task '{task_id}' is not in roadmap '{}'", args.roadmap),
            ),
        ));
    };
    render_mode(output, &view, render_task_text, render_task_pretty)
}

/// Render the cached tree for `roadmap_id`, if there is one.
pub fn render_cached_tree(
    client: &SyncClient,
    output: OutputMode,
    roadmap_id: &str,
) -> anyhow::Result<()> {
    match client.roadmap(roadmap_id) {
        Some(tree) => render_tree(output, &tree),
        None => Ok(()),
    }
}

pub fn render_tree(output: OutputMode, tree: &RoadmapDetail) -> anyhow::Result<()> {
    render_mode(output, tree, render_tree_text, render_tree_pretty)
}

pub const fn status_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::NotStarted => "[ ]",
        TaskStatus::InProgress => "[~]",
        TaskStatus::Completed => "[x]",
    }
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn render_tree_pretty(tree: &RoadmapDetail, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("{}  [{}]", tree.title, tree.id))?;
    if let Some(ref desc) = tree.description {
        writeln!(w, "{desc}")?;
    }
    pretty_kv(
        w,
        "progress",
        format!(
            "{} {}/{} tasks ({:.1}%)",
            progress_bar(tree.progress_percent, 20),
            tree.completed_tasks,
            tree.total_tasks,
            tree.progress_percent
        ),
    )?;
    pretty_kv(w, "doing", tree.in_progress_tasks.to_string())?;
    pretty_kv(w, "color", &tree.color)?;
    if tree.is_archived {
        pretty_kv(w, "archived", "yes")?;
    }

    if tree.topics.is_empty() {
        writeln!(w)?;
        writeln!(w, "(no topics yet)")?;
    }
    for topic in &tree.topics {
        writeln!(w)?;
        writeln!(
            w,
            "{}  [{}]  {}/{} ({:.0}%)",
            topic.title,
            topic.id,
            topic.completed_tasks,
            topic.total_tasks,
            topic.progress_percent
        )?;
        if topic.tasks.is_empty() {
            writeln!(w, "  (no tasks)")?;
        }
        for task in &topic.tasks {
            let notes = if task.notes.is_some() { "  +notes" } else { "" };
            writeln!(
                w,
                "  {} {}  [{}]{notes}",
                status_marker(task.status),
                task.title,
                task.id
            )?;
        }
    }
    Ok(())
}

fn render_tree_text(tree: &RoadmapDetail, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "roadmap\t{}\t{}\t{}/{}\t{:.1}",
        tree.id, tree.title, tree.completed_tasks, tree.total_tasks, tree.progress_percent
    )?;
    for topic in &tree.topics {
        writeln!(
            w,
            "topic\t{}\t{}\t{}/{}",
            topic.id, topic.title, topic.completed_tasks, topic.total_tasks
        )?;
        for task in &topic.tasks {
            writeln!(
                w,
                "task\t{}\t{}\t{}\t{}",
                task.id, topic.id, task.status, task.title
            )?;
        }
    }
    Ok(())
}

fn render_task_pretty(view: &TaskView<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    let task = view.task;
    pretty_section(w, &format!("Task {}", task.id))?;
    writeln!(w, "{}", task.title)?;
    pretty_rule(w)?;
    pretty_kv(w, "status", task.status.label())?;
    pretty_kv(w, "topic", format!("{}  [{}]", view.topic_title, view.topic_id))?;
    pretty_kv(w, "roadmap", view.roadmap_id)?;
    if let Some(done) = task.completed_at {
        pretty_kv(w, "completed", local_time(done))?;
    }
    pretty_kv(w, "updated", local_time(task.updated_at))?;

    if let Some(ref notes) = view.notes_text {
        writeln!(w)?;
        pretty_section(w, "Notes")?;
        writeln!(w, "{notes}")?;
    }
    Ok(())
}

fn render_task_text(view: &TaskView<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    let task = view.task;
    writeln!(w, "id:        {}", task.id)?;
    writeln!(w, "title:     {}", task.title)?;
    writeln!(w, "status:    {}", task.status)?;
    writeln!(w, "topic:     {}", view.topic_id)?;
    writeln!(w, "roadmap:   {}", view.roadmap_id)?;
    if let Some(done) = task.completed_at {
        writeln!(w, "completed: {}", done.to_rfc3339())?;
    }
    if let Some(ref notes) = view.notes_text {
        writeln!(w, "notes:")?;
        for line in notes.lines() {
            writeln!(w, "  {line}")?;
        }
    }
    Ok(())
}
