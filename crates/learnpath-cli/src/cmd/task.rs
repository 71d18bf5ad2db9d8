//! `lp task ...`: add, advance, edit and delete tasks.

use clap::{Args, Subcommand};
use learnpath_core::error::ErrorCode;
use learnpath_core::store::CacheKey;
use learnpath_core::{QueryView, SyncClient, TaskDraft};
use tokio::sync::watch;

use super::show::render_cached_tree;
use super::{checked_title, conclude, load_failed, parse_status};
use crate::output::{CliError, OutputMode, fail};

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    #[command(
        about = "Add a task to the end of a topic",
        after_help = "EXAMPLES:\n    lp task add r1 t1 \"Read chapter 4\"\n    lp task add r1 t1 \"Exercises\" --notes \"- 4.1\\n- 4.2\""
    )]
    Add(AddArgs),

    #[command(
        about = "Move a task to its next status",
        long_about = "Move a task to its next status: not_started -> in_progress -> completed -> not_started.",
        after_help = "EXAMPLES:\n    lp task advance r1 k1"
    )]
    Advance(TargetArgs),

    #[command(
        about = "Set a task's status",
        after_help = "EXAMPLES:\n    lp task set r1 k1 completed\n    lp task set r1 k1 doing"
    )]
    Set(SetArgs),

    #[command(
        about = "Edit a task's title, notes or status",
        long_about = "Edit a task. Only fields that differ from the current task are sent; blank notes leave the notes unchanged.",
        after_help = "EXAMPLES:\n    lp task edit r1 k1 --title \"Read chapters 4-5\"\n    lp task edit r1 k1 --notes \"See [the book](https://doc.rust-lang.org/book/)\""
    )]
    Edit(EditArgs),

    #[command(about = "Delete a task")]
    Delete(TargetArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Roadmap ID.
    pub roadmap: String,
    /// Topic ID.
    pub topic: String,
    pub title: String,

    /// Markdown notes.
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Roadmap ID.
    pub roadmap: String,
    /// Task ID.
    pub task: String,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Roadmap ID.
    pub roadmap: String,
    /// Task ID.
    pub task: String,
    /// not_started | in_progress | completed (todo, doing, done also accepted).
    pub status: String,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Roadmap ID.
    pub roadmap: String,
    /// Task ID.
    pub task: String,

    #[command(flatten)]
    pub fields: EditFields,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = true)]
pub struct EditFields {
    #[arg(long)]
    pub title: Option<String>,

    /// Markdown notes.
    #[arg(long)]
    pub notes: Option<String>,

    #[arg(long)]
    pub status: Option<String>,
}

/// Load a roadmap tree and keep it observed until the command ends.
pub async fn watch_tree(
    client: &SyncClient,
    output: OutputMode,
    roadmap_id: &str,
) -> anyhow::Result<watch::Receiver<QueryView>> {
    let watch = client.subscribe(&CacheKey::roadmap(roadmap_id));
    client
        .load_roadmap(roadmap_id)
        .await
        .map_err(|e| load_failed(output, &format!("roadmap '{roadmap_id}'"), &e))?;
    Ok(watch)
}

pub async fn run_task(
    command: &TaskCommand,
    client: &SyncClient,
    output: OutputMode,
) -> anyhow::Result<()> {
    match command {
        TaskCommand::Add(args) => {
            let title = checked_title(client, output, &args.title)?;
            let _watch = watch_tree(client, output, &args.roadmap).await?;
            let result = client
                .create_task(&args.roadmap, &args.topic, &title, args.notes.as_deref())
                .await;
            conclude(client, output, result, |c| {
                render_cached_tree(c, output, &args.roadmap)
            })
            .await
        }
        TaskCommand::Advance(args) => {
            let _watch = watch_tree(client, output, &args.roadmap).await?;
            let result = client.advance_task_status(&args.roadmap, &args.task).await;
            conclude(client, output, result, |c| {
                render_cached_tree(c, output, &args.roadmap)
            })
            .await
        }
        TaskCommand::Set(args) => {
            let status = parse_status(output, &args.status)?;
            let _watch = watch_tree(client, output, &args.roadmap).await?;
            let result = client
                .set_task_status(&args.roadmap, &args.task, status)
                .await;
            conclude(client, output, result, |c| {
                render_cached_tree(c, output, &args.roadmap)
            })
            .await
        }
        TaskCommand::Edit(args) => run_edit(args, client, output).await,
        TaskCommand::Delete(args) => {
            let _watch = watch_tree(client, output, &args.roadmap).await?;
            let result = client.delete_task(&args.roadmap, &args.task).await;
            conclude(client, output, result, |c| {
                render_cached_tree(c, output, &args.roadmap)
            })
            .await
        }
    }
}

/// Open a draft on the cached task, apply the flags, save what changed.
async fn run_edit(args: &EditArgs, client: &SyncClient, output: OutputMode) -> anyhow::Result<()> {
    let fields = &args.fields;
    let title = fields
        .title
        .as_deref()
        .map(|t| checked_title(client, output, t))
        .transpose()?;
    let status = fields
        .status
        .as_deref()
        .map(|s| parse_status(output, s))
        .transpose()?;

    let _watch = watch_tree(client, output, &args.roadmap).await?;
    let task = client
        .roadmap(&args.roadmap)
        .and_then(|tree| tree.task(&args.task).cloned());
    let Some(task) = task else {
        return Err(fail(
            output,
            &CliError::coded(
                ErrorCode::NotCached,
                format!("task '{}' is not in roadmap '{}'", args.task, args.roadmap),
            ),
        ));
    };

    let mut draft = TaskDraft::open(&args.roadmap, &task);
    if let Some(title) = title {
        draft.set_title(title);
    }
    if let Some(ref notes) = fields.notes {
        draft.set_notes(notes.clone());
    }
    if let Some(status) = status {
        draft.set_status(status);
    }

    let result = client.save_draft(&draft).await;
    if matches!(result, Ok(None)) {
        tracing::info!(task = %args.task, "nothing to change");
    }
    conclude(client, output, result, |c| {
        render_cached_tree(c, output, &args.roadmap)
    })
    .await
}
