//! `lp roadmap ...`: create, edit, archive and delete roadmaps.

use clap::{Args, Subcommand};
use learnpath_core::SyncClient;
use learnpath_core::model::RoadmapUpdate;
use learnpath_core::store::CacheKey;

use super::roadmaps::render_cached_roadmaps;
use super::{checked_color, checked_title, conclude, load_failed};
use crate::output::OutputMode;

#[derive(Subcommand, Debug)]
pub enum RoadmapCommand {
    #[command(
        about = "Create a roadmap",
        after_help = "EXAMPLES:\n    lp roadmap create \"Rust\"\n    lp roadmap create \"Go\" --color \"#00add8\" --description \"Backend track\""
    )]
    Create(CreateArgs),

    #[command(
        about = "Rename a roadmap",
        after_help = "EXAMPLES:\n    lp roadmap rename r1 \"Rust in depth\""
    )]
    Rename(RenameArgs),

    #[command(
        about = "Change a roadmap's title, description or color",
        after_help = "EXAMPLES:\n    lp roadmap edit r1 --color \"#f97316\"\n    lp roadmap edit r1 --description \"Weekends only\""
    )]
    Edit(EditArgs),

    #[command(about = "Archive a roadmap")]
    Archive(TargetArgs),

    #[command(about = "Restore an archived roadmap")]
    Unarchive(TargetArgs),

    #[command(about = "Delete a roadmap with all of its topics and tasks")]
    Delete(TargetArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Hex accent color, e.g. #6366f1.
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Roadmap ID.
    pub roadmap: String,
    pub title: String,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Roadmap ID.
    pub roadmap: String,

    #[command(flatten)]
    pub fields: EditFields,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = true)]
pub struct EditFields {
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Roadmap ID.
    pub roadmap: String,
}

pub async fn run_roadmap(
    command: &RoadmapCommand,
    client: &SyncClient,
    output: OutputMode,
) -> anyhow::Result<()> {
    match command {
        RoadmapCommand::Create(args) => {
            let title = checked_title(client, output, &args.title)?;
            let color = checked_color(output, args.color.as_deref())?;
            let _watch = watch_list(client, output).await?;
            let result = client
                .create_roadmap(&title, args.description.as_deref(), color.as_deref())
                .await;
            conclude(client, output, result, |c| render_cached_roadmaps(c, output)).await
        }
        RoadmapCommand::Rename(args) => {
            let update = RoadmapUpdate {
                title: Some(checked_title(client, output, &args.title)?),
                ..RoadmapUpdate::default()
            };
            update_roadmap(client, output, &args.roadmap, update).await
        }
        RoadmapCommand::Edit(args) => {
            let fields = &args.fields;
            let update = RoadmapUpdate {
                title: fields
                    .title
                    .as_deref()
                    .map(|t| checked_title(client, output, t))
                    .transpose()?,
                description: fields.description.clone(),
                color: checked_color(output, fields.color.as_deref())?,
                is_archived: None,
            };
            update_roadmap(client, output, &args.roadmap, update).await
        }
        RoadmapCommand::Archive(args) => set_archived(client, output, &args.roadmap, true).await,
        RoadmapCommand::Unarchive(args) => {
            set_archived(client, output, &args.roadmap, false).await
        }
        RoadmapCommand::Delete(args) => {
            let _watch = watch_list(client, output).await?;
            let result = client.delete_roadmap(&args.roadmap).await;
            conclude(client, output, result, |c| render_cached_roadmaps(c, output)).await
        }
    }
}

/// Load the roadmap list and keep it observed until the command ends.
async fn watch_list(
    client: &SyncClient,
    output: OutputMode,
) -> anyhow::Result<tokio::sync::watch::Receiver<learnpath_core::QueryView>> {
    let watch = client.subscribe(&CacheKey::Roadmaps);
    client
        .load_roadmaps()
        .await
        .map_err(|e| load_failed(output, "roadmaps", &e))?;
    Ok(watch)
}

async fn update_roadmap(
    client: &SyncClient,
    output: OutputMode,
    roadmap_id: &str,
    update: RoadmapUpdate,
) -> anyhow::Result<()> {
    let _watch = watch_list(client, output).await?;
    let result = client.update_roadmap(roadmap_id, update).await;
    conclude(client, output, result, |c| render_cached_roadmaps(c, output)).await
}

async fn set_archived(
    client: &SyncClient,
    output: OutputMode,
    roadmap_id: &str,
    archived: bool,
) -> anyhow::Result<()> {
    let update = RoadmapUpdate {
        is_archived: Some(archived),
        ..RoadmapUpdate::default()
    };
    update_roadmap(client, output, roadmap_id, update).await
}
