//! `lp topic ...`: add, rename and delete topics inside a roadmap.

use clap::{Args, Subcommand};
use learnpath_core::SyncClient;
use learnpath_core::model::TopicUpdate;

use super::show::render_cached_tree;
use super::task::watch_tree;
use super::{checked_title, conclude};
use crate::output::OutputMode;

#[derive(Subcommand, Debug)]
pub enum TopicCommand {
    #[command(
        about = "Add a topic to the end of a roadmap",
        after_help = "EXAMPLES:\n    lp topic add r1 \"Ownership\"\n    lp topic add r1 \"Async\" --description \"tokio and futures\""
    )]
    Add(AddArgs),

    #[command(
        about = "Rename a topic",
        after_help = "EXAMPLES:\n    lp topic rename r1 t1 \"Borrowing\""
    )]
    Rename(RenameArgs),

    #[command(about = "Delete a topic and all of its tasks")]
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Roadmap ID.
    pub roadmap: String,
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Roadmap ID.
    pub roadmap: String,
    /// Topic ID.
    pub topic: String,
    pub title: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Roadmap ID.
    pub roadmap: String,
    /// Topic ID.
    pub topic: String,
}

pub async fn run_topic(
    command: &TopicCommand,
    client: &SyncClient,
    output: OutputMode,
) -> anyhow::Result<()> {
    match command {
        TopicCommand::Add(args) => {
            let title = checked_title(client, output, &args.title)?;
            let _watch = watch_tree(client, output, &args.roadmap).await?;
            let result = client
                .create_topic(&args.roadmap, &title, args.description.as_deref())
                .await;
            conclude(client, output, result, |c| {
                render_cached_tree(c, output, &args.roadmap)
            })
            .await
        }
        TopicCommand::Rename(args) => {
            let update = TopicUpdate {
                title: Some(checked_title(client, output, &args.title)?),
                description: None,
            };
            let _watch = watch_tree(client, output, &args.roadmap).await?;
            let result = client
                .update_topic(&args.roadmap, &args.topic, update)
                .await;
            conclude(client, output, result, |c| {
                render_cached_tree(c, output, &args.roadmap)
            })
            .await
        }
        TopicCommand::Delete(args) => {
            let _watch = watch_tree(client, output, &args.roadmap).await?;
            let result = client.delete_topic(&args.roadmap, &args.topic).await;
            conclude(client, output, result, |c| {
                render_cached_tree(c, output, &args.roadmap)
            })
            .await
        }
    }
}
