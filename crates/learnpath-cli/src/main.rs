#![forbid(unsafe_code)]

mod cmd;
mod markdown;
mod output;

use clap::{Parser, Subcommand};
use learnpath_core::SyncClient;
use learnpath_core::config::{config_error_code, resolve_config};
use learnpath_core::error::ErrorCode;
use learnpath_core::transport::http::HttpTransport;
use output::{CliError, OutputMode, Reported};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "lp: track progress through learning roadmaps",
    long_about = None
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Read configuration from this file instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List roadmaps with their progress",
        after_help = "EXAMPLES:\n    # Active roadmaps\n    lp roadmaps\n\n    # Include archived ones, as JSON\n    lp roadmaps --archived --json"
    )]
    Roadmaps(cmd::roadmaps::RoadmapsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show a roadmap's topics and tasks",
        long_about = "Show a roadmap's topic/task tree, or one task with its notes rendered.",
        after_help = "EXAMPLES:\n    # Whole tree\n    lp show r1\n\n    # One task with notes\n    lp show r1 --task k1"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show totals, streak and recent activity",
        after_help = "EXAMPLES:\n    lp dashboard\n    lp dashboard --json"
    )]
    Dashboard,

    #[command(
        next_help_heading = "Write",
        about = "Create, edit, archive or delete roadmaps"
    )]
    Roadmap {
        #[command(subcommand)]
        command: cmd::roadmap::RoadmapCommand,
    },

    #[command(
        next_help_heading = "Write",
        about = "Add, rename or delete topics"
    )]
    Topic {
        #[command(subcommand)]
        command: cmd::topic::TopicCommand,
    },

    #[command(
        next_help_heading = "Write",
        about = "Add, advance, edit or delete tasks"
    )]
    Task {
        #[command(subcommand)]
        command: cmd::task::TaskCommand,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("LEARNPATH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "learnpath=debug,info"
        } else {
            "learnpath=info,warn"
        })
    });

    let format = env::var("LEARNPATH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

async fn dispatch(command: Commands, client: &SyncClient, output: OutputMode) -> anyhow::Result<()> {
    match command {
        Commands::Roadmaps(args) => cmd::roadmaps::run_roadmaps(&args, client, output).await,
        Commands::Show(args) => cmd::show::run_show(&args, client, output).await,
        Commands::Dashboard => cmd::dashboard::run_dashboard(client, output).await,
        Commands::Roadmap { command } => cmd::roadmap::run_roadmap(&command, client, output).await,
        Commands::Topic { command } => cmd::topic::run_topic(&command, client, output).await,
        Commands::Task { command } => cmd::task::run_task(&command, client, output).await,
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let effective = resolve_config(cli.config.as_deref(), cli.json).map_err(|err| {
        output::fail(
            OutputMode::fallback(cli.json),
            &CliError::coded(config_error_code(&err), format!("{err:#}")),
        )
    })?;
    let output = OutputMode::from_resolved(&effective.resolved_output);
    debug!(
        source = ?effective.source,
        base_url = %effective.config.api.base_url,
        output = %effective.resolved_output,
        "configuration resolved"
    );

    let transport = HttpTransport::new(&effective.config.api);
    let client = SyncClient::new(Arc::new(transport), effective.config.sync.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime
        .block_on(dispatch(cli.command, &client, output))
        .map_err(|err| {
            if err.is::<Reported>() {
                err
            } else {
                output::fail(
                    output,
                    &CliError::coded(ErrorCode::InternalUnexpected, format!("{err:#}")),
                )
            }
        })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if !err.is::<Reported>() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
