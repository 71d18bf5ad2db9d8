//! Command handlers for `lp`.
//!
//! Read commands load one cache key and render it. Write commands follow one
//! shape: check input locally, load the view they patch, subscribe to it,
//! dispatch the mutation, wait for background refetches to settle, then
//! render whatever the cache holds. A failed request therefore prints the
//! rolled-back state followed by a warning.

pub mod dashboard;
pub mod roadmap;
pub mod roadmaps;
pub mod show;
pub mod task;
pub mod topic;

use learnpath_core::error::ErrorCode;
use learnpath_core::model::TaskStatus;
use learnpath_core::validate::{ValidationError, validate_color, validate_title};
use learnpath_core::{LoadError, MutationError, SyncClient};
use tracing::{debug, warn};

use crate::output::{CliError, OutputMode, Reported, fail, render_warning};

/// Blocking load failure: the requested view cannot be shown.
pub fn load_failed(output: OutputMode, what: &str, err: &LoadError) -> anyhow::Error {
    fail(
        output,
        &CliError::coded(err.code(), format!("could not load {what}: {err}")),
    )
}

/// Input rejected before dispatch.
pub fn rejected(output: OutputMode, err: &ValidationError) -> anyhow::Error {
    fail(output, &CliError::coded(err.code(), err.to_string()))
}

/// Trim and check a title before anything touches the network.
pub fn checked_title(client: &SyncClient, output: OutputMode, raw: &str) -> anyhow::Result<String> {
    validate_title("title", raw, client.config().max_title_len).map_err(|e| rejected(output, &e))
}

pub fn checked_color(output: OutputMode, raw: Option<&str>) -> anyhow::Result<Option<String>> {
    raw.map(validate_color)
        .transpose()
        .map_err(|e| rejected(output, &e))
}

pub fn parse_status(output: OutputMode, raw: &str) -> anyhow::Result<TaskStatus> {
    raw.parse::<TaskStatus>()
        .map_err(|e| fail(output, &CliError::coded(ErrorCode::InvalidStatus, e.to_string())))
}

/// Wait for refetches, render the settled view, then report the outcome.
///
/// A rolled-back mutation still renders (the restored state) and then warns;
/// the command exits non-zero either way.
pub async fn conclude<T>(
    client: &SyncClient,
    output: OutputMode,
    result: Result<T, MutationError>,
    render: impl FnOnce(&SyncClient) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    client.settled().await;
    match result {
        Ok(_) => {
            debug!("mutation confirmed");
            render(client)
        }
        Err(err) if err.is_rolled_back() => {
            warn!(error = %err, "mutation rolled back");
            render(client)?;
            render_warning(
                output,
                &CliError::coded(err.code(), format!("change reverted: {err}")),
            )?;
            Err(Reported.into())
        }
        Err(err) => Err(fail(output, &CliError::coded(err.code(), err.to_string()))),
    }
}

/// Truncate to `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("Rust", 10), "Rust");
        assert_eq!(truncate("Rust", 4), "Rust");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate("Größenordnung", 5), "Größ…");
    }

    #[test]
    fn status_aliases_parse() {
        assert_eq!(
            parse_status(OutputMode::Json, "done").ok(),
            Some(TaskStatus::Completed)
        );
        assert_eq!(
            parse_status(OutputMode::Json, "in-progress").ok(),
            Some(TaskStatus::InProgress)
        );
    }

    #[test]
    fn bad_colors_are_rejected_locally() {
        assert!(checked_color(OutputMode::Json, Some("blue")).is_err());
        assert_eq!(
            checked_color(OutputMode::Json, None).ok(),
            Some(None)
        );
    }
}
