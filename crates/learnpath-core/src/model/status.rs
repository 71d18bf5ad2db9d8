use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The three progress states of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Every status in cycle order.
    pub const ALL: [Self; 3] = [Self::NotStarted, Self::InProgress, Self::Completed];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Human label used by renderers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
        }
    }

    /// The status a single "advance" action moves to.
    ///
    /// `not_started -> in_progress -> completed -> not_started`
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::NotStarted => Self::InProgress,
            Self::InProgress => Self::Completed,
            Self::Completed => Self::NotStarted,
        }
    }

    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`TaskStatus`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid task status: '{got}' (expected not_started, in_progress or completed)")]
pub struct ParseStatusError {
    pub got: String,
}

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "not_started" | "todo" => Ok(Self::NotStarted),
            "in_progress" | "doing" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            _ => Err(ParseStatusError { got: s.to_string() }),
        }
    }
}
