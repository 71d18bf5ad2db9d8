//! Client-side pre-checks run at the dispatch boundary.
//!
//! A rejected input never touches the cache and never reaches the network.

use crate::error::ErrorCode;

/// Longest title the backend accepts.
pub const MAX_TITLE_LEN: usize = 255;

/// Accent the backend assigns when a roadmap is created without one.
pub const DEFAULT_COLOR: &str = "#6366f1";

/// Input rejected before any mutation was dispatched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("{field} is {len} characters; the limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid color '{0}': expected #rrggbb")]
    InvalidColor(String),

    #[error("{entity} '{id}' is not in the cached roadmap '{roadmap_id}'")]
    NotCached {
        entity: &'static str,
        id: String,
        roadmap_id: String,
    },
}

impl ValidationError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyField { .. } => ErrorCode::EmptyField,
            Self::FieldTooLong { .. } => ErrorCode::FieldTooLong,
            Self::InvalidColor(_) => ErrorCode::InvalidColor,
            Self::NotCached { .. } => ErrorCode::NotCached,
        }
    }
}

/// Trim `raw` and require it to be non-empty and at most `max` characters.
///
/// Returns the trimmed value.
pub fn validate_title(
    field: &'static str,
    raw: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(ValidationError::FieldTooLong { field, len, max });
    }
    Ok(trimmed.to_string())
}

/// Require a `#rrggbb` hex color.
pub fn validate_color(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let valid = trimmed.len() == 7
        && trimmed.starts_with('#')
        && trimmed[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(ValidationError::InvalidColor(raw.to_string()))
    }
}

/// Trim optional free text; blank collapses to `None`.
#[must_use]
pub fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
