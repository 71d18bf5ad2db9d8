use std::fmt;

/// Machine-readable error codes surfaced by the CLI and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidConfigValue,
    EmptyField,
    FieldTooLong,
    InvalidColor,
    NotCached,
    InvalidStatus,
    TransportFailure,
    LoadFailed,
    FetchCancelled,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidConfigValue => "E1002",
            Self::EmptyField => "E2001",
            Self::FieldTooLong => "E2002",
            Self::InvalidColor => "E2003",
            Self::NotCached => "E2004",
            Self::InvalidStatus => "E2005",
            Self::TransportFailure => "E3001",
            Self::LoadFailed => "E3002",
            Self::FetchCancelled => "E3003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidConfigValue => "Invalid config value",
            Self::EmptyField => "Required field is empty",
            Self::FieldTooLong => "Field is too long",
            Self::InvalidColor => "Invalid color",
            Self::NotCached => "Entity not present in the cached roadmap",
            Self::InvalidStatus => "Invalid task status",
            Self::TransportFailure => "Request to the server failed",
            Self::LoadFailed => "Could not load data from the server",
            Self::FetchCancelled => "Fetch was superseded by a newer write",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to users.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => {
                Some("Fix syntax in ~/.config/learnpath/config.toml and retry.")
            }
            Self::InvalidConfigValue => Some("Check api.timeout_secs and sync.max_title_len; both must be at least 1."),
            Self::EmptyField => Some("Provide a non-blank title."),
            Self::FieldTooLong => Some("Shorten the title to 255 characters or fewer."),
            Self::InvalidColor => Some("Use a hex color such as #6366f1."),
            Self::NotCached => Some("Run `lp show <roadmap>` to refresh, then retry."),
            Self::InvalidStatus => Some("Use not_started, in_progress or completed."),
            Self::TransportFailure => {
                Some("Your change was reverted. Check the server and retry the action.")
            }
            Self::LoadFailed => Some("Check LEARNPATH_API_URL / LEARNPATH_API_KEY and retry."),
            Self::FetchCancelled => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
