//! Shared output layer for pretty/text/JSON parity across all `lp` commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: pretty output for humans, compact text for scripts, or
//! stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--json` flag
//! 2. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. `output` in the config file
//! 4. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.
//!
//! The precedence itself lives in `learnpath_core::config::resolve_config`;
//! this module only maps its resolved string onto [`OutputMode`].
//!
//! Errors and warnings always go to stderr so stdout stays parseable.

use learnpath_core::error::ErrorCode;
use serde::Serialize;
use std::fmt;
use std::io::{self, IsTerminal, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

/// Fixed-width bar for a 0..=100 percentage, e.g. `[######----]`.
pub fn progress_bar(percent: f64, width: usize) -> String {
    let clamped = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let filled = ((clamped / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-optimized output (sections, bars, visual framing).
    Pretty,
    /// Tab-separated rows for scripts and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    /// Map a resolved mode name onto a mode. Unknown names fall back to text.
    pub fn from_resolved(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Text,
        }
    }

    /// Mode used before configuration has been resolved.
    pub fn fallback(json_flag: bool) -> Self {
        if json_flag {
            Self::Json
        } else if io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Text
        }
    }

    /// Returns `true` if JSON output was requested.
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Render a serializable value with explicit pretty/text renderers.
pub fn render_mode<T: Serialize + ?Sized>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// A structured error with optional hint and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional hint for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Machine-readable `E####` code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Create an error carrying `code` and its stock hint.
    pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    write_problem(mode, "error", error)
}

/// Render a non-blocking warning to stderr in the requested format.
pub fn render_warning(mode: OutputMode, warning: &CliError) -> anyhow::Result<()> {
    write_problem(mode, "warning", warning)
}

fn write_problem(mode: OutputMode, level: &str, problem: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_problem_to(&mut out, mode, level, problem)
}

fn write_problem_to(
    out: &mut dyn Write,
    mode: OutputMode,
    level: &str,
    problem: &CliError,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let mut wrapper = serde_json::Map::new();
            wrapper.insert(level.to_string(), serde_json::to_value(problem)?);
            serde_json::to_writer_pretty(&mut *out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &problem.error_code {
                Some(code) => writeln!(out, "{level}[{code}]: {}", problem.message)?,
                None => writeln!(out, "{level}: {}", problem.message)?,
            }
            if let Some(ref hint) = problem.hint {
                writeln!(out, "  hint: {hint}")?;
            }
        }
    }
    Ok(())
}

/// Marker error: the failure has already been rendered to stderr.
///
/// `main` maps it to exit code 1 without printing anything further.
#[derive(Debug)]
pub struct Reported;

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("error already reported")
    }
}

impl std::error::Error for Reported {}

/// Render `error` and return the marker so callers can `return Err(...)`.
pub fn fail(mode: OutputMode, error: &CliError) -> anyhow::Error {
    if let Err(render_err) = render_error(mode, error) {
        return render_err;
    }
    Reported.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem_text(mode: OutputMode, level: &str, problem: &CliError) -> String {
        let mut buf = Vec::new();
        write_problem_to(&mut buf, mode, level, problem).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn resolved_names_map_to_modes() {
        assert_eq!(OutputMode::from_resolved("json"), OutputMode::Json);
        assert_eq!(OutputMode::from_resolved("pretty"), OutputMode::Pretty);
        assert_eq!(OutputMode::from_resolved("text"), OutputMode::Text);
        assert_eq!(OutputMode::from_resolved("yaml"), OutputMode::Text);
    }

    #[test]
    fn json_flag_wins_before_config() {
        assert!(OutputMode::fallback(true).is_json());
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0.0, 10), "[----------]");
        assert_eq!(progress_bar(50.0, 10), "[#####-----]");
        assert_eq!(progress_bar(100.0, 10), "[##########]");
    }

    #[test]
    fn progress_bar_clamps_out_of_range_values() {
        assert_eq!(progress_bar(250.0, 4), "[####]");
        assert_eq!(progress_bar(-3.0, 4), "[----]");
        assert_eq!(progress_bar(f64::NAN, 4), "[----]");
    }

    #[test]
    fn coded_error_carries_code_and_hint() {
        let err = CliError::coded(ErrorCode::EmptyField, "title must not be empty");
        assert_eq!(err.error_code.as_deref(), Some("E2001"));
        assert_eq!(err.hint.as_deref(), Some("Provide a non-blank title."));
    }

    #[test]
    fn text_problem_shows_code_and_hint() {
        let err = CliError::coded(ErrorCode::EmptyField, "title must not be empty");
        let text = problem_text(OutputMode::Text, "error", &err);
        assert_eq!(
            text,
            "error[E2001]: title must not be empty\n  hint: Provide a non-blank title.\n"
        );
    }

    #[test]
    fn json_problem_is_wrapped_by_level() {
        let err = CliError::coded(ErrorCode::TransportFailure, "request failed");
        let text = problem_text(OutputMode::Json, "warning", &err);
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["warning"]["error_code"], "E3001");
        assert_eq!(value["warning"]["message"], "request failed");
    }

    #[test]
    fn uncoded_problem_omits_brackets() {
        let err = CliError {
            message: "boom".into(),
            hint: None,
            error_code: None,
        };
        assert_eq!(problem_text(OutputMode::Pretty, "error", &err), "error: boom\n");
    }

    #[test]
    fn fail_returns_the_reported_marker() {
        let err = fail(
            OutputMode::Text,
            &CliError::coded(ErrorCode::NotCached, "task missing"),
        );
        assert!(err.is::<Reported>());
    }
}
