use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;
use crate::validate::MAX_TITLE_LEN;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LEARNPATH_CONFIG";
pub const API_URL_ENV: &str = "LEARNPATH_API_URL";
pub const API_KEY_ENV: &str = "LEARNPATH_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Refetch observed keys in the background after every settle.
    #[serde(default = "default_true")]
    pub refetch_on_settle: bool,
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refetch_on_settle: default_true(),
            max_title_len: default_max_title_len(),
        }
    }
}

/// A config file that parsed but holds a value outside its allowed range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value in {}: {key} {reason}", path.display())]
pub struct InvalidConfigValue {
    pub path: PathBuf,
    pub key: &'static str,
    pub reason: &'static str,
}

/// Error code for a failed [`resolve_config`] or [`load_config`].
#[must_use]
pub fn config_error_code(err: &anyhow::Error) -> ErrorCode {
    if err.is::<InvalidConfigValue>() {
        ErrorCode::InvalidConfigValue
    } else {
        ErrorCode::ConfigParseError
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub config: Config,
    pub source: Option<PathBuf>,
    pub resolved_output: String,
}

/// Default location: `<config dir>/learnpath/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("learnpath/config.toml"))
}

/// Load a config file. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<Config>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let invalid = |key, reason| InvalidConfigValue {
        path: path.to_path_buf(),
        key,
        reason,
    };
    if config.sync.max_title_len == 0 {
        return Err(invalid("sync.max_title_len", "must be at least 1").into());
    }
    if config.api.timeout_secs == 0 {
        return Err(invalid("api.timeout_secs", "must be at least 1").into());
    }
    Ok(config)
}

/// Resolve the effective configuration.
///
/// File: `explicit` path, else `LEARNPATH_CONFIG`, else the default location.
/// `LEARNPATH_API_URL` and `LEARNPATH_API_KEY` override the file.
pub fn resolve_config(explicit: Option<&Path>, cli_json: bool) -> Result<EffectiveConfig> {
    let source = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .or_else(default_config_path);

    let mut config = match &source {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_env_overrides(
        &mut config,
        env::var(API_URL_ENV).ok(),
        env::var(API_KEY_ENV).ok(),
    );

    let resolved_output = resolve_output(cli_json, config.output.clone(), env::var("FORMAT").ok());

    Ok(EffectiveConfig {
        config,
        source,
        resolved_output,
    })
}

fn apply_env_overrides(config: &mut Config, api_url: Option<String>, api_key: Option<String>) {
    if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
        config.api.base_url = url.trim().to_string();
    }
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        config.api.api_key = Some(key);
    }
}

fn resolve_output(cli_json: bool, config_output: Option<String>, env_format: Option<String>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = config_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

const fn default_max_title_len() -> usize {
    MAX_TITLE_LEN
}
