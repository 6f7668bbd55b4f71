use crate::error::{CasePilotError, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

impl FromStr for Theme {
    type Err = CasePilotError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(CasePilotError::Validation(format!(
                "Unknown theme '{}' (expected dark or light)",
                other
            ))),
        }
    }
}

/// Persisted client preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CasePilotConfig {
    #[serde(rename = "serverUrl", default = "default_server_url")]
    pub server_url: String,
    #[serde(rename = "activeProject", default)]
    pub active_project: Option<String>,
    #[serde(default)]
    pub theme: Theme,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

impl Default for CasePilotConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            active_project: None,
            theme: Theme::default(),
        }
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(home_dir) = dirs::home_dir() {
        Ok(home_dir.join(".casepilot"))
    } else {
        Err(CasePilotError::Config(
            "Could not find home directory".to_string(),
        ))
    }
}

pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn get_logs_dir() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("logs"))
}

/// Create `dir` if missing, owner-only on Unix.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(dir)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(dir, permissions)?;
        }
    }
    Ok(())
}

pub fn ensure_config_dir() -> Result<()> {
    ensure_private_dir(&get_config_dir()?)
}

pub fn ensure_logs_dir() -> Result<()> {
    ensure_private_dir(&get_logs_dir()?)
}

pub fn load_config() -> Result<CasePilotConfig> {
    ensure_config_dir()?;
    load_config_from(&get_config_file_path()?)
}

/// Load config from an explicit path. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<CasePilotConfig> {
    if !path.exists() {
        return Ok(CasePilotConfig::default());
    }

    let content = fs::read_to_string(path).context("Failed to read config file")?;
    let config: CasePilotConfig = serde_json::from_str(&content)
        .map_err(|e| CasePilotError::Config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

pub fn save_config_to(path: &Path, config: &CasePilotConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).context("Failed to write config file")?;

    // Set permissions to 600 (read/write for owner only) on Unix systems
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions)?;
    }

    Ok(())
}
