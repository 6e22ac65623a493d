//! Configuration loading and folder resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Config file name looked up in the platform config directories
pub const CONFIG_FILE_NAME: &str = "snapshelf.toml";

/// Default HTTP bind address for the intake service
pub const DEFAULT_BIND: &str = "127.0.0.1:5740";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. "info", "snapshelf_intake=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Remote catalog section of the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Admin API base URL, e.g. `https://shop.example.com/admin/api/2024-10`
    pub base_url: Option<String>,
    /// Admin API access token
    pub access_token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Bound on a whole finalize upload (all images) in seconds
    pub upload_timeout_secs: u64,
    /// Outbound request budget
    pub requests_per_second: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            access_token: None,
            timeout_secs: 60,
            upload_timeout_secs: 300,
            requests_per_second: 2,
        }
    }
}

/// Image normalization section of the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Longest edge of the square output, in pixels
    pub max_edge: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Maximum number of images normalized at once
    pub concurrency: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_edge: 2048,
            jpeg_quality: 90,
            concurrency: 4,
        }
    }
}

/// Contents of `snapshelf.toml`
///
/// All fields are optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder the camera/phone drops photos into
    pub watch_folder: Option<PathBuf>,
    /// Archive root; originals are deleted after upload when unset
    pub archive_folder: Option<PathBuf>,
    /// HTTP bind address
    pub bind: Option<String>,
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
    pub normalize: NormalizeConfig,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub watch_folder: PathBuf,
    pub bind: String,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            watch_folder: default_watch_folder(),
            bind: DEFAULT_BIND.to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Load the TOML config
///
/// With an explicit path the file must exist and parse. Without one the
/// platform locations are searched; if none exists the defaults are used.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match find_config_file() {
            Some(path) => path,
            None => {
                warn!("No {} found, using compiled defaults", CONFIG_FILE_NAME);
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config = TomlConfig::from_toml_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Search the platform config locations for `snapshelf.toml`
fn find_config_file() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("snapshelf").join(CONFIG_FILE_NAME));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/snapshelf").join(CONFIG_FILE_NAME));
    }

    candidates.into_iter().find(|p| {
        debug!("Checking for config file at {}", p.display());
        p.exists()
    })
}

/// Get OS-dependent default watch folder
fn default_watch_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        // %USERPROFILE%\Pictures\SnapShelf
        dirs::picture_dir()
            .map(|d| d.join("SnapShelf"))
            .unwrap_or_else(|| PathBuf::from("C:\\SnapShelf\\inbox"))
    } else {
        // ~/.local/share/snapshelf/inbox (Linux), ~/Library/Application Support/snapshelf/inbox (macOS)
        dirs::data_local_dir()
            .map(|d| d.join("snapshelf").join("inbox"))
            .unwrap_or_else(|| PathBuf::from("./snapshelf_data/inbox"))
    }
}

/// Resolve a folder setting: CLI > ENV > TOML > default
pub fn resolve_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
    default: PathBuf,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default
}

/// Resolve an optional string setting: CLI > ENV > TOML
///
/// Blank values at any tier are treated as unset.
pub fn resolve_string(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_value: Option<&str>,
) -> Option<String> {
    let env_value = std::env::var(env_var_name).ok();
    let resolved = [cli_arg, env_value.as_deref(), toml_value]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string);
    resolved
}

/// Create the directory (and parents) if missing
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(Error::Config(format!(
            "{} exists but is not a directory",
            path.display()
        )));
    }
    std::fs::create_dir_all(path)?;
    info!("Created directory: {}", path.display());
    Ok(())
}
