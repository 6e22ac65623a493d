//! Configuration resolution for snapshelf-intake
//!
//! Combines command-line arguments, environment variables and the TOML file
//! into one [`IntakeConfig`]. Priority is CLI → ENV → TOML → compiled default.

use clap::Parser;
use snapshelf_common::config::{
    resolve_folder, resolve_string, CompiledDefaults, NormalizeConfig, TomlConfig,
};
use snapshelf_common::{Error, Result};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::session::paths::normalize_lexically;

pub const ENV_WATCH_FOLDER: &str = "SNAPSHELF_WATCH_FOLDER";
pub const ENV_ARCHIVE_FOLDER: &str = "SNAPSHELF_ARCHIVE_FOLDER";
pub const ENV_BIND: &str = "SNAPSHELF_BIND";
pub const ENV_CATALOG_URL: &str = "SNAPSHELF_CATALOG_URL";
pub const ENV_CATALOG_TOKEN: &str = "SNAPSHELF_CATALOG_TOKEN";

/// Command-line arguments for snapshelf-intake
#[derive(Parser, Debug, Default)]
#[command(name = "snapshelf-intake")]
#[command(about = "Attach freshly taken photos to catalog items")]
#[command(version)]
pub struct Args {
    /// Path to snapshelf.toml (must exist when given)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Folder the camera drops photos into
    #[arg(short, long)]
    pub watch: Option<PathBuf>,

    /// Archive originals here instead of deleting them
    #[arg(short, long)]
    pub archive: Option<PathBuf>,

    /// HTTP bind address, e.g. 127.0.0.1:5740
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Log filter directive (overrides RUST_LOG and the TOML level)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub watch_folder: PathBuf,
    /// `None` means originals are deleted after upload
    pub archive_folder: Option<PathBuf>,
    pub bind: SocketAddr,
    pub catalog_base_url: String,
    pub catalog_access_token: String,
    pub catalog_timeout: Duration,
    pub upload_timeout: Duration,
    pub requests_per_second: u32,
    pub normalize: NormalizeConfig,
}

impl IntakeConfig {
    /// Resolve every setting; catalog credentials are required
    pub fn resolve(args: &Args, toml_config: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();

        let watch_folder = resolve_folder(
            args.watch.as_deref(),
            ENV_WATCH_FOLDER,
            toml_config.watch_folder.as_deref(),
            defaults.watch_folder,
        );

        let archive_folder = resolve_string(
            args.archive.as_deref().and_then(|p| p.to_str()),
            ENV_ARCHIVE_FOLDER,
            toml_config.archive_folder.as_deref().and_then(|p| p.to_str()),
        )
        .map(PathBuf::from);

        let bind_text = resolve_string(
            args.bind.as_deref(),
            ENV_BIND,
            toml_config.bind.as_deref(),
        )
        .unwrap_or(defaults.bind);
        let bind: SocketAddr = bind_text
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind_text, e)))?;

        let catalog_base_url = resolve_string(
            None,
            ENV_CATALOG_URL,
            toml_config.catalog.base_url.as_deref(),
        )
        .ok_or_else(|| missing_setting("catalog base URL", ENV_CATALOG_URL, "base_url"))?;

        let catalog_access_token = resolve_string(
            None,
            ENV_CATALOG_TOKEN,
            toml_config.catalog.access_token.as_deref(),
        )
        .ok_or_else(|| missing_setting("catalog access token", ENV_CATALOG_TOKEN, "access_token"))?;

        let mut normalize = toml_config.normalize.clone();
        normalize.concurrency = normalize.concurrency.max(1);

        let config = Self {
            watch_folder,
            archive_folder,
            bind,
            catalog_base_url,
            catalog_access_token,
            catalog_timeout: Duration::from_secs(toml_config.catalog.timeout_secs.max(1)),
            upload_timeout: Duration::from_secs(toml_config.catalog.upload_timeout_secs.max(1)),
            requests_per_second: toml_config.catalog.requests_per_second.max(1),
            normalize,
        };
        config.check_archive_folder()?;

        info!(
            watch_folder = %config.watch_folder.display(),
            archive_folder = ?config.archive_folder,
            bind = %config.bind,
            "Configuration resolved"
        );
        Ok(config)
    }

    /// Archived originals must never land back inside the watched tree
    ///
    /// Compares resolved paths, so `..` segments and symlinks cannot hide
    /// an archive folder nested in the watch folder.
    pub fn check_archive_folder(&self) -> Result<()> {
        let Some(archive) = &self.archive_folder else {
            return Ok(());
        };

        let watch = comparable_path(&self.watch_folder);
        if comparable_path(archive).starts_with(&watch) {
            return Err(Error::Config(format!(
                "Archive folder {} must be outside the watch folder {}",
                archive.display(),
                self.watch_folder.display()
            )));
        }
        Ok(())
    }
}

/// Absolute, `..`-free form of `path` with its deepest existing ancestor
/// canonicalized; the folders need not exist yet
fn comparable_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let lexical = normalize_lexically(&absolute);

    for ancestor in lexical.ancestors() {
        if let (Ok(canonical), Ok(rest)) = (ancestor.canonicalize(), lexical.strip_prefix(ancestor)) {
            return canonical.join(rest);
        }
    }
    lexical
}

/// Log filter: CLI → RUST_LOG → TOML
pub fn resolve_log_filter(args: &Args, toml_config: &TomlConfig) -> String {
    resolve_string(
        args.log_level.as_deref(),
        "RUST_LOG",
        Some(toml_config.logging.level.as_str()),
    )
    .unwrap_or_else(|| CompiledDefaults::for_current_platform().log_level)
}

fn missing_setting(what: &str, env_var: &str, toml_key: &str) -> Error {
    Error::Config(format!(
        "{} not configured. Set it using one of:\n\
         1. Environment: {}=...\n\
         2. TOML config: [catalog] {} = \"...\" in snapshelf.toml",
        what, env_var, toml_key
    ))
}
