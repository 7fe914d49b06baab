//! Frame store configuration with environment variable and file-based loading.
//!
//! Environment variables:
//! - `CODEFRAME_STORE_PATH`: Base path for frame files
//! - `CODEFRAME_STORE_READONLY`: Set to "true" for read-only mode
//! - `CODEFRAME_COMPRESSION_LEVEL`: gzip level, 0-9
//!
//! Default path: `~/.codeframe/frames`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::codec::DEFAULT_LEVEL;

pub const ENV_STORE_PATH: &str = "CODEFRAME_STORE_PATH";
pub const ENV_READONLY: &str = "CODEFRAME_STORE_READONLY";
pub const ENV_COMPRESSION_LEVEL: &str = "CODEFRAME_COMPRESSION_LEVEL";

/// Configuration for the frame store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `cf_<id>.frame` files.
    #[serde(default = "default_store_path")]
    pub base_path: PathBuf,

    /// gzip level for new frames (0-9).
    #[serde(default = "default_level")]
    pub compression_level: u32,

    /// Read-only mode - serve existing frames, refuse new ones.
    #[serde(default)]
    pub read_only: bool,

    /// Whether the fixtures compiled into the crate are seeded at startup.
    #[serde(default = "default_true")]
    pub seed_bundled: bool,

    /// Extra fixture files seeded at startup, in addition to the bundled ones.
    #[serde(default)]
    pub fixtures: Vec<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_level() -> u32 {
    DEFAULT_LEVEL
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::with_base_path(default_store_path())
    }
}

/// Get the default store path (~/.codeframe/frames).
fn default_store_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".codeframe").join("frames"))
        .unwrap_or_else(|| PathBuf::from(".codeframe/frames"))
}

fn parse_bool(v: &str) -> bool {
    v.eq_ignore_ascii_case("true") || v == "1"
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    ///
    /// The file should contain a `[store]` section:
    /// ```toml
    /// [store]
    /// base_path = "/srv/codeframe/db"
    /// compression_level = 9
    /// fixtures = ["/srv/codeframe/fixtures/welcome.html"]
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let table: toml::Table = contents
            .parse()
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;

        let Some(section) = table.get("store") else {
            // No [store] section, fall back to env
            return Self::from_env();
        };

        let mut config: StoreConfig = section
            .clone()
            .try_into()
            .context("failed to parse [store] section")?;
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `CODEFRAME_*` environment variables onto this config.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = env::var(ENV_STORE_PATH) {
            self.base_path = PathBuf::from(path);
        }
        if let Ok(v) = env::var(ENV_READONLY) {
            self.read_only = parse_bool(&v);
        }
        if let Ok(v) = env::var(ENV_COMPRESSION_LEVEL) {
            self.compression_level = v
                .trim()
                .parse()
                .with_context(|| {
                    format!(
                        "{} must be an integer 0-9, got {:?}",
                        ENV_COMPRESSION_LEVEL, v
                    )
                })?;
        }
        Ok(())
    }

    /// Create a config with a specific base path.
    pub fn with_base_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            compression_level: DEFAULT_LEVEL,
            read_only: false,
            seed_bundled: true,
            fixtures: Vec::new(),
        }
    }

    /// Create a read-only config with a specific base path.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::with_base_path(path)
        }
    }
}
