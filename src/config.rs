use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::transliterate::EXTENDED_THRESHOLD;

/// Top-level configuration.
///
/// Loaded once at startup and passed by reference into the cleaner and batch
/// driver; nothing reads it from ambient state.
///
/// # Loading
///
/// ```rust,no_run
/// use png_param_cleaner::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.extra_substitutions.insert("€".into(), "EUR".into());
/// config.batch.fail_fast = false;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Code points below this pass through unchanged.
    pub threshold: u32,
    /// Substitutions layered on top of the built-in table (single-character keys).
    pub extra_substitutions: BTreeMap<String, String>,
    /// When non-empty, batch mode rewrites exactly these files in place
    /// instead of enumerating the input directory.
    pub override_paths: Vec<PathBuf>,
    /// Batch behavior.
    pub batch: BatchConfig,
    /// Log file for unusual-character notices, used when `--log` is not given.
    pub log_file: Option<PathBuf>,
}

/// Batch driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Emit a progress line after every N matching files.
    pub progress_interval: usize,
    /// If `true`, the first failing file aborts the batch.
    pub fail_fast: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: EXTENDED_THRESHOLD,
            extra_substitutions: BTreeMap::new(),
            override_paths: Vec::new(),
            batch: BatchConfig::default(),
            log_file: None,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            fail_fast: true,
        }
    }
}

impl Config {
    /// Resolve the config file path — same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    ///
    /// A missing file at the default location yields defaults; a missing file
    /// that was asked for explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            if path.is_some() {
                bail!("Config file not found: {}", config_path.display());
            }
            log::debug!(
                "No config file at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.normalize();
        log::debug!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    fn normalize(&mut self) {
        if self.batch.progress_interval == 0 {
            log::warn!("batch.progress_interval must be at least 1; using 1");
            self.batch.progress_interval = 1;
        }
    }
}
