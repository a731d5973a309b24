use crate::{ExtractError, Result};
use ignore::gitignore::GitignoreBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Per-repository configuration file, looked up at the repository root
pub const CONFIG_FILE_NAME: &str = "codelore.toml";

pub const WORKERS_ENV: &str = "CODELORE_WORKERS";
pub const OUTPUT_DIR_ENV: &str = "CODELORE_OUTPUT_DIR";

const DEFAULT_MAX_FILE_BYTES: u64 = 1_048_576; // 1 MiB
const DEFAULT_OUTPUT_DIR: &str = "data";

/// Extraction settings.
///
/// Layered lowest to highest: defaults, `codelore.toml` (or an explicit file),
/// environment, command-line overrides applied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// Gitignore-syntax patterns on top of the built-in directory blocklist
    pub ignore: Vec<String>,
    pub respect_gitignore: bool,
    /// Larger files are skipped
    pub max_file_bytes: u64,
    /// Parse workers; defaults to available parallelism
    pub workers: Option<usize>,
    pub output_dir: PathBuf,
    /// Checked between stages; exceeding it aborts before anything is written
    pub time_budget_ms: Option<u64>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            respect_gitignore: true,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            workers: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            time_budget_ms: None,
        }
    }
}

impl ExtractConfig {
    /// Defaults, then the config file, then the process environment
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = root.join(CONFIG_FILE_NAME);
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ExtractError::config(format!("cannot read {}: {err}", path.display()))
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| ExtractError::config(err.to_string()))
    }

    /// Apply `CODELORE_*` overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(WORKERS_ENV).filter(|v| !v.trim().is_empty()) {
            let workers = raw.trim().parse::<usize>().map_err(|_| {
                ExtractError::config(format!("{WORKERS_ENV} must be a positive integer, got '{raw}'"))
            })?;
            self.workers = Some(workers);
        }
        if let Some(raw) = lookup(OUTPUT_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.output_dir = PathBuf::from(raw.trim());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(ExtractError::config("workers must be at least 1"));
        }
        if self.max_file_bytes == 0 {
            return Err(ExtractError::config("max_file_bytes must be positive"));
        }
        let mut builder = GitignoreBuilder::new("");
        for pattern in &self.ignore {
            builder
                .add_line(None, pattern)
                .map_err(|err| ExtractError::config(format!("ignore pattern '{pattern}': {err}")))?;
        }
        Ok(())
    }

    /// Worker count for `file_count` files: never more than the files, never zero
    pub fn effective_workers(&self, file_count: usize) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.workers
            .unwrap_or(available)
            .min(file_count)
            .max(1)
    }

    pub fn deadline(&self, started: Instant) -> Option<Instant> {
        self.time_budget_ms
            .map(|ms| started + Duration::from_millis(ms))
    }
}
