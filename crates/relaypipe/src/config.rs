use std::path::Path;

use serde::{Deserialize, Serialize};

/// The defaultable knobs `add_origin`/`add_task`/`add_destination` and
/// [`crate::Pipeline::new`] fall back to when a caller passes `None`.
///
/// Loaded from TOML (`[pipeline]` table) with environment overrides, the way
/// the teacher's messaging layer loads `eisenbahn.toml` — a named pipeline
/// embedded in a larger service can ship one `relaypipe.toml` instead of
/// hardcoding every stage's worker count and chunk size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineDefaults {
    /// Bound on every inter-stage queue. `<= 0` means unbounded.
    pub max_size: isize,
    /// Emit threshold for a stage that doesn't set its own. `0` means 1.
    pub chunk_size: usize,
    /// Worker count for a stage that doesn't set its own. `None` means host
    /// CPU count, resolved at `start()` time, not at config-load time.
    pub workers: Option<usize>,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            max_size: -1,
            chunk_size: 1,
            workers: None,
        }
    }
}

impl PipelineDefaults {
    pub fn resolved_chunk_size(&self, requested: Option<usize>) -> Option<usize> {
        requested.or(Some(self.chunk_size).filter(|k| *k >= 1))
    }

    pub fn resolved_workers(&self, requested: Option<usize>) -> Option<usize> {
        requested.or(self.workers)
    }

    /// Parses a `[pipeline]` table out of a TOML document, then applies
    /// `RELAYPIPE_MAX_SIZE`/`RELAYPIPE_CHUNK_SIZE`/`RELAYPIPE_WORKERS`
    /// overrides on top.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize, Default)]
        struct Document {
            #[serde(default)]
            pipeline: PipelineDefaults,
        }
        let mut parsed: Document = toml::from_str(toml_str)?;
        parsed.pipeline.apply_env_overrides();
        Ok(parsed.pipeline)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Builds defaults purely from `RELAYPIPE_*` environment variables,
    /// falling back to [`PipelineDefaults::default`] for anything unset.
    pub fn from_env() -> Self {
        let mut defaults = Self::default();
        defaults.apply_env_overrides();
        defaults
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parsed("RELAYPIPE_MAX_SIZE") {
            self.max_size = v;
        }
        if let Some(v) = env_parsed("RELAYPIPE_CHUNK_SIZE") {
            self.chunk_size = v;
        }
        if let Some(v) = env_parsed("RELAYPIPE_WORKERS") {
            self.workers = Some(v);
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}
