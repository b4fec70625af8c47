//! # Configuration
//!
//! Optional TOML file selecting the executor and the log format.
//!
//! ```toml
//! [engine]
//! executor = "threads"   # "sync" | "threads" | "tokio"
//! workers = 4
//!
//! [log]
//! format = "json"        # "text" | "json"
//! ```
//!
//! A missing file or missing keys fall back to the defaults.

use hiku_core::primitives::DEFAULT_WORKERS;
use hiku_core::{Engine, HikuError, SyncExecutor, ThreadPoolExecutor, TokioExecutor};
use serde::Deserialize;
use std::path::Path;

/// Environment variable overriding `[log] format`.
pub const LOG_FORMAT_ENV: &str = "HIKU_LOG_FORMAT";

// =============================================================================
// CONFIG TYPES
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub engine: EngineConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub executor: ExecutorKind,
    /// Worker count for the `threads` and `tokio` executors.
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorKind::default(),
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub format: LogFormat,
}

/// Which executor runs the units of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Inline on the calling thread.
    #[default]
    Sync,
    Threads,
    Tokio,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Format named by `HIKU_LOG_FORMAT`, if set to a known value.
    pub fn from_env() -> Option<Self> {
        match std::env::var(LOG_FORMAT_ENV).ok()?.as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Load `path` when given and present; otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, HikuError> {
        let Some(path) = path.filter(|p| p.exists()) else {
            tracing::debug!("no config file, using defaults");
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HikuError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&contents).map_err(|e| match e {
            HikuError::SerializationError(msg) => HikuError::SerializationError(format!(
                "Invalid config '{}': {}",
                path.display(),
                msg
            )),
            other => other,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, HikuError> {
        toml::from_str(contents).map_err(|e| HikuError::SerializationError(e.to_string()))
    }
}

impl EngineConfig {
    /// Build an engine on the configured executor.
    ///
    /// The tokio executor reuses the ambient runtime when there is one.
    pub fn build(&self) -> Result<Engine, HikuError> {
        let engine = match self.executor {
            ExecutorKind::Sync => Engine::new(SyncExecutor::new()),
            ExecutorKind::Threads => Engine::new(ThreadPoolExecutor::new(self.workers)?),
            ExecutorKind::Tokio => match TokioExecutor::current() {
                Ok(executor) => Engine::new(executor),
                Err(_) => Engine::new(TokioExecutor::new(self.workers)?),
            },
        };
        tracing::debug!(executor = ?self.executor, workers = self.workers, "engine built");
        Ok(engine)
    }
}

// =============================================================================
// TESTS
// =============================================================================
