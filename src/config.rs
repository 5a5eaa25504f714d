//! Configuration loaded from `reprise.toml`.
//!
//! Every field has a default, so a missing file or a partial one is fine.
//! `ANTHROPIC_API_KEY` takes precedence over the file's `api_key`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::error::ReviewError;
use crate::scheduler::{DEFAULT_WEIGHTS, MemoryModel, Scheduler};
use crate::selector::SelectorConfig;

pub const CONFIG_FILE: &str = "reprise.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepriseConfig {
    /// Anthropic API key used by the grading judge.
    pub api_key: String,

    /// Model id for equivalence and correction calls.
    pub grading_model: String,

    /// Largest session a caller may request.
    pub max_take: usize,

    /// Most failed items re-drilled in one session.
    pub failed_cap: usize,

    /// New items per day for users without their own setting.
    pub default_per_day_max: u32,

    /// Target recall probability at the next review.
    pub request_retention: f64,

    /// Interval jitter, as a fraction of the interval.
    pub fuzz: f64,

    pub request_timeout_secs: u64,

    /// Users allowed to call the engine. Empty allows everyone.
    pub approved_users: Vec<String>,

    /// Where graded attempts are appended as JSON lines. Off when unset.
    pub training_log: Option<PathBuf>,
}

impl Default for RepriseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            grading_model: "claude-3-5-haiku-latest".to_string(),
            max_take: 45,
            failed_cap: 10,
            default_per_day_max: 10,
            request_retention: 0.9,
            fuzz: 0.2,
            request_timeout_secs: 30,
            approved_users: Vec::new(),
            training_log: None,
        }
    }
}

impl RepriseConfig {
    /// Loads `reprise.toml` from the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<RepriseConfig>(&contents)?
        } else {
            log::debug!("{} not found, using defaults", path.display());
            Self::default()
        };

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReviewError> {
        if !(self.request_retention > 0.0 && self.request_retention < 1.0) {
            return Err(ReviewError::Config(format!(
                "request_retention must be in (0, 1), got {}",
                self.request_retention
            )));
        }
        if !(0.0..1.0).contains(&self.fuzz) {
            return Err(ReviewError::Config(format!(
                "fuzz must be in [0, 1), got {}",
                self.fuzz
            )));
        }
        if self.max_take == 0 {
            return Err(ReviewError::Config("max_take must be positive".into()));
        }
        Ok(())
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            MemoryModel::new(DEFAULT_WEIGHTS, self.request_retention),
            self.fuzz,
        )
    }

    pub fn selector(&self) -> SelectorConfig {
        SelectorConfig {
            max_take: self.max_take,
            failed_cap: self.failed_cap,
            default_per_day_max: self.default_per_day_max,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
