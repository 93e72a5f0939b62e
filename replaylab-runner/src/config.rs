//! Serializable batch configuration.

use crate::strategies::StrategySpec;
use replaylab_core::data::{LoadOptions, StreamOptions};
use replaylab_core::engine::{BacktestConfig, CommissionModel};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_initial_cash() -> f64 {
    100_000.0
}

fn default_strategies() -> Vec<StrategyEntry> {
    StrategySpec::default_set()
        .into_iter()
        .map(StrategyEntry::from)
        .collect()
}

/// One strategy in a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyEntry {
    /// Display name; defaults to a name derived from the parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub spec: StrategySpec,

    /// Restrict this strategy to the named datasets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasets: Option<Vec<String>>,
}

impl StrategyEntry {
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.spec.default_name())
    }

    pub fn applies_to(&self, dataset: &str) -> bool {
        self.datasets
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n == dataset))
    }
}

impl From<StrategySpec> for StrategyEntry {
    fn from(spec: StrategySpec) -> Self {
        Self {
            name: None,
            spec,
            datasets: None,
        }
    }
}

/// Everything needed to run a strategy × dataset batch.
///
/// Each dataset is a subdirectory of `data_dir`. With no datasets listed,
/// `data_dir` itself is the single dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub datasets: Vec<String>,

    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,

    /// Cash floor enforced before each order executes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_buffer: Option<f64>,

    /// Per-file cap on accepted rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<usize>,

    /// Run the strategies of an in-memory dataset on the rayon pool.
    #[serde(default)]
    pub parallel: bool,

    #[serde(default)]
    pub commission: CommissionModel,

    /// Stream each dataset from disk in chunks instead of loading it whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<StreamOptions>,

    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyEntry>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            datasets: Vec::new(),
            initial_cash: default_initial_cash(),
            cash_buffer: None,
            max_rows: None,
            parallel: false,
            commission: CommissionModel::default(),
            streaming: None,
            strategies: default_strategies(),
        }
    }
}

impl BatchConfig {
    /// Parse and validate a config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            datasets = config.datasets.len(),
            strategies = config.strategies.len(),
            "loaded batch config"
        );
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return invalid(format!("initial_cash must be positive, got {}", self.initial_cash));
        }
        if let Some(buffer) = self.cash_buffer {
            if !(buffer.is_finite() && buffer >= 0.0) {
                return invalid(format!("cash_buffer must be non-negative, got {buffer}"));
            }
        }
        if self.max_rows == Some(0) {
            return invalid("max_rows must be positive".into());
        }
        let rates = [self.commission.per_unit, self.commission.minimum];
        if !rates.iter().all(|r| r.is_finite() && *r >= 0.0) {
            return invalid("commission rates must be finite and non-negative".into());
        }
        if let Some(stream) = &self.streaming {
            if stream.chunk_rows == 0 {
                return invalid("streaming.chunk_rows must be positive".into());
            }
        }

        let mut seen = HashSet::new();
        for dataset in &self.datasets {
            if !seen.insert(dataset.as_str()) {
                return invalid(format!("dataset {dataset:?} listed twice"));
            }
        }

        if self.strategies.is_empty() {
            return invalid("no strategies configured".into());
        }
        let known: HashSet<String> = self.dataset_dirs().into_iter().map(|(n, _)| n).collect();
        let mut names = HashSet::new();
        for entry in &self.strategies {
            let name = entry.name();
            if !names.insert(name.clone()) {
                return invalid(format!("strategy name {name:?} used twice"));
            }
            if let Some(filter) = &entry.datasets {
                if let Some(unknown) = filter.iter().find(|d| !known.contains(*d)) {
                    return invalid(format!("strategy {name} names unknown dataset {unknown:?}"));
                }
            }
        }
        Ok(())
    }

    /// `(dataset name, directory)` pairs in config order.
    pub fn dataset_dirs(&self) -> Vec<(String, PathBuf)> {
        if self.datasets.is_empty() {
            let name = self
                .data_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.data_dir.display().to_string());
            return vec![(name, self.data_dir.clone())];
        }
        self.datasets
            .iter()
            .map(|name| (name.clone(), self.data_dir.join(name)))
            .collect()
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::default().with_max_rows(self.max_rows)
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_cash: self.initial_cash,
            cash_floor: self.cash_buffer,
            commission: self.commission,
            ..BacktestConfig::default()
        }
    }
}
