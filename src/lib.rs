//! Pairwise appliance classification with leave-one-house-out cross-validation
//!
//! Trains one binary neural network per unordered pair of appliance classes on
//! current/voltage traces, holding each house out in turn as the validation set.

pub mod data;
pub mod model;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An unordered pair of distinct class indices, stored with `a < b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassPair {
    pub a: usize,
    pub b: usize,
}

impl ClassPair {
    /// Create a pair, ordering the two classes
    pub fn new(x: usize, y: usize) -> Self {
        if x <= y {
            ClassPair { a: x, b: y }
        } else {
            ClassPair { a: y, b: x }
        }
    }

    /// Check whether a label belongs to this pair
    pub fn contains(&self, label: usize) -> bool {
        label == self.a || label == self.b
    }

    /// Two-column one-hot encoding restricted to `{a, b}`
    ///
    /// Column 0 is class `a`, column 1 is class `b`. Labels outside the pair
    /// have no encoding.
    pub fn one_hot(&self, label: usize) -> Option<[f32; 2]> {
        if label == self.a {
            Some([1.0, 0.0])
        } else if label == self.b {
            Some([0.0, 1.0])
        } else {
            None
        }
    }
}

impl fmt::Display for ClassPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.a, self.b)
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum ApplianceError {
    #[error("Number of classes doesn't match labels input: {names} class names, {labels} labels")]
    ClassCountMismatch { names: usize, labels: usize },

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Array file error: {0}")]
    Npy(String),

    #[error("Sampling error: {0}")]
    Sampling(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Expected {expected} pair models, got {actual}")]
    ModelCountMismatch { expected: usize, actual: usize },

    #[error("Model at position {index} is bound to {actual}, expected {expected}")]
    PairMismatch {
        index: usize,
        expected: ClassPair,
        actual: ClassPair,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ApplianceError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Records drawn per training step
    pub batch_size: usize,
    /// Evaluate and checkpoint every N steps (and at step 1)
    pub display_step: usize,
    /// Stop once this step is reached; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
    pub learning_rate: f64,
    pub seed: u64,
    /// Skip a pair when its training records lack one of the two classes,
    /// instead of failing the whole run
    #[serde(default = "default_true")]
    pub skip_untrainable_pairs: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            batch_size: 50,
            display_step: 100,
            max_steps: None,
            learning_rate: 0.001,
            seed: 21,
            skip_untrainable_pairs: true,
        }
    }
}

impl TrainingConfig {
    /// Apply a command-line step limit, where `-1` means no limit
    pub fn set_max_step(&mut self, max_step: i64) -> Result<()> {
        self.max_steps = match max_step {
            -1 => None,
            n if n > 0 => Some(n as usize),
            n => {
                return Err(ApplianceError::Config(format!(
                    "max-step must be positive or -1 for no limit, got {}",
                    n
                )))
            }
        };
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ApplianceError::Config("batch_size must be positive".to_string()));
        }
        if self.display_step == 0 {
            return Err(ApplianceError::Config("display_step must be positive".to_string()));
        }
        if self.max_steps == Some(0) {
            return Err(ApplianceError::Config("max_steps must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub hidden_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig { hidden_size: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub bundle_path: String,
    pub class_map_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            bundle_path: "data/traces_bundle.npy".to_string(),
            class_map_path: "data/traces_class_map.json".to_string(),
            checkpoint: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApplianceError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ApplianceError::Config(format!("Failed to parse config: {}", e)))?;
        config.training.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ApplianceError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
