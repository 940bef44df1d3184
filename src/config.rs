//! Configuration structures for training
//!
//! This module provides the JSON-backed configuration read by the training
//! binary: learning rate, stopping criteria, seeding and output path.

use crate::error::{NnError, Result};
use crate::utils::Activation;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Configuration for a training run.
///
/// # Example
///
/// ```json
/// {
///   "learning_rate": 0.1,
///   "max_epochs": 50000,
///   "target_loss": 0.01,
///   "seed": 42,
///   "log_every": 1000,
///   "hidden_size": 8,
///   "hidden_activation": "relu",
///   "model_path": "xor_model.txt"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Step size for plain gradient descent
    pub learning_rate: f32,

    /// Upper bound on training epochs
    pub max_epochs: usize,

    /// Training stops once the mean epoch loss drops below this value
    pub target_loss: f32,

    /// Seed for weight initialisation (time-based when absent)
    pub seed: Option<u64>,

    /// Log the epoch loss every `log_every` epochs
    pub log_every: Option<usize>,

    /// Width of the hidden layer
    pub hidden_size: Option<usize>,

    /// Activation name for the hidden layer
    pub hidden_activation: Option<String>,

    /// Where the trained model is written
    pub model_path: Option<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_epochs: 50_000,
            target_loss: 0.01,
            seed: None,
            log_every: Some(1000),
            hidden_size: Some(8),
            hidden_activation: Some("relu".to_string()),
            model_path: Some("xor_model.txt".to_string()),
        }
    }
}

impl TrainingConfig {
    /// Hidden activation, defaulting to ReLU.
    pub fn hidden_activation(&self) -> Result<Activation> {
        match &self.hidden_activation {
            Some(name) => name.parse(),
            None => Ok(Activation::Relu),
        }
    }
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it and validates the values.
///
/// # Examples
///
/// ```no_run
/// use tiny_nn::config::load_config;
///
/// let cfg = load_config("config/xor.json").unwrap();
/// assert!(cfg.learning_rate > 0.0);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks every field against its valid range.
pub fn validate_config(config: &TrainingConfig) -> Result<()> {
    if !config.learning_rate.is_finite() || config.learning_rate <= 0.0 {
        return Err(NnError::InvalidConfig(
            "learning_rate must be a positive number".to_string(),
        ));
    }

    if config.max_epochs == 0 {
        return Err(NnError::InvalidConfig(
            "max_epochs must be greater than 0".to_string(),
        ));
    }

    if config.target_loss < 0.0 {
        return Err(NnError::InvalidConfig(
            "target_loss must be non-negative".to_string(),
        ));
    }

    if config.log_every == Some(0) {
        return Err(NnError::InvalidConfig(
            "log_every must be greater than 0".to_string(),
        ));
    }

    if config.hidden_size == Some(0) {
        return Err(NnError::InvalidConfig(
            "hidden_size must be greater than 0".to_string(),
        ));
    }

    config.hidden_activation()?;

    Ok(())
}
