use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::network::spec::ConvNetSpec;

/// Configuration for a training run. Every key is optional in TOML; missing
/// keys take the defaults below.
///
/// # Fields
/// - `batch_size`       — examples per minibatch (≥ 1)
/// - `learning_rate`    — initial SGD learning rate
/// - `target_accuracy`  — test accuracy that ends the run successfully
/// - `plateau_patience` — epochs without improvement before the rate decays
/// - `stagnation_limit` — epochs without improvement before the run gives up
/// - `lr_decay_factor`  — divisor applied on each decay
/// - `lr_floor`         — no further decay once the rate is at or below this
/// - `max_epochs`       — last epoch index the run may reach
/// - `seed`             — model initialization seed
/// - `checkpoint_path`  — where the best checkpoint is written
/// - `model`            — architecture of the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub learning_rate: f64,
    pub target_accuracy: f64,
    pub plateau_patience: usize,
    pub stagnation_limit: usize,
    pub lr_decay_factor: f64,
    pub lr_floor: f64,
    pub max_epochs: usize,
    pub seed: u64,
    pub checkpoint_path: PathBuf,
    pub model: ConvNetSpec,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            batch_size: 32,
            learning_rate: 0.01,
            target_accuracy: 0.99,
            plateau_patience: 5,
            stagnation_limit: 10,
            lr_decay_factor: 10.0,
            lr_floor: 1e-6,
            max_epochs: 100,
            seed: 42,
            checkpoint_path: PathBuf::from("checkpoints/best.ckpt"),
            model: ConvNetSpec::default(),
        }
    }
}

impl TrainConfig {
    pub fn from_toml_str(text: &str) -> Result<TrainConfig> {
        let config: TrainConfig = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<TrainConfig> {
        let text = std::fs::read_to_string(path)?;
        TrainConfig::from_toml_str(&text)
    }

    /// Rejects values the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));
        if self.batch_size == 0 {
            return fail("batch_size must be at least 1".into());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return fail(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(self.target_accuracy > 0.0 && self.target_accuracy <= 1.0) {
            return fail(format!("target_accuracy must be in (0, 1], got {}", self.target_accuracy));
        }
        if !(self.lr_decay_factor.is_finite() && self.lr_decay_factor > 1.0) {
            return fail(format!("lr_decay_factor must be greater than 1, got {}", self.lr_decay_factor));
        }
        if !(self.lr_floor.is_finite() && self.lr_floor > 0.0) {
            return fail(format!("lr_floor must be positive, got {}", self.lr_floor));
        }
        if self.model.kernel % 2 == 0 {
            return fail(format!("model.kernel must be odd, got {}", self.model.kernel));
        }
        if self.model.filters == 0 || self.model.hidden == 0 || self.model.num_classes < 2 {
            return fail("model needs at least one filter, one hidden unit and two classes".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(TrainConfig::from_toml_str("").unwrap(), TrainConfig::default());
    }

    #[test]
    fn partial_toml_overrides_named_keys() {
        let config = TrainConfig::from_toml_str(
            "batch_size = 64\nplateau_patience = 3\n[model]\nhidden = 128\n",
        )
        .unwrap();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.plateau_patience, 3);
        assert_eq!(config.model.hidden, 128);
        assert_eq!(config.model.filters, 8);
        assert_eq!(config.stagnation_limit, 10);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(TrainConfig::from_toml_str("epochs = 3"), Err(Error::Config(_))));
    }

    #[test]
    fn validation_catches_bad_values() {
        for bad in [
            TrainConfig { batch_size: 0, ..TrainConfig::default() },
            TrainConfig { learning_rate: 0.0, ..TrainConfig::default() },
            TrainConfig { lr_decay_factor: 1.0, ..TrainConfig::default() },
            TrainConfig { target_accuracy: 1.5, ..TrainConfig::default() },
        ] {
            assert!(matches!(bad.validate(), Err(Error::Config(_))), "{bad:?}");
        }
    }
}
