use burn::prelude::*;
use depdetect_core::dataset::{ChannelOrder, ConstantSamplePolicy};

use crate::error::TrainError;
use crate::optim::AdadeltaConfig;

/// Everything that controls one training run apart from the data itself.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = "AdadeltaConfig::new()")]
    pub optimizer: AdadeltaConfig,
    #[config(default = 2)]
    pub num_classes: usize,
    #[config(default = 4)]
    pub num_epochs: usize,
    #[config(default = 8)]
    pub batch_size: usize,
    #[config(default = 15)]
    pub seed: u64,
    #[config(default = 1.0)]
    pub learning_rate: f64,
    #[config(default = true)]
    pub shuffle: bool,
    #[config(default = "ChannelOrder::ChannelsFirst")]
    pub channel_order: ChannelOrder,
    #[config(default = "ConstantSamplePolicy::Zero")]
    pub constant_samples: ConstantSamplePolicy,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.batch_size == 0 {
            return Err(TrainError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.num_epochs == 0 {
            return Err(TrainError::InvalidConfig("num_epochs must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let config = TrainingConfig::new();
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.num_classes, 2);
        assert_eq!(config.num_epochs, 4);
        assert_eq!(config.seed, 15);
        assert_eq!(config.channel_order, ChannelOrder::ChannelsFirst);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_batch_is_invalid() {
        let err = TrainingConfig::new().with_batch_size(0).validate().unwrap_err();
        assert!(matches!(err, TrainError::InvalidConfig(_)));
    }

    #[test]
    fn config_survives_json() {
        let config = TrainingConfig::new()
            .with_num_epochs(9)
            .with_channel_order(ChannelOrder::ChannelsLast);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        config.save(&path).unwrap();

        let loaded = TrainingConfig::load(&path).unwrap();
        assert_eq!(loaded.num_epochs, 9);
        assert_eq!(loaded.channel_order, ChannelOrder::ChannelsLast);
    }
}
