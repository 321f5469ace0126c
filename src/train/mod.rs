//! Training entry point. The training framework itself is an external
//! program; this module fixes its hyperparameters and drives it.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod script;

pub use script::ScriptTrainer;

/// Hyperparameters for one voice model.
///
/// The defaults target RVC v2 at 32 kHz with the `f0Ov2Super32k`
/// pretrained pair; batch size 8 fits in 6GB of VRAM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub rvc_version: String,
    pub total_epoch: u32,
    pub save_every_epoch: u32,
    pub save_only_latest: bool,
    pub save_every_weights: bool,
    pub sample_rate: u32,
    pub batch_size: u32,
    pub gpu: u32,
    pub pitch_guidance: bool,
    pub overtraining_detector: bool,
    pub overtraining_threshold: u32,
    pub pretrained: bool,
    pub custom_pretrained: bool,
    pub g_pretrained_path: PathBuf,
    pub d_pretrained_path: PathBuf,
    pub f0_method: String,
    pub hop_length: u32,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self::with_epochs(50)
    }
}

impl TrainingParams {
    pub fn with_epochs(total_epoch: u32) -> Self {
        Self {
            rvc_version: "v2".to_string(),
            total_epoch,
            // only the final weights are kept
            save_every_epoch: total_epoch + 1,
            save_only_latest: false,
            save_every_weights: false,
            sample_rate: 32000,
            batch_size: 8,
            gpu: 0,
            pitch_guidance: true,
            overtraining_detector: false,
            overtraining_threshold: 1,
            pretrained: true,
            custom_pretrained: true,
            g_pretrained_path: PathBuf::from("models/f0Ov2Super32kG.pth"),
            d_pretrained_path: PathBuf::from("models/f0Ov2Super32kD.pth"),
            f0_method: "rmvpe".to_string(),
            hop_length: 128,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub model_path: PathBuf,
    pub index_path: PathBuf,
}

#[async_trait]
pub trait VoiceTrainer: Send + Sync {
    async fn train_voice(&self, voice_id: &str, audio_dir: &Path) -> Result<TrainedModel>;
}
