use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{TrainedModel, TrainingParams, VoiceTrainer};

const STDERR_TAIL_LINES: usize = 20;

/// Drives the training framework's command line:
/// `<program> <base_args..> preprocess|extract|train --flag value ...`.
///
/// The framework writes its checkpoints, weights and feature index under
/// `<logs_dir>/<voice_id>`.
pub struct ScriptTrainer {
    program: String,
    base_args: Vec<String>,
    working_dir: Option<PathBuf>,
    logs_dir: PathBuf,
    params: TrainingParams,
}

fn flag(value: bool) -> String {
    let value = if value { "True" } else { "False" };
    value.to_string()
}

impl ScriptTrainer {
    pub fn new(program: String, base_args: Vec<String>, logs_dir: PathBuf) -> Self {
        Self {
            program,
            base_args,
            working_dir: None,
            logs_dir,
            params: TrainingParams::default(),
        }
    }

    pub fn with_working_dir(mut self, working_dir: PathBuf) -> Self {
        self.working_dir = Some(working_dir);
        self
    }

    pub fn preprocess_args(&self, voice_id: &str, audio_dir: &Path) -> Vec<String> {
        vec![
            "preprocess".to_string(),
            "--model_name".to_string(), voice_id.to_string(),
            "--dataset_path".to_string(), audio_dir.display().to_string(),
            "--sample_rate".to_string(), self.params.sample_rate.to_string(),
        ]
    }

    pub fn extract_args(&self, voice_id: &str) -> Vec<String> {
        let p = &self.params;
        vec![
            "extract".to_string(),
            "--model_name".to_string(), voice_id.to_string(),
            "--rvc_version".to_string(), p.rvc_version.clone(),
            "--f0_method".to_string(), p.f0_method.clone(),
            "--hop_length".to_string(), p.hop_length.to_string(),
            "--sample_rate".to_string(), p.sample_rate.to_string(),
        ]
    }

    pub fn train_args(&self, voice_id: &str) -> Vec<String> {
        let p = &self.params;
        vec![
            "train".to_string(),
            "--model_name".to_string(), voice_id.to_string(),
            "--rvc_version".to_string(), p.rvc_version.clone(),
            "--save_every_epoch".to_string(), p.save_every_epoch.to_string(),
            "--save_only_latest".to_string(), flag(p.save_only_latest),
            "--save_every_weights".to_string(), flag(p.save_every_weights),
            "--total_epoch".to_string(), p.total_epoch.to_string(),
            "--sample_rate".to_string(), p.sample_rate.to_string(),
            "--batch_size".to_string(), p.batch_size.to_string(),
            "--gpu".to_string(), p.gpu.to_string(),
            "--pitch_guidance".to_string(), flag(p.pitch_guidance),
            "--overtraining_detector".to_string(), flag(p.overtraining_detector),
            "--overtraining_threshold".to_string(), p.overtraining_threshold.to_string(),
            "--pretrained".to_string(), flag(p.pretrained),
            "--custom_pretrained".to_string(), flag(p.custom_pretrained),
            "--g_pretrained_path".to_string(), p.g_pretrained_path.display().to_string(),
            "--d_pretrained_path".to_string(), p.d_pretrained_path.display().to_string(),
        ]
    }

    fn check_pretrained(&self) -> Result<()> {
        if !(self.params.pretrained && self.params.custom_pretrained) {
            return Ok(());
        }
        for path in [&self.params.g_pretrained_path, &self.params.d_pretrained_path] {
            let resolved = match &self.working_dir {
                Some(dir) => dir.join(path),
                None => path.clone(),
            };
            if !resolved.exists() {
                return Err(anyhow::anyhow!("Pretrained weights not found: {}", resolved.display()));
            }
        }
        Ok(())
    }

    async fn run_step(&self, step: &str, args: Vec<String>) -> Result<()> {
        info!("Running training step '{}'", step);
        debug!("{} {:?} {:?}", self.program, self.base_args, args);

        let mut command = Command::new(&self.program);
        command.args(&self.base_args).args(&args).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to execute {}: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(anyhow::anyhow!(
                "Training step '{}' exited with {}: {}",
                step,
                output.status,
                tail
            ));
        }

        info!("Training step '{}' finished", step);
        Ok(())
    }
}

/// Finds the final weights and the feature index the framework left in `model_dir`.
/// Generator/discriminator checkpoints (`G_*.pth`, `D_*.pth`) are skipped and
/// an `added_*.index` is preferred over any other index.
pub fn locate_artifacts(model_dir: &Path) -> Result<TrainedModel> {
    let mut model: Option<(SystemTime, PathBuf)> = None;
    let mut index: Option<(bool, SystemTime, PathBuf)> = None;

    for entry in WalkDir::new(model_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("pth") if !name.starts_with("G_") && !name.starts_with("D_") => {
                if model.as_ref().map_or(true, |(time, _)| modified >= *time) {
                    model = Some((modified, path.to_path_buf()));
                }
            }
            Some("index") => {
                let added = name.starts_with("added");
                let newer = index.as_ref().map_or(true, |(was_added, time, _)| {
                    (added, modified) >= (*was_added, *time)
                });
                if newer {
                    index = Some((added, modified, path.to_path_buf()));
                }
            }
            _ => {}
        }
    }

    let model_path = model
        .map(|(_, path)| path)
        .ok_or_else(|| anyhow::anyhow!("No model weights found in {}", model_dir.display()))?;
    let index_path = index
        .map(|(_, _, path)| path)
        .ok_or_else(|| anyhow::anyhow!("No feature index found in {}", model_dir.display()))?;

    Ok(TrainedModel { model_path, index_path })
}

#[async_trait]
impl VoiceTrainer for ScriptTrainer {
    async fn train_voice(&self, voice_id: &str, audio_dir: &Path) -> Result<TrainedModel> {
        self.check_pretrained()?;

        self.run_step("preprocess", self.preprocess_args(voice_id, audio_dir)).await?;
        self.run_step("extract", self.extract_args(voice_id)).await?;
        self.run_step("train", self.train_args(voice_id)).await?;

        let model_dir = self.logs_dir.join(voice_id);
        let trained = tokio::task::spawn_blocking(move || locate_artifacts(&model_dir)).await??;
        info!(
            "Trained voice {}: model {}, index {}",
            voice_id,
            trained.model_path.display(),
            trained.index_path.display()
        );
        Ok(trained)
    }
}
