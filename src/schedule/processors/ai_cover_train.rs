use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use anyhow::Result;
use tracing::info;

use crate::cover_gen::CoverGenApi;
use crate::schedule::error::TrainError;
use crate::schedule::status::StatusReporter;
use crate::schedule::types::{
    AiCoverTrainParams, Task, TaskParams, TaskResult, TaskType, TrainRequest, TrainResponse,
};
use crate::storage::artifact::ArtifactUploader;
use crate::train::VoiceTrainer;
use crate::utils::fs::{copy_audio, remove_path_quietly, reset_dir};
use super::TaskProcessor;

const ARTIFACT_CONTENT_TYPE: &str = "application/octet-stream";

/// Trains an RVC voice model from YouTube links and uploaded files, then
/// publishes it to the AI Cover Gen model registry.
pub struct AiCoverTrainProcessor {
    cover_gen: Arc<dyn CoverGenApi>,
    uploader: Arc<dyn ArtifactUploader>,
    trainer: Arc<dyn VoiceTrainer>,
    status: StatusReporter,
    dataset_dir: PathBuf,
    train_logs_dir: PathBuf,
}

impl AiCoverTrainProcessor {
    pub fn new(
        cover_gen: Arc<dyn CoverGenApi>,
        uploader: Arc<dyn ArtifactUploader>,
        trainer: Arc<dyn VoiceTrainer>,
        status: StatusReporter,
        dataset_dir: PathBuf,
        train_logs_dir: PathBuf,
    ) -> Self {
        Self {
            cover_gen,
            uploader,
            trainer,
            status,
            dataset_dir,
            train_logs_dir,
        }
    }

    fn params(task: &Task) -> &AiCoverTrainParams {
        match &task.config.params {
            TaskParams::AiCoverTrain(p) => p,
        }
    }

    /// Voice ids end up in local paths and storage keys.
    fn voice_id(request: &TrainRequest) -> Result<String, TrainError> {
        let voice_id = request
            .voice_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| TrainError::Validation("Field 'voice_id' is required.".to_string()))?;

        if voice_id == "."
            || voice_id == ".."
            || voice_id.contains(['/', '\\'])
            || voice_id.trim() != voice_id
        {
            return Err(TrainError::Validation(format!("Invalid voice_id '{}'.", voice_id)));
        }
        Ok(voice_id.to_string())
    }

    /// Copies the separated audio into a fresh `<dataset_dir>/<voice_id>`.
    async fn prepare_dataset(&self, voice_id: &str, audios: &[String]) -> Result<PathBuf, TrainError> {
        if audios.is_empty() {
            return Err(TrainError::internal(format!(
                "No audio returned for voice {}. Step: 'process_audio'",
                voice_id
            )));
        }

        let dataset_path = self.dataset_dir.join(voice_id);
        reset_dir(&dataset_path).await?;

        for audio in audios {
            let copied = copy_audio(Path::new(audio), &dataset_path).await?;
            info!("Copied {} to {}", audio, copied.display());
        }

        Ok(dataset_path)
    }

    async fn cleanup(&self, voice_id: &str, model_path: &Path, dataset_path: &Path) {
        remove_path_quietly(model_path).await;
        remove_path_quietly(dataset_path).await;
        remove_path_quietly(&self.train_logs_dir.join(voice_id)).await;
    }

    async fn train(&self, task: &Task, params: &AiCoverTrainParams) -> Result<TrainResponse, TrainError> {
        let data = params.decode_data()?;
        let request = params.decode_request()?;
        let files = params.decode_files()?;
        self.status.started(&task.id, &data).await?;

        self.status.check_task_removed(&task.id).await?;

        let voice_id = Self::voice_id(&request)?;
        let filenames: Vec<String> = files.into_iter().map(|f| f.filename).collect();

        info!("============= Check model existed: Processing ===================");
        self.cover_gen.check_model(&voice_id).await?;

        info!("============= Process audio: Processing ===================");
        let audios = self.cover_gen.separate_audio(&filenames, &request.youtube_link).await?;
        let dataset_path = self.prepare_dataset(&voice_id, &audios).await?;

        info!(
            "============= Training voice {}-{}: Processing ===================",
            voice_id,
            dataset_path.display()
        );
        let trained = self
            .trainer
            .train_voice(&voice_id, &dataset_path)
            .await
            .map_err(|e| {
                TrainError::internal(format!(
                    "Can't train {} model. Step: 'train_voice', Message: \n{:#}",
                    voice_id, e
                ))
            })?;

        info!("============= Uploading model to s3: Processing ===================");
        let key_prefix = format!("ai_model/ai-cover/rvc_pretrained/{}", voice_id);
        let model = self.uploader.upload(&trained.model_path, ARTIFACT_CONTENT_TYPE, &key_prefix).await?;
        let index = self.uploader.upload(&trained.index_path, ARTIFACT_CONTENT_TYPE, &key_prefix).await?;
        info!("Uploaded model {} and index {}", model.url, index.url);

        info!("============= Insert model into AI Cover Gen: Processing ===================");
        self.cover_gen.insert_model(&voice_id, &model.url, &index.url).await?;

        self.cleanup(&voice_id, &trained.model_path, &dataset_path).await;

        Ok(TrainResponse::success())
    }
}

#[async_trait]
impl TaskProcessor for AiCoverTrainProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::AiCoverTrain
    }

    async fn process(&self, task: &Task) -> Result<TaskResult, TrainError> {
        info!("============= AI Cover Train task {}: Started ===================", task.id);
        let params = Self::params(task);
        let response = self.train(task, params).await?;
        info!("============= AI Cover Train task {}: Finished ===================", task.id);
        Ok(TaskResult::AiCoverTrain(response))
    }

    fn validate_params(&self, params: &TaskParams) -> Result<()> {
        match params {
            TaskParams::AiCoverTrain(p) => {
                p.decode_data()
                    .map_err(|e| anyhow::anyhow!("Invalid 'data': {}", e))?;
                let request = p
                    .decode_request()
                    .map_err(|e| anyhow::anyhow!("Invalid 'task_request': {}", e))?;
                p.decode_files()
                    .map_err(|e| anyhow::anyhow!("Invalid 'file': {}", e))?;
                Self::voice_id(&request)?;
                Ok(())
            }
        }
    }
}
