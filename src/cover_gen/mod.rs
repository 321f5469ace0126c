//! Client for the AI Cover Gen companion API, which owns the voice model
//! registry and the audio download/separation service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::schedule::error::TrainError;

#[async_trait]
pub trait CoverGenApi: Send + Sync {
    /// Fails with `TrainError::Validation` when a model is already registered.
    async fn check_model(&self, voice_id: &str) -> Result<(), TrainError>;
    async fn insert_model(&self, voice_id: &str, s3_model_url: &str, s3_index_url: &str) -> Result<(), TrainError>;
    /// Downloads the links, separates vocals, returns local audio paths.
    async fn separate_audio(&self, files: &[String], youtube_link: &[String]) -> Result<Vec<String>, TrainError>;
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct InsertModelRequest<'a> {
    voice_id: &'a str,
    s3_model_url: &'a str,
    s3_index_url: &'a str,
}

#[derive(Debug, Serialize)]
struct SeparateAudioRequest<'a> {
    files: &'a [String],
    youtube_link: &'a [String],
}

pub struct CoverGenClient {
    client: reqwest::Client,
    domain: String,
    // registry lookups only; audio separation runs as long as it needs
    registry_timeout: Option<Duration>,
}

impl CoverGenClient {
    pub fn new(client: reqwest::Client, domain: impl Into<String>) -> Self {
        Self {
            client,
            domain: domain.into().trim_end_matches('/').to_string(),
            registry_timeout: None,
        }
    }

    pub fn with_registry_timeout(mut self, timeout: Duration) -> Self {
        self.registry_timeout = Some(timeout);
        self
    }

    fn registry_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.registry_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    fn connect_error(step: &str, message: impl std::fmt::Display) -> TrainError {
        TrainError::internal(format!(
            "Can't connect with API app of ai-cover-gen. Step: '{}', Message: {}",
            step, message
        ))
    }

    async fn read_body(response: reqwest::Response) -> String {
        response.text().await.unwrap_or_default()
    }
}

#[async_trait]
impl CoverGenApi for CoverGenClient {
    async fn check_model(&self, voice_id: &str) -> Result<(), TrainError> {
        const STEP: &str = "check_model_follow_voice_id";
        let url = format!("{}/model/{}", self.domain, voice_id);
        debug!("GET {}", url);

        let response = self.registry_request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Self::connect_error(STEP, e))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Self::connect_error(STEP, Self::read_body(response).await));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| Self::connect_error(STEP, e))?;

        // only an explicit null means the voice is free
        match body.get("data") {
            None => Err(Self::connect_error(STEP, format!("missing 'data' in {}", body))),
            Some(Value::Null) => Ok(()),
            Some(_) => Err(TrainError::Validation(format!(
                "Model voice '{}' is already existed.",
                voice_id
            ))),
        }
    }

    async fn insert_model(&self, voice_id: &str, s3_model_url: &str, s3_index_url: &str) -> Result<(), TrainError> {
        const STEP: &str = "insert_model_follow_voice_id";
        let url = format!("{}/model", self.domain);
        let body = InsertModelRequest { voice_id, s3_model_url, s3_index_url };

        let response = self.registry_request(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| Self::connect_error(STEP, e))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Self::connect_error(STEP, Self::read_body(response).await));
        }

        info!("Registered model for voice {}", voice_id);
        Ok(())
    }

    async fn separate_audio(&self, files: &[String], youtube_link: &[String]) -> Result<Vec<String>, TrainError> {
        const STEP: &str = "process_audio";
        let url = format!("{}/separate-audio", self.domain);
        let body = SeparateAudioRequest { files, youtube_link };

        let response = self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::connect_error(STEP, e))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Self::connect_error(STEP, Self::read_body(response).await));
        }

        let body = response
            .json::<DataResponse<Vec<String>>>()
            .await
            .map_err(|e| Self::connect_error(STEP, e))?;

        info!("Separated {} audio files", body.data.len());
        Ok(body.data)
    }
}
