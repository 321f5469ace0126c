use super::*;
use crate::cover_gen::CoverGenClient;
use crate::schedule::callback::TaskEvent;
use crate::storage::artifact::{ArtifactUploader, UploadedArtifact};
use crate::storage::SqliteTaskStorage;
use crate::train::{TrainedModel, VoiceTrainer};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{Path as UrlPath, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

#[derive(Default)]
struct CompanionState {
    audios: Vec<String>,
    check_calls: AtomicUsize,
    inserted: Mutex<Vec<Value>>,
    separate_requests: Mutex<Vec<Value>>,
    callbacks: Mutex<Vec<Value>>,
    fail_separate: bool,
    fail_insert: bool,
}

async fn get_model(
    State(state): State<Arc<CompanionState>>,
    UrlPath(voice_id): UrlPath<String>,
) -> Json<Value> {
    state.check_calls.fetch_add(1, Ordering::SeqCst);
    if voice_id == "taken" {
        Json(json!({"data": {"voice_id": "taken", "s3_model_url": "https://bucket/taken.pth"}}))
    } else {
        Json(json!({"data": null}))
    }
}

async fn insert_model(State(state): State<Arc<CompanionState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    state.inserted.lock().unwrap().push(body.clone());
    if state.fail_insert {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "registry unavailable"})));
    }
    (StatusCode::OK, Json(json!({"data": body})))
}

async fn separate_audio(State(state): State<Arc<CompanionState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    state.separate_requests.lock().unwrap().push(body);
    if state.fail_separate {
        return (StatusCode::BAD_GATEWAY, Json(json!({"detail": "youtube download failed"})));
    }
    (StatusCode::OK, Json(json!({"data": state.audios})))
}

async fn callback(State(state): State<Arc<CompanionState>>, Json(body): Json<Value>) -> Json<Value> {
    state.callbacks.lock().unwrap().push(body);
    Json(json!({}))
}

async fn serve_companion(state: Arc<CompanionState>) -> String {
    let app = Router::new()
        .route("/model/:voice_id", get(get_model))
        .route("/model", post(insert_model))
        .route("/separate-audio", post(separate_audio))
        .route("/callback", post(callback))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[derive(Default)]
struct RecordingUploader {
    uploads: Mutex<Vec<(PathBuf, String, String)>>,
}

#[async_trait]
impl ArtifactUploader for RecordingUploader {
    async fn upload(&self, path: &Path, content_type: &str, key_prefix: &str) -> Result<UploadedArtifact> {
        assert!(path.exists(), "artifact must exist while uploading");
        self.uploads.lock().unwrap().push((path.to_path_buf(), content_type.to_string(), key_prefix.to_string()));
        let name = path.file_name().unwrap().to_string_lossy();
        Ok(UploadedArtifact { url: format!("https://bucket.example.com/{}/{}", key_prefix, name) })
    }
}

struct FakeTrainer {
    logs_dir: PathBuf,
    fail: bool,
    calls: AtomicUsize,
    dataset_files: Mutex<Vec<String>>,
}

impl FakeTrainer {
    fn new(logs_dir: PathBuf, fail: bool) -> Self {
        Self {
            logs_dir,
            fail,
            calls: AtomicUsize::new(0),
            dataset_files: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VoiceTrainer for FakeTrainer {
    async fn train_voice(&self, voice_id: &str, audio_dir: &Path) -> Result<TrainedModel> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut names: Vec<String> = std::fs::read_dir(audio_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        *self.dataset_files.lock().unwrap() = names;

        if self.fail {
            return Err(anyhow::anyhow!("CUDA out of memory"));
        }

        let model_dir = self.logs_dir.join(voice_id);
        std::fs::create_dir_all(&model_dir)?;
        let model_path = model_dir.join(format!("{}_50e_200s.pth", voice_id));
        let index_path = model_dir.join(format!("added_IVF64_Flat_nprobe_1_{}_v2.index", voice_id));
        std::fs::write(&model_path, b"weights")?;
        std::fs::write(&index_path, b"index")?;
        Ok(TrainedModel { model_path, index_path })
    }
}

struct TestEnv {
    task_manager: Arc<TaskManager>,
    worker: TaskWorker,
    companion: Arc<CompanionState>,
    companion_url: String,
    uploader: Arc<RecordingUploader>,
    trainer: Arc<FakeTrainer>,
    dataset_dir: PathBuf,
    logs_dir: PathBuf,
    _temp_dir: TempDir,
}

// 测试辅助函数：创建测试环境
async fn setup_test_environment(fail_training: bool) -> TestEnv {
    setup_test_environment_with(fail_training, |_| {}).await
}

async fn setup_test_environment_with(
    fail_training: bool,
    configure: impl FnOnce(&mut CompanionState),
) -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_path_buf();

    // separated audio as the companion service would leave it
    let separated = root.join("separated");
    std::fs::create_dir_all(&separated).unwrap();
    let mut audios = Vec::new();
    for name in ["a_vocals.wav", "b_vocals.wav"] {
        let path = separated.join(name);
        std::fs::write(&path, b"pcm").unwrap();
        audios.push(path.display().to_string());
    }

    let mut state = CompanionState { audios, ..Default::default() };
    configure(&mut state);
    let companion = Arc::new(state);
    let companion_url = serve_companion(companion.clone()).await;

    let url = format!("sqlite://{}", root.join("tasks.db").display());
    let storage: Arc<dyn TaskStorage> = Arc::new(SqliteTaskStorage::new(&url).await.unwrap());

    let dataset_dir = root.join("dataset");
    let logs_dir = root.join("logs");
    let uploader = Arc::new(RecordingUploader::default());
    let trainer = Arc::new(FakeTrainer::new(logs_dir.clone(), fail_training));

    let processor = AiCoverTrainProcessor::new(
        Arc::new(CoverGenClient::new(reqwest::Client::new(), companion_url.clone())),
        uploader.clone(),
        trainer.clone(),
        StatusReporter::new(storage.clone()),
        dataset_dir.clone(),
        logs_dir.clone(),
    );

    let mut task_manager = TaskManager::new(storage);
    task_manager.register_processor(Box::new(processor));
    let task_manager = Arc::new(task_manager);
    let worker = TaskWorker::new(task_manager.clone(), TaskType::AiCoverTrain);

    TestEnv {
        task_manager,
        worker,
        companion,
        companion_url,
        uploader,
        trainer,
        dataset_dir,
        logs_dir,
        _temp_dir: temp_dir,
    }
}

// 创建测试任务配置
fn create_test_task_config(voice_id: &str, callback_type: CallbackType) -> TaskConfig {
    TaskConfig {
        task_type: TaskType::AiCoverTrain,
        params: TaskParams::AiCoverTrain(AiCoverTrainParams {
            data: json!({"user_id": 42, "task": "ai_cover_train"}).to_string(),
            task_request: json!({
                "voice_id": voice_id,
                "youtube_link": ["https://www.youtube.com/watch?v=h6RONxjPBf4"]
            })
            .to_string(),
            file: json!([
                {"content_type": "audio/mpeg", "filename": "a.mp3"},
                {"content_type": "audio/wav", "filename": "b.wav"}
            ])
            .to_string(),
        }),
        callback_type,
        priority: TaskPriority::Normal,
        timeout: None,
    }
}

#[tokio::test]
async fn test_complete_task_lifecycle() -> Result<()> {
    let env = setup_test_environment(false).await;
    let mut events = env.task_manager.subscribe();

    let task = env
        .task_manager
        .create_task(create_test_task_config("voice-1", CallbackType::Event), Some("task-1".to_string()))
        .await?;
    assert_eq!(task.status, TaskStatus::Pending);

    assert!(env.worker.process_next_task().await?);

    let task = env.task_manager.get_task("task-1").await?.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result, Some(TaskResult::AiCoverTrain(TrainResponse::success())));
    assert_eq!(task.data.unwrap()["user_id"], 42);
    assert!(task.error.is_none());

    // audio request carries the file names and links
    let separate = env.companion.separate_requests.lock().unwrap().clone();
    assert_eq!(separate[0]["files"], json!(["a.mp3", "b.wav"]));
    assert_eq!(separate[0]["youtube_link"][0], "https://www.youtube.com/watch?v=h6RONxjPBf4");

    // the trainer saw the staged dataset
    assert_eq!(
        *env.trainer.dataset_files.lock().unwrap(),
        vec!["a_vocals.wav".to_string(), "b_vocals.wav".to_string()]
    );

    let uploads = env.uploader.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 2);
    assert!(uploads[0].0.extension().unwrap() == "pth");
    assert!(uploads[1].0.extension().unwrap() == "index");
    for (_, content_type, prefix) in &uploads {
        assert_eq!(content_type, "application/octet-stream");
        assert_eq!(prefix, "ai_model/ai-cover/rvc_pretrained/voice-1");
    }

    let inserted = env.companion.inserted.lock().unwrap().clone();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0]["voice_id"], "voice-1");
    assert!(inserted[0]["s3_model_url"].as_str().unwrap().ends_with("voice-1_50e_200s.pth"));
    assert!(inserted[0]["s3_index_url"].as_str().unwrap().ends_with(".index"));

    // intermediate files are gone
    assert!(!env.dataset_dir.join("voice-1").exists());
    assert!(!env.logs_dir.join("voice-1").exists());

    match events.recv().await? {
        TaskEvent::Completed { task_id, .. } => assert_eq!(task_id, "task-1"),
        other => panic!("unexpected event: {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_existing_model_fails_with_400() -> Result<()> {
    let env = setup_test_environment(false).await;
    env.task_manager
        .create_task(create_test_task_config("taken", CallbackType::None), Some("task-taken".to_string()))
        .await?;

    assert!(env.worker.process_next_task().await?);

    let task = env.task_manager.get_task("task-taken").await?.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.unwrap();
    assert_eq!(error.code, "400");
    assert_eq!(error.message, "Model voice 'taken' is already existed.");

    assert_eq!(env.trainer.calls.load(Ordering::SeqCst), 0);
    assert!(env.companion.separate_requests.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_training_error_fails_with_500() -> Result<()> {
    let env = setup_test_environment(true).await;
    let mut events = env.task_manager.subscribe();
    env.task_manager
        .create_task(create_test_task_config("voice-2", CallbackType::Event), Some("task-2".to_string()))
        .await?;

    assert!(env.worker.process_next_task().await?);

    let task = env.task_manager.get_task("task-2").await?.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.unwrap();
    assert_eq!(error.code, "500");
    assert_eq!(error.message, "Internal Server Error");

    assert_eq!(env.trainer.calls.load(Ordering::SeqCst), 1);
    assert!(env.uploader.uploads.lock().unwrap().is_empty());
    assert!(env.companion.inserted.lock().unwrap().is_empty());

    match events.recv().await? {
        TaskEvent::Failed { task_id, error } => {
            assert_eq!(task_id, "task-2");
            assert_eq!(error.code, "500");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_removed_task_is_skipped() -> Result<()> {
    let env = setup_test_environment(false).await;
    env.task_manager
        .create_task(create_test_task_config("voice-3", CallbackType::None), Some("task-3".to_string()))
        .await?;

    let task = env.task_manager.get_next_task(&TaskType::AiCoverTrain).await?.unwrap();
    assert!(env.task_manager.remove_task("task-3").await?);

    env.task_manager.process_task(&task).await?;

    let status = env.task_manager.get_task_status("task-3").await?;
    assert_eq!(status, Some(TaskStatus::Removed));
    assert_eq!(env.companion.check_calls.load(Ordering::SeqCst), 0);
    assert_eq!(env.trainer.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_finished_task_cannot_be_removed() -> Result<()> {
    let env = setup_test_environment(false).await;
    env.task_manager
        .create_task(create_test_task_config("voice-4", CallbackType::None), Some("task-4".to_string()))
        .await?;
    env.worker.process_next_task().await?;

    assert!(!env.task_manager.remove_task("task-4").await?);
    assert!(env.task_manager.remove_task("missing").await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_http_callback_receives_result() -> Result<()> {
    let env = setup_test_environment(false).await;
    let callback_type = CallbackType::Http { url: format!("{}/callback", env.companion_url) };
    env.task_manager
        .create_task(create_test_task_config("voice-5", callback_type), Some("task-5".to_string()))
        .await?;

    env.worker.process_next_task().await?;

    let callbacks = env.companion.callbacks.lock().unwrap().clone();
    assert_eq!(callbacks.len(), 1);
    assert_eq!(callbacks[0]["task_id"], "task-5");
    assert_eq!(callbacks[0]["status"], "Completed");
    assert_eq!(callbacks[0]["data"]["result"]["status"], "Train model successfully.");
    Ok(())
}

#[tokio::test]
async fn test_invalid_params_rejected_at_enqueue() -> Result<()> {
    let env = setup_test_environment(false).await;

    let mut config = create_test_task_config("voice-6", CallbackType::None);
    config.params = TaskParams::AiCoverTrain(AiCoverTrainParams {
        data: "{}".to_string(),
        task_request: "{not json".to_string(),
        file: "[]".to_string(),
    });
    assert!(env.task_manager.create_task(config, None).await.is_err());

    let config = create_test_task_config("", CallbackType::None);
    assert!(env.task_manager.create_task(config, None).await.is_err());

    env.task_manager
        .create_task(create_test_task_config("voice-6", CallbackType::None), Some("dup".to_string()))
        .await?;
    let duplicate = env
        .task_manager
        .create_task(create_test_task_config("voice-7", CallbackType::None), Some("dup".to_string()))
        .await;
    assert!(duplicate.is_err());
    Ok(())
}

#[tokio::test]
async fn test_empty_queue() -> Result<()> {
    let env = setup_test_environment(false).await;
    assert!(!env.worker.process_next_task().await?);

    let stats = env.task_manager.get_task_stats(&Default::default()).await?;
    assert_eq!(stats.pending, 0);
    Ok(())
}

#[tokio::test]
async fn test_task_stats() -> Result<()> {
    let env = setup_test_environment(false).await;
    env.task_manager
        .create_task(create_test_task_config("taken", CallbackType::None), None)
        .await?;
    env.task_manager
        .create_task(create_test_task_config("voice-8", CallbackType::None), None)
        .await?;
    env.worker.process_next_task().await?;

    let stats = env.task_manager.get_task_stats(&Default::default()).await?;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 1);
    Ok(())
}

#[tokio::test]
async fn test_timed_out_task_is_marked() -> Result<()> {
    let env = setup_test_environment(false).await;
    let mut config = create_test_task_config("voice-9", CallbackType::None);
    config.timeout = Some(0);
    env.task_manager.create_task(config, Some("task-9".to_string())).await?;

    // claimed, then swept before the body runs
    let task = env.task_manager.get_next_task(&TaskType::AiCoverTrain).await?.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    env.task_manager.handle_timed_out_tasks().await?;
    assert_eq!(env.task_manager.get_task_status("task-9").await?, Some(TaskStatus::TimedOut));

    env.task_manager.process_task(&task).await?;
    assert_eq!(env.task_manager.get_task_status("task-9").await?, Some(TaskStatus::TimedOut));
    assert_eq!(env.trainer.calls.load(Ordering::SeqCst), 0);
    assert!(!env.task_manager.remove_task("task-9").await?);
    Ok(())
}

#[tokio::test]
async fn test_cleanup_keeps_unfinished_tasks() -> Result<()> {
    let env = setup_test_environment(false).await;
    env.task_manager
        .create_task(create_test_task_config("voice-10", CallbackType::None), Some("done".to_string()))
        .await?;
    env.worker.process_next_task().await?;
    env.task_manager
        .create_task(create_test_task_config("voice-11", CallbackType::None), Some("queued".to_string()))
        .await?;

    assert_eq!(env.task_manager.cleanup_tasks(30).await?, 0);
    assert_eq!(env.task_manager.cleanup_tasks(-1).await?, 1);

    assert!(env.task_manager.get_task("done").await?.is_none());
    assert!(env.task_manager.get_task("queued").await?.is_some());
    Ok(())
}

async fn assert_internal_failure(env: &TestEnv, task_id: &str) -> Result<()> {
    let task = env.task_manager.get_task(task_id).await?.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.unwrap();
    assert_eq!(error.code, "500");
    assert_eq!(error.message, "Internal Server Error");
    Ok(())
}

#[tokio::test]
async fn test_empty_separation_fails_with_500() -> Result<()> {
    let env = setup_test_environment_with(false, |state| state.audios.clear()).await;
    env.task_manager
        .create_task(create_test_task_config("voice-12", CallbackType::None), Some("task-12".to_string()))
        .await?;

    env.worker.process_next_task().await?;

    assert_internal_failure(&env, "task-12").await?;
    assert_eq!(env.companion.separate_requests.lock().unwrap().len(), 1);
    assert_eq!(env.trainer.calls.load(Ordering::SeqCst), 0);
    assert!(!env.dataset_dir.join("voice-12").exists());
    Ok(())
}

#[tokio::test]
async fn test_separation_error_fails_with_500() -> Result<()> {
    let env = setup_test_environment_with(false, |state| state.fail_separate = true).await;
    env.task_manager
        .create_task(create_test_task_config("voice-13", CallbackType::None), Some("task-13".to_string()))
        .await?;

    env.worker.process_next_task().await?;

    assert_internal_failure(&env, "task-13").await?;
    assert_eq!(env.trainer.calls.load(Ordering::SeqCst), 0);
    assert!(env.uploader.uploads.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_register_error_fails_without_cleanup() -> Result<()> {
    let env = setup_test_environment_with(false, |state| state.fail_insert = true).await;
    env.task_manager
        .create_task(create_test_task_config("voice-14", CallbackType::None), Some("task-14".to_string()))
        .await?;

    env.worker.process_next_task().await?;

    assert_internal_failure(&env, "task-14").await?;
    assert_eq!(env.uploader.uploads.lock().unwrap().len(), 2);
    assert_eq!(env.companion.inserted.lock().unwrap().len(), 1);

    // artifacts stay on disk when the job fails before cleanup
    assert!(env.dataset_dir.join("voice-14").exists());
    assert!(env.logs_dir.join("voice-14").join("voice-14_50e_200s.pth").exists());
    Ok(())
}
