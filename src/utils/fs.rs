use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;
use tracing::{info, warn};

/// Remove `dir` if it exists, then create it empty.
pub async fn reset_dir(dir: &Path) -> Result<()> {
    if fs::try_exists(dir).await? {
        fs::remove_dir_all(dir).await
            .map_err(|e| anyhow::anyhow!("Failed to clear {}: {}", dir.display(), e))?;
    }
    fs::create_dir_all(dir).await
        .map_err(|e| anyhow::anyhow!("Failed to create directory {}: {}", dir.display(), e))?;
    Ok(())
}

/// Copy `audio_path` into `to_dir` keeping its base name.
pub async fn copy_audio(audio_path: &Path, to_dir: &Path) -> Result<PathBuf> {
    let filename = audio_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid audio path: {}", audio_path.display()))?;
    let destination = to_dir.join(filename);

    fs::copy(audio_path, &destination).await
        .map_err(|e| anyhow::anyhow!("Failed to copy {} to {}: {}", audio_path.display(), destination.display(), e))?;

    Ok(destination)
}

/// Best effort removal of a file or directory, failures are only logged.
pub async fn remove_path_quietly(path: &Path) {
    let result = match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await,
        Err(_) => return,
    };

    match result {
        Ok(()) => info!("Removed {}", path.display()),
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
