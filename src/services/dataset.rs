use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Downloads the ratings file from `url` unless it already exists at `path`
///
/// Returns `true` when a download happened. The body is written to a sibling
/// `.part` file and renamed into place, so an interrupted download never
/// leaves a truncated ratings file behind.
pub async fn ensure_ratings_file(url: &str, path: &Path) -> AppResult<bool> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|e| AppError::document(path, e.to_string()))?;
    if exists {
        tracing::debug!(path = %path.display(), "Ratings file present, skipping download");
        return Ok(false);
    }

    tracing::info!(url = %url, path = %path.display(), "Downloading ratings file");

    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(AppError::document(
            path,
            format!("download from {} failed with status {}", url, response.status()),
        ));
    }
    let body = response.bytes().await?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::document(path, e.to_string()))?;
    }

    let partial = partial_path(path);
    if let Err(e) = tokio::fs::write(&partial, &body).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(AppError::document(path, e.to_string()));
    }
    tokio::fs::rename(&partial, path)
        .await
        .map_err(|e| AppError::document(path, e.to_string()))?;

    tracing::info!(path = %path.display(), bytes = body.len(), "Ratings file downloaded");
    Ok(true)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
