use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::{
    Json,
    extract::{Path as UrlPath, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::info;

use fontid_types::api::RecordingEntry;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extensions accepted as recordings, lowercase.
pub const ALLOWED_EXTENSIONS: &[&str] = &["webm", "mp4", "avi", "mov", "png", "jpg", "jpeg"];

/// A flat directory of saved recordings.
#[derive(Debug, Clone)]
pub struct RecordingLibrary {
    dir: PathBuf,
}

impl RecordingLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Map a client-supplied name onto a file inside the library.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ApiError> {
        if !is_valid_name(name) {
            return Err(ApiError::BadRequest(format!("Invalid recording name: {}", name)));
        }
        Ok(self.dir.join(name))
    }

    /// Recordings sorted by name, limited to names [`Self::resolve`] accepts.
    /// A missing directory is an empty library.
    pub async fn list(&self) -> std::io::Result<Vec<RecordingEntry>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut recordings = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if is_valid_name(&name) {
                recordings.push(RecordingEntry {
                    name,
                    size: metadata.len(),
                });
            }
        }

        recordings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(recordings)
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>, ApiError> {
        let path = self.resolve(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| not_found_or_internal(name, e))
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_internal(name, e))?;
        info!("Deleted recording {}", name);
        Ok(())
    }
}

fn not_found_or_internal(name: &str, e: std::io::Error) -> ApiError {
    if e.kind() == ErrorKind::NotFound {
        ApiError::NotFound(format!("No recording named {}", name))
    } else {
        ApiError::internal("Recording access failed", e)
    }
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn has_allowed_extension(name: &str) -> bool {
    extension(name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// A bare file name that is also safe inside a quoted
/// `Content-Disposition` filename.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name
            .chars()
            .any(|c| c.is_control() || matches!(c, '/' | '\\' | '"' | ';'))
        && has_allowed_extension(name)
}

fn content_type(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("webm") => "video/webm",
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

pub async fn list_recordings(
    State(state): State<AppState>,
) -> Result<Json<Vec<RecordingEntry>>, ApiError> {
    let recordings = state
        .recordings
        .list()
        .await
        .map_err(|e| ApiError::internal("Listing recordings failed", e))?;
    Ok(Json(recordings))
}

pub async fn download_recording(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.recordings.read(&name).await?;
    let disposition = format!("attachment; filename=\"{}\"", name);

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&name).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

pub async fn delete_recording(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> Result<StatusCode, ApiError> {
    state.recordings.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
