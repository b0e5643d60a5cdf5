//! Saving captures to disk.

use async_trait::async_trait;
use chrono::Local;
use image::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task;

use super::encode;
use crate::capture::{
    artifact::CaptureArtifact,
    dependencies::Destination,
    types::{CaptureError, ExportNotification},
};
use crate::config::FileConfig;

pub const DESIGNATION: &str = "File";

/// Writes the capture to a timestamped file.
#[derive(Debug, Clone)]
pub struct FileDestination {
    /// Directory to save captures to.
    pub save_directory: PathBuf,
    /// Filename template (supports chrono format specifiers).
    pub filename_template: String,
    /// Image format extension.
    pub format: String,
}

impl FileDestination {
    pub fn from_config(config: &FileConfig) -> Self {
        Self {
            save_directory: expand_tilde(&config.save_directory),
            filename_template: config.filename_template.clone(),
            format: config.format.clone(),
        }
    }

    /// Encodes and writes `artifact`, returning the path it was stored at.
    pub fn save(&self, artifact: &CaptureArtifact) -> Result<PathBuf, CaptureError> {
        let format = ImageFormat::from_extension(&self.format).ok_or_else(|| {
            CaptureError::ImageError(format!("unsupported image format '{}'", self.format))
        })?;
        let data = encode(artifact, format)?;

        let directory = ensure_directory_exists(&self.save_directory)?;
        let filename = generate_filename(&self.filename_template, &self.format);
        let file_path = directory.join(&filename);

        log::info!(
            "Saving capture to: {} ({} bytes)",
            file_path.display(),
            data.len()
        );
        fs::write(&file_path, &data)?;

        // User read/write only.
        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&file_path, Permissions::from_mode(0o600))?;
        }

        Ok(file_path)
    }
}

#[async_trait]
impl Destination for FileDestination {
    fn designation(&self) -> &str {
        DESIGNATION
    }

    async fn export(&self, artifact: &CaptureArtifact) -> ExportNotification {
        let destination = self.clone();
        let artifact = artifact.clone();
        let saved = task::spawn_blocking(move || destination.save(&artifact))
            .await
            .map_err(|e| CaptureError::ImageError(format!("Save task failed: {}", e)))
            .and_then(|result| result);

        match saved {
            Ok(path) => ExportNotification::success(
                DESIGNATION,
                Some(format!("stored_at {}", path.display())),
            ),
            Err(e) => ExportNotification::failure(DESIGNATION, e.to_string()),
        }
    }
}

/// Generate a filename based on the template and current time.
pub fn generate_filename(template: &str, format: &str) -> String {
    let now = Local::now();
    let filename = now.format(template).to_string();
    format!("{}.{}", filename, format)
}

/// Ensure the save directory exists, creating it if necessary.
pub fn ensure_directory_exists(directory: &Path) -> Result<PathBuf, CaptureError> {
    if !directory.exists() {
        log::info!("Creating capture directory: {}", directory.display());
        fs::create_dir_all(directory)?;
    }

    Ok(directory
        .canonicalize()
        .unwrap_or_else(|_| directory.to_path_buf()))
}

/// Expand tilde (~) in path strings.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}
