use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::RgbaImage;
use tokio::task;
use wl_clipboard_rs::paste::{ClipboardType, MimeType, Seat, get_contents};

use super::decode_image;
use crate::capture::{dependencies::ImageImport, types::CaptureError};

/// Imports from the Wayland clipboard and from image files.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaylandImport;

#[async_trait]
impl ImageImport for WaylandImport {
    async fn clipboard_image(&self) -> Result<RgbaImage, CaptureError> {
        task::spawn_blocking(|| -> Result<RgbaImage, CaptureError> {
            let (mut pipe, mime) = get_contents(
                ClipboardType::Regular,
                Seat::Unspecified,
                MimeType::Specific("image/png"),
            )
            .map_err(|e| CaptureError::ClipboardError(format!("wl-clipboard-rs error: {}", e)))?;

            let mut bytes = Vec::new();
            pipe.read_to_end(&mut bytes).map_err(|e| {
                CaptureError::ClipboardError(format!("Failed to read clipboard: {}", e))
            })?;
            log::debug!("Read {} bytes of {} from the clipboard", bytes.len(), mime);
            decode_image(&bytes)
        })
        .await
        .map_err(|e| CaptureError::ClipboardError(format!("Clipboard task failed: {}", e)))?
    }

    async fn load_file(&self, path: &Path) -> Result<RgbaImage, CaptureError> {
        let path = resolve_path(path)?;
        task::spawn_blocking(move || -> Result<RgbaImage, CaptureError> {
            log::debug!("Loading image from {}", path.display());
            Ok(image::open(&path)?.to_rgba8())
        })
        .await
        .map_err(|e| CaptureError::ImageError(format!("Image load task failed: {}", e)))?
    }
}

/// Accepts plain paths and `file://` URLs (as dropped by file managers).
fn resolve_path(path: &Path) -> Result<PathBuf, CaptureError> {
    let text = path.to_string_lossy();
    if !text.starts_with("file://") {
        return Ok(path.to_path_buf());
    }
    url::Url::parse(&text)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| CaptureError::ImportUnavailable(format!("invalid file URL '{}'", text)))
}
