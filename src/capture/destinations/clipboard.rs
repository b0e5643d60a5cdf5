//! Clipboard integration for copying captures.

use async_trait::async_trait;
use image::ImageFormat;
use std::process::{Command, Stdio};
use tokio::task;
use wl_clipboard_rs::copy::{MimeType, Options, Source};

use super::encode;
use crate::capture::{
    artifact::CaptureArtifact,
    dependencies::Destination,
    types::{CaptureError, ExportNotification},
};

pub const DESIGNATION: &str = "Clipboard";

/// Places the capture on the Wayland clipboard as PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipboardDestination;

#[async_trait]
impl Destination for ClipboardDestination {
    fn designation(&self) -> &str {
        DESIGNATION
    }

    async fn export(&self, artifact: &CaptureArtifact) -> ExportNotification {
        let data = match encode(artifact, ImageFormat::Png) {
            Ok(data) => data,
            Err(e) => return ExportNotification::failure(DESIGNATION, e.to_string()),
        };

        let copied = task::spawn_blocking(move || copy_to_clipboard(&data))
            .await
            .map_err(|e| CaptureError::ClipboardError(format!("Clipboard task failed: {}", e)))
            .and_then(|result| result);

        match copied {
            Ok(()) => ExportNotification::success(DESIGNATION, None),
            Err(e) => ExportNotification::failure(DESIGNATION, e.to_string()),
        }
    }
}

/// Copy PNG data to the Wayland clipboard.
///
/// Prefers the wl-copy command (it keeps serving the data after we exit) and
/// falls back to wl-clipboard-rs.
pub fn copy_to_clipboard(image_data: &[u8]) -> Result<(), CaptureError> {
    log::debug!(
        "Attempting to copy capture to clipboard ({} bytes)",
        image_data.len()
    );

    match copy_via_command(image_data) {
        Ok(()) => {
            log::info!("Successfully copied to clipboard via wl-copy command");
            Ok(())
        }
        Err(cmd_err) => {
            log::warn!(
                "wl-copy command path failed ({}). Falling back to wl-clipboard-rs",
                cmd_err
            );
            copy_via_library(image_data).map_err(|lib_err| {
                CaptureError::ClipboardError(format!(
                    "wl-copy failed: {} ; wl-clipboard-rs failed: {}",
                    cmd_err, lib_err
                ))
            })
        }
    }
}

fn copy_via_library(image_data: &[u8]) -> Result<(), CaptureError> {
    use wl_clipboard_rs::copy::ServeRequests;

    let mut opts = Options::new();
    // Serve one paste then exit
    opts.serve_requests(ServeRequests::Only(1));

    opts.copy(
        Source::Bytes(image_data.into()),
        MimeType::Specific("image/png".to_string()),
    )
    .map_err(|e| CaptureError::ClipboardError(format!("wl-clipboard-rs error: {}", e)))?;

    log::info!("Successfully copied to clipboard via wl-clipboard-rs fallback");
    Ok(())
}

fn copy_via_command(image_data: &[u8]) -> Result<(), CaptureError> {
    use std::io::Write;

    let mut child = Command::new("wl-copy")
        .arg("--type")
        .arg("image/png")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            CaptureError::ClipboardError(format!(
                "Failed to spawn wl-copy (is it installed?): {}",
                e
            ))
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(image_data).map_err(|e| {
            CaptureError::ClipboardError(format!("Failed to write to wl-copy stdin: {}", e))
        })?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| CaptureError::ClipboardError(format!("Failed to wait for wl-copy: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptureError::ClipboardError(format!(
            "wl-copy failed: {}",
            stderr.trim()
        )));
    }

    Ok(())
}
