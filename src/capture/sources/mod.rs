//! Desktop backends for Hyprland/wlroots sessions.

use std::io::Write;
use std::process::{Command, Stdio};

use image::RgbaImage;

use crate::capture::types::CaptureError;

mod feedback;
mod grim;
mod hyprland;
mod import;
mod slurp;

pub use feedback::CommandFeedback;
pub use grim::GrimPixelSource;
pub use hyprland::HyprlandCatalog;
pub use import::WaylandImport;
pub use slurp::SlurpSurface;

/// Runs `program` to completion and returns its stdout.
pub(crate) fn run_command(
    program: &str,
    args: &[&str],
    stdin: Option<&[u8]>,
) -> Result<Vec<u8>, CaptureError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            CaptureError::AcquisitionFailure(format!(
                "Failed to run {} (is it installed?): {}",
                program, e
            ))
        })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input).map_err(|e| {
            CaptureError::AcquisitionFailure(format!("Failed to write to {} stdin: {}", program, e))
        })?;
    }

    let output = child.wait_with_output().map_err(|e| {
        CaptureError::AcquisitionFailure(format!("Failed to wait for {}: {}", program, e))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptureError::AcquisitionFailure(format!(
            "{} failed: {}",
            program,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Decodes an encoded image (PNG from grim or the clipboard) into RGBA pixels.
pub(crate) fn decode_image(bytes: &[u8]) -> Result<RgbaImage, CaptureError> {
    if bytes.is_empty() {
        return Err(CaptureError::ImageError("empty image data".into()));
    }
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}
