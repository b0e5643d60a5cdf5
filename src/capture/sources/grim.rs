use async_trait::async_trait;
use image::{
    RgbaImage,
    imageops::{self, FilterType},
};
use tokio::task;

use super::{decode_image, hyprland, run_command};
use crate::capture::{
    dependencies::PixelSource,
    types::{CaptureError, CursorOverlay, Rect, WindowDescriptor},
};

/// Pixel copies through `grim` (wlr-screencopy).
#[derive(Debug, Clone, Copy, Default)]
pub struct GrimPixelSource;

/// Output scale passed to grim. Buffers stay in logical pixels so that crops,
/// cursor positions and remembered regions share one coordinate space.
const OUTPUT_SCALE: &str = "1";

fn grim_args(geometry: &str) -> [&str; 5] {
    ["-s", OUTPUT_SCALE, "-g", geometry, "-"]
}

/// Resamples a buffer whose size differs from the logical `rect` it was taken from.
fn fit_to_rect(image: RgbaImage, rect: Rect) -> RgbaImage {
    let (width, height) = (rect.width.max(1) as u32, rect.height.max(1) as u32);
    if image.dimensions() == (width, height) {
        return image;
    }
    log::debug!(
        "grim returned {}x{} for {}, scaling to logical size",
        image.width(),
        image.height(),
        rect
    );
    imageops::resize(&image, width, height, FilterType::Triangle)
}

impl GrimPixelSource {
    async fn grab(rect: Rect) -> Result<RgbaImage, CaptureError> {
        task::spawn_blocking(move || -> Result<RgbaImage, CaptureError> {
            let geometry = rect.to_string();
            log::debug!("Capturing region via grim: {}", geometry);
            let png = run_command("grim", &grim_args(&geometry), None)?;
            decode_image(&png).map(|image| fit_to_rect(image, rect))
        })
        .await
        .map_err(|e| CaptureError::AcquisitionFailure(format!("grim task failed to join: {}", e)))?
    }
}

#[async_trait]
impl PixelSource for GrimPixelSource {
    async fn capture_screen_region(&self, rect: Rect) -> Option<RgbaImage> {
        match Self::grab(rect).await {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Screen capture of {} failed: {}", rect, e);
                None
            }
        }
    }

    async fn capture_window_via_gdi(&self, _window: &WindowDescriptor) -> Option<RgbaImage> {
        None
    }

    async fn capture_window_via_compositor(
        &self,
        window: &WindowDescriptor,
        transparent: bool,
    ) -> Option<RgbaImage> {
        if transparent {
            log::debug!("grim copies opaque output, ignoring transparency request");
        }
        match Self::grab(window.bounds).await {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Compositor capture of '{}' failed: {}", window.title, e);
                None
            }
        }
    }

    async fn capture_cursor(&self) -> Option<CursorOverlay> {
        let position = task::spawn_blocking(hyprland::cursor_position)
            .await
            .ok()
            .flatten()?;
        // grim draws no pointer; only the position is known here.
        Some(CursorOverlay {
            position,
            visible: true,
            image: None,
        })
    }
}
