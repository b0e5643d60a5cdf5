use async_trait::async_trait;
use tokio::task;

use super::run_command;
use crate::capture::{
    dependencies::CaptureFeedback,
    types::{CaptureError, Rect},
};

/// Shutter sound through libcanberra's command line player.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandFeedback;

#[async_trait]
impl CaptureFeedback for CommandFeedback {
    async fn play_sound(&self) -> Result<(), CaptureError> {
        task::spawn_blocking(|| {
            run_command(
                "canberra-gtk-play",
                &["-i", "camera-shutter", "-d", "lensgrab"],
                None,
            )
        })
        .await
        .map_err(|e| CaptureError::AcquisitionFailure(format!("Sound task failed: {}", e)))??;
        Ok(())
    }

    async fn flash(&self, bounds: Rect) -> Result<(), CaptureError> {
        log::debug!("No flash overlay on this backend, skipping flash of {}", bounds);
        Ok(())
    }
}
