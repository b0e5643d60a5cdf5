use async_trait::async_trait;
use tokio::task;

use super::run_command;
use crate::capture::{
    artifact::CaptureArtifact,
    dependencies::{Selection, SelectionSurface},
    types::{CaptureMode, Rect, WindowDescriptor},
};

/// Interactive selection through `slurp`.
///
/// Candidate windows are offered as predefined boxes; in window mode the user
/// can only pick one of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlurpSurface;

#[async_trait]
impl SelectionSurface for SlurpSurface {
    async fn present(
        &self,
        preview: &CaptureArtifact,
        windows: &[WindowDescriptor],
        mode: CaptureMode,
    ) -> Selection {
        let origin = preview.location;
        let boxes = window_boxes(windows);
        let restrict = mode == CaptureMode::Window;

        let output = task::spawn_blocking(move || {
            let mut args = vec!["-f", "%x,%y %wx%h"];
            if restrict {
                args.push("-r");
            }
            run_command("slurp", &args, Some(boxes.as_bytes()))
        })
        .await;

        let geometry = match output {
            Ok(Ok(stdout)) => String::from_utf8_lossy(&stdout).trim().to_string(),
            Ok(Err(e)) => {
                // slurp exits non-zero when the user presses Escape.
                log::info!("slurp selection ended: {}", e);
                return Selection::Cancelled;
            }
            Err(e) => {
                log::warn!("slurp task failed to join: {}", e);
                return Selection::Cancelled;
            }
        };

        let Some(rect) = parse_geometry(&geometry) else {
            log::warn!("Unexpected slurp output '{}'", geometry);
            return Selection::Cancelled;
        };

        let window = windows.iter().find(|w| w.bounds == rect).cloned();
        Selection::Confirmed {
            rect: rect.offset(-origin.x, -origin.y),
            window,
        }
    }
}

/// One `x,y wxh label` line per window, as slurp reads them from stdin.
fn window_boxes(windows: &[WindowDescriptor]) -> String {
    windows
        .iter()
        .map(|w| format!("{} {}\n", w.bounds, w.title.replace('\n', " ")))
        .collect()
}

/// Parses slurp's `x,y wxh` output into an absolute rectangle.
fn parse_geometry(geometry: &str) -> Option<Rect> {
    let (position, size) = geometry.split_once(' ')?;
    let (x, y) = position.split_once(',')?;
    let (width, height) = size.split_once('x')?;
    Some(Rect::new(
        x.trim().parse().ok()?,
        y.trim().parse().ok()?,
        width.trim().parse().ok()?,
        height.trim().parse().ok()?,
    ))
}
