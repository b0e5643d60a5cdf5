//! Interactive refinement: the user picks a region or window on a frozen preview.
//!
//! Windows are enumerated in the background as soon as the run starts, because
//! some of them (menus, launchers) close once the selection surface takes focus.

use std::sync::Arc;

use tokio::task::{self, JoinHandle};

use crate::capture::{
    artifact::CaptureArtifact,
    cancel::CancelSignal,
    dependencies::{Selection, SelectionSurface, WindowCatalog},
    types::{CaptureError, CaptureMode, Rect, WindowDescriptor},
};

/// Child levels resolved per window by default.
pub const DEFAULT_CHILD_DEPTH: usize = 3;
/// Child levels resolved when all child locations are requested.
pub const ALL_CHILDREN_DEPTH: usize = 20;

/// Collects the windows the selection surface can snap to.
pub fn enumerate_windows(catalog: &dyn WindowCatalog, child_depth: usize) -> Vec<WindowDescriptor> {
    let mut windows = Vec::new();
    if let Some(launcher) = catalog.app_launcher()
        && launcher.visible
    {
        windows.push(launcher);
    }
    windows.extend(
        catalog
            .list_visible_windows(child_depth)
            .into_iter()
            .filter(|w| w.visible && !w.bounds.is_empty()),
    );
    windows
}

/// Background window enumeration started before the delay and acquisition.
pub struct WindowEnumeration {
    handle: JoinHandle<Vec<WindowDescriptor>>,
}

impl WindowEnumeration {
    pub fn spawn(catalog: Arc<dyn WindowCatalog>, child_depth: usize) -> Self {
        log::debug!("Starting window enumeration (child depth {})", child_depth);
        let handle = task::spawn_blocking(move || enumerate_windows(catalog.as_ref(), child_depth));
        Self { handle }
    }

    /// Waits for the enumeration; a failed task yields no windows.
    pub async fn wait(self, cancel: &CancelSignal) -> Result<Vec<WindowDescriptor>, CaptureError> {
        match cancel.guard("window enumeration", self.handle).await? {
            Ok(windows) => {
                log::debug!("Window enumeration found {} windows", windows.len());
                Ok(windows)
            }
            Err(e) => {
                log::warn!("Window enumeration task failed: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Lets a run that no longer needs the result finish cleanly.
    pub async fn settle(self) {
        if let Err(e) = self.handle.await {
            log::debug!("Discarded window enumeration failed: {}", e);
        }
    }

    pub fn abort(self) {
        self.handle.abort();
    }
}

/// Outcome of the interactive step.
#[derive(Debug, Clone, PartialEq)]
pub enum RefineOutcome {
    /// The artifact was cropped; `region` is the selection in absolute screen coordinates.
    Confirmed {
        region: Rect,
        window: Option<WindowDescriptor>,
    },
    /// The user confirmed without selecting any area.
    Empty,
    Cancelled,
}

/// Shows `artifact` on the selection surface and applies the user's choice to it.
pub async fn refine(
    artifact: &mut CaptureArtifact,
    enumeration: WindowEnumeration,
    surface: &dyn SelectionSurface,
    mode: CaptureMode,
    cancel: &CancelSignal,
) -> RefineOutcome {
    let windows = match enumeration.wait(cancel).await {
        Ok(windows) => windows,
        Err(_) => return RefineOutcome::Cancelled,
    };

    let selection = match cancel
        .guard("interactive selection", surface.present(artifact, &windows, mode))
        .await
    {
        Ok(selection) => selection,
        Err(_) => return RefineOutcome::Cancelled,
    };

    let (rect, window) = match selection {
        Selection::Confirmed { rect, window } => (rect, window),
        Selection::Cancelled => {
            log::info!("Interactive selection cancelled by the user");
            return RefineOutcome::Cancelled;
        }
    };

    if let Some(window) = &window {
        artifact.details.title = window.title.clone();
    }

    if rect.is_empty() || !artifact.crop(rect) {
        log::info!("Selection {} is empty, nothing to capture", rect);
        return RefineOutcome::Empty;
    }

    // The crop moved the artifact's location onto the selection.
    let region = artifact.bounds().unwrap_or(rect);
    log::debug!("Selected region {} (screen coordinates)", region);
    RefineOutcome::Confirmed { region, window }
}
