//! Screen capture orchestration for lensgrab.
//!
//! This module provides:
//! - Region, full screen, window and browser document captures
//! - Window capture technique selection with fallback
//! - Black-pixel validation of window copies
//! - Interactive refinement on a frozen preview
//! - Routing of finished captures to destinations

pub mod artifact;
pub mod cancel;
pub mod dependencies;
pub mod destinations;
pub mod interactive;
pub mod orchestrator;
pub mod router;
pub mod selector;
pub mod types;
pub mod validator;

mod manager;
mod sources;
#[cfg(test)]
mod tests;

pub use artifact::{CaptureArtifact, CaptureDetails};
pub use cancel::CancelSignal;
pub use dependencies::CaptureDependencies;
pub use manager::{CaptureManager, CaptureOutcome};
pub use orchestrator::{
    CaptureOrchestrator, CaptureRequest, CaptureRun, CaptureSettings, CaptureState, RunOutcome,
};
pub use router::RouteReport;
pub use sources::{CommandFeedback, GrimPixelSource, HyprlandCatalog, SlurpSurface, WaylandImport};
pub use types::{
    CaptureError, CaptureMode, CaptureStatus, ExportNotification, ExportOutcome, Rect,
    ScreenCaptureMode, WindowCaptureTechnique, WindowDescriptor,
};
