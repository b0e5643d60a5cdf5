use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use image::RgbaImage;

use crate::capture::{
    artifact::CaptureArtifact,
    sources::{CommandFeedback, GrimPixelSource, HyprlandCatalog, SlurpSurface, WaylandImport},
    types::{
        CaptureError, CaptureMode, CursorOverlay, ExportNotification, Point, ProcessInfo, Rect,
        WindowDescriptor,
    },
};
use crate::config::CaptureConfig;

/// Designation of the picker destination, which offers further targets to the user.
pub const PICKER_DESIGNATION: &str = "Picker";
/// Designation of the editor destination, which keeps the capture open for editing.
pub const EDITOR_DESIGNATION: &str = "Editor";

/// Read-only view of the windows currently on the desktop.
///
/// Methods that talk to the window system block; async callers run them through
/// `spawn_blocking`.
pub trait WindowCatalog: Send + Sync {
    /// Visible top-level windows with children resolved up to `child_depth` levels.
    fn list_visible_windows(&self, child_depth: usize) -> Vec<WindowDescriptor>;

    fn active_window(&self) -> Option<WindowDescriptor>;

    /// Launcher/start surface that disappears when it loses focus.
    fn app_launcher(&self) -> Option<WindowDescriptor> {
        None
    }

    fn is_special_composited_app(&self, window: &WindowDescriptor) -> bool {
        window.special_composited_app
    }

    fn is_gdi_capture_permitted(&self, process: &ProcessInfo) -> bool;

    fn is_compositor_capture_permitted(&self, process: &ProcessInfo) -> bool;

    /// Processes whose windows paint black into a GDI copy unless compositing is on.
    fn is_retained_mode_renderer(&self, _process: &ProcessInfo) -> bool {
        false
    }

    fn is_compositing_enabled(&self) -> bool;

    fn restore(&self, _window: &WindowDescriptor) {}

    fn to_foreground(&self, _window: &WindowDescriptor) {}
}

/// Display layout and resolution.
#[async_trait]
pub trait Desktop: Send + Sync {
    fn displays(&self) -> Vec<Rect>;

    fn cursor_position(&self) -> Option<Point>;

    /// Horizontal and vertical DPI of the display hosting the UI.
    async fn query_dpi(&self) -> Option<(f32, f32)>;
}

/// Pixel-copy primitives, one per technique.
///
/// Expected failures (window gone, technique unsupported) return `None`.
#[async_trait]
pub trait PixelSource: Send + Sync {
    async fn capture_screen_region(&self, rect: Rect) -> Option<RgbaImage>;

    async fn capture_window_via_gdi(&self, window: &WindowDescriptor) -> Option<RgbaImage>;

    async fn capture_window_via_compositor(
        &self,
        window: &WindowDescriptor,
        transparent: bool,
    ) -> Option<RgbaImage>;

    /// Current pointer with its absolute position.
    async fn capture_cursor(&self) -> Option<CursorOverlay>;
}

/// Result of the modal selection step.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// `rect` is in pixel-buffer coordinates of the preview.
    Confirmed {
        rect: Rect,
        window: Option<WindowDescriptor>,
    },
    Cancelled,
}

/// Modal surface on which the user picks a region or a window.
#[async_trait]
pub trait SelectionSurface: Send + Sync {
    async fn present(
        &self,
        preview: &CaptureArtifact,
        windows: &[WindowDescriptor],
        mode: CaptureMode,
    ) -> Selection;
}

/// An output for finished captures.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Stable identity used for de-duplication and special-casing.
    fn designation(&self) -> &str;

    /// Exclusive destinations run alone and take over the remaining choices.
    fn is_exclusive(&self) -> bool {
        self.designation() == PICKER_DESIGNATION
    }

    /// Editor-class destinations keep the artifact alive after a successful export.
    fn is_editor(&self) -> bool {
        self.designation() == EDITOR_DESIGNATION
    }

    async fn export(&self, artifact: &CaptureArtifact) -> ExportNotification;
}

/// Capture sound and screen flash. Failures are ignored by the caller.
#[async_trait]
pub trait CaptureFeedback: Send + Sync {
    async fn play_sound(&self) -> Result<(), CaptureError>;

    async fn flash(&self, bounds: Rect) -> Result<(), CaptureError>;
}

/// Sources of images that are not taken from the screen.
#[async_trait]
pub trait ImageImport: Send + Sync {
    async fn clipboard_image(&self) -> Result<RgbaImage, CaptureError>;

    async fn load_file(&self, path: &Path) -> Result<RgbaImage, CaptureError>;
}

/// Dedicated capture path for browser documents (full page rather than viewport).
///
/// Browser capture is enabled by registering one in [`CaptureDependencies::document`];
/// the desktop backends ship none.
#[async_trait]
pub trait DocumentCapture: Send + Sync {
    fn is_document_window(&self, window: &WindowDescriptor) -> bool {
        window.browser_document
    }

    async fn capture_document(&self, window: &WindowDescriptor) -> Option<RgbaImage>;
}

/// Bundle of dependencies used by the capture orchestrator. Each component can be mocked in tests.
#[derive(Clone)]
pub struct CaptureDependencies {
    pub catalog: Arc<dyn WindowCatalog>,
    pub desktop: Arc<dyn Desktop>,
    pub pixels: Arc<dyn PixelSource>,
    pub surface: Arc<dyn SelectionSurface>,
    pub feedback: Arc<dyn CaptureFeedback>,
    pub import: Arc<dyn ImageImport>,
    pub document: Option<Arc<dyn DocumentCapture>>,
}

impl CaptureDependencies {
    /// Desktop backends with the per-application capture policy from `config`.
    pub fn from_config(config: &CaptureConfig) -> Self {
        let hyprland = Arc::new(HyprlandCatalog::from_config(config));
        Self {
            catalog: hyprland.clone(),
            desktop: hyprland,
            pixels: Arc::new(GrimPixelSource),
            surface: Arc::new(SlurpSurface),
            feedback: Arc::new(CommandFeedback),
            import: Arc::new(WaylandImport),
            document: None,
        }
    }
}

impl Default for CaptureDependencies {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}
