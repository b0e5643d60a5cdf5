//! Data types for screenshot capture functionality.

use std::{fmt, str::FromStr};

use image::RgbaImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle. `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of pixels covered, zero for empty rectangles.
    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.width as u64 * self.height as u64
        }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn location(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Overlapping part of both rectangles, or an empty rectangle when disjoint.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            Rect::default()
        } else {
            Rect::new(x, y, right - x, bottom - y)
        }
    }

    /// Smallest rectangle enclosing both. Empty inputs are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Bounding box of a set of rectangles (e.g. all displays).
    pub fn union_all<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Rect {
        rects
            .into_iter()
            .fold(Rect::default(), |acc, rect| acc.union(rect))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for Rect {
    type Err = String;

    /// Parses `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!("expected x,y,width,height but got '{s}'"));
        }
        let mut values = [0i32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|e| format!("invalid number '{part}': {e}"))?;
        }
        let rect = Rect::new(values[0], values[1], values[2], values[3]);
        if rect.is_empty() {
            return Err(format!("rectangle '{s}' has no area"));
        }
        if rect.x.checked_add(rect.width).is_none() || rect.y.checked_add(rect.height).is_none() {
            return Err(format!("rectangle '{s}' extends past the coordinate range"));
        }
        Ok(rect)
    }
}

/// What a single capture request intends to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// A rectangle, either pre-supplied or picked interactively.
    Region,
    /// One display or the whole desktop, see [`ScreenCaptureMode`].
    FullScreen,
    /// The focused (or a supplied) window.
    ActiveWindow,
    /// A window picked interactively.
    Window,
    /// The document of a browser window.
    BrowserDocument,
    /// The rectangle of the previous region capture.
    LastRegion,
    /// An image loaded from disk.
    File,
    /// The image currently held by the clipboard.
    Clipboard,
    /// Disabled after use.
    None,
}

impl CaptureMode {
    /// Imported images are not acquired from the screen.
    pub fn is_import(self) -> bool {
        matches!(self, CaptureMode::File | CaptureMode::Clipboard)
    }
}

/// How to pick a physical display for [`CaptureMode::FullScreen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenCaptureMode {
    /// The display under the pointer.
    #[default]
    Auto,
    /// A configured display index (clamped to the available displays).
    Fixed(usize),
    /// The union of all displays.
    FullScreen,
}

impl FromStr for ScreenCaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "full" | "full-screen" | "all" => Ok(Self::FullScreen),
            other => other
                .parse::<usize>()
                .map(Self::Fixed)
                .map_err(|_| format!("unknown screen '{other}' (use auto, full or an index)")),
        }
    }
}

/// Low-level technique used to copy a window's pixels.
///
/// Ordered by desirability under `Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum WindowCaptureTechnique {
    #[default]
    Auto,
    /// Ask the window to paint itself into a bitmap.
    Gdi,
    /// Copy the compositor's buffer for the window.
    Compositor,
    /// Compositor copy keeping the transparent frame.
    CompositorTransparent,
    /// Copy the visible screen area covered by the window.
    Screen,
}

/// Owning process of a window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Snapshot of a window as reported by the window catalog.
///
/// The engine never mutates these; they are re-queried per request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowDescriptor {
    pub handle: u64,
    pub title: String,
    pub bounds: Rect,
    pub minimized: bool,
    pub visible: bool,
    pub special_composited_app: bool,
    pub browser_document: bool,
    pub process: ProcessInfo,
    pub children: Vec<WindowDescriptor>,
}

impl WindowDescriptor {
    pub fn contains(&self, point: Point) -> bool {
        self.bounds.contains(point)
    }
}

/// Mouse pointer captured alongside the screen.
///
/// `position` is absolute until the artifact anchors it, then relative to the
/// artifact's pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorOverlay {
    pub position: Point,
    pub visible: bool,
    pub image: Option<RgbaImage>,
}

/// Result reported by a destination for one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Success,
    Failure,
    Cancelled,
}

/// Per-destination export report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNotification {
    pub source: String,
    pub outcome: ExportOutcome,
    pub message: Option<String>,
}

impl ExportNotification {
    pub fn success(source: impl Into<String>, message: Option<String>) -> Self {
        Self {
            source: source.into(),
            outcome: ExportOutcome::Success,
            message,
        }
    }

    pub fn failure(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: ExportOutcome::Failure,
            message: Some(message.into()),
        }
    }

    pub fn cancelled(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: ExportOutcome::Cancelled,
            message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ExportOutcome::Success
    }
}

/// Errors that can occur during screenshot capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No capture technique produced a usable image: {0}")]
    AcquisitionFailure(String),

    #[error("Nothing to import: {0}")]
    ImportUnavailable(String),

    #[error("Export to {destination} failed: {reason}")]
    DestinationFailure { destination: String, reason: String },

    #[error("Failed to save screenshot: {0}")]
    SaveError(#[from] std::io::Error),

    #[error("Clipboard operation failed: {0}")]
    ClipboardError(String),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Backend returned invalid response: {0}")]
    InvalidResponse(String),

    #[error("Capture cancelled: {0}")]
    Cancelled(String),
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::ImageError(err.to_string())
    }
}

/// Status of an ongoing capture operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    /// Capture is idle/not started.
    Idle,
    /// Capture is in progress.
    InProgress,
    /// Capture completed successfully.
    Success,
    /// Capture failed.
    Failed(String),
    /// Capture was cancelled by the user.
    Cancelled(String),
}
