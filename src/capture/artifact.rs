//! The capture artifact: pixels plus everything known about how they were taken.

use std::{fmt, path::PathBuf, sync::Arc};

use image::{RgbaImage, imageops};

use crate::capture::{
    dependencies::Destination,
    types::{CaptureMode, CursorOverlay, Point, Rect},
};

/// Default resolution reported when the display cannot be queried.
pub const DEFAULT_DPI: f32 = 96.0;

/// Request metadata that travels with the pixels.
#[derive(Clone)]
pub struct CaptureDetails {
    pub title: String,
    pub filename: Option<PathBuf>,
    pub capture_mode: CaptureMode,
    pub dpi_x: f32,
    pub dpi_y: f32,
    /// Set when the pixels differ from what was originally captured/imported.
    pub modified: bool,
    metadata: Vec<(String, String)>,
    destinations: Vec<Arc<dyn Destination>>,
}

impl CaptureDetails {
    pub fn new(capture_mode: CaptureMode) -> Self {
        Self {
            title: String::new(),
            filename: None,
            capture_mode,
            dpi_x: DEFAULT_DPI,
            dpi_y: DEFAULT_DPI,
            modified: true,
            metadata: Vec::new(),
            destinations: Vec::new(),
        }
    }

    /// Adds or replaces a metadata entry. Replaced keys keep their original position.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.metadata.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.metadata.push((key, value));
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All metadata entries in insertion order.
    pub fn metadata_entries(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// Appends a destination unless one with the same designation is already present.
    ///
    /// Returns whether the destination was added.
    pub fn add_destination(&mut self, destination: Arc<dyn Destination>) -> bool {
        if self.has_destination(destination.designation()) {
            log::debug!(
                "Destination {} already registered, skipping duplicate",
                destination.designation()
            );
            return false;
        }
        self.destinations.push(destination);
        true
    }

    pub fn has_destination(&self, designation: &str) -> bool {
        self.destinations
            .iter()
            .any(|d| d.designation() == designation)
    }

    pub fn destinations(&self) -> &[Arc<dyn Destination>] {
        &self.destinations
    }

    pub fn clear_destinations(&mut self) {
        self.destinations.clear();
    }

    pub fn destination_names(&self) -> Vec<String> {
        self.destinations
            .iter()
            .map(|d| d.designation().to_string())
            .collect()
    }
}

impl fmt::Debug for CaptureDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureDetails")
            .field("title", &self.title)
            .field("filename", &self.filename)
            .field("capture_mode", &self.capture_mode)
            .field("dpi", &(self.dpi_x, self.dpi_y))
            .field("modified", &self.modified)
            .field("metadata", &self.metadata)
            .field("destinations", &self.destination_names())
            .finish()
    }
}

/// Owned record of one capture run.
///
/// Created at the start of a run and passed by value between the orchestration
/// steps; whoever holds it last is responsible for [`CaptureArtifact::dispose`].
#[derive(Clone)]
pub struct CaptureArtifact {
    pixels: Option<RgbaImage>,
    /// Screen position of the pixel buffer's top-left corner.
    pub location: Point,
    /// Union of all display bounds at capture time.
    pub screen_bounds: Rect,
    pub cursor: Option<CursorOverlay>,
    pub details: CaptureDetails,
}

impl CaptureArtifact {
    pub fn new(capture_mode: CaptureMode) -> Self {
        Self {
            pixels: None,
            location: Point::default(),
            screen_bounds: Rect::default(),
            cursor: None,
            details: CaptureDetails::new(capture_mode),
        }
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }

    pub fn has_pixels(&self) -> bool {
        self.pixels.is_some()
    }

    /// Replaces the pixel buffer; the previous buffer is dropped.
    pub fn set_pixels(&mut self, pixels: RgbaImage, location: Point) {
        self.pixels = Some(pixels);
        self.location = location;
    }

    /// Screen-space rectangle covered by the pixel buffer.
    pub fn bounds(&self) -> Option<Rect> {
        self.pixels.as_ref().map(|img| {
            Rect::new(
                self.location.x,
                self.location.y,
                img.width() as i32,
                img.height() as i32,
            )
        })
    }

    /// Makes the cursor position relative to the pixel buffer.
    pub fn anchor_cursor(&mut self) {
        let (dx, dy) = (-self.location.x, -self.location.y);
        self.move_cursor(dx, dy);
    }

    pub fn move_cursor(&mut self, dx: i32, dy: i32) {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.position.x += dx;
            cursor.position.y += dy;
        }
    }

    /// Crops to `rect`, given in pixel-buffer coordinates.
    ///
    /// The buffer is replaced by a new one of exactly the cropped size and the
    /// location and cursor move accordingly. Returns `false` (leaving the
    /// artifact untouched) when the rectangle does not overlap the buffer.
    pub fn crop(&mut self, rect: Rect) -> bool {
        let Some(pixels) = self.pixels.as_ref() else {
            return false;
        };
        let buffer = Rect::new(0, 0, pixels.width() as i32, pixels.height() as i32);
        let clipped = rect.intersect(&buffer);
        if clipped.is_empty() {
            log::warn!("Crop rectangle {} lies outside the capture {}", rect, buffer);
            return false;
        }
        if clipped == buffer {
            return true;
        }

        let cropped = imageops::crop_imm(
            pixels,
            clipped.x as u32,
            clipped.y as u32,
            clipped.width as u32,
            clipped.height as u32,
        )
        .to_image();
        self.pixels = Some(cropped);
        self.location = Point::new(self.location.x + clipped.x, self.location.y + clipped.y);
        self.move_cursor(-clipped.x, -clipped.y);
        true
    }

    /// Releases the pixel buffer. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.pixels.take().is_some() {
            log::debug!("Disposing capture '{}'", self.details.title);
        }
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.image = None;
        }
    }
}

impl fmt::Debug for CaptureArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureArtifact")
            .field("bounds", &self.bounds())
            .field("screen_bounds", &self.screen_bounds)
            .field("cursor", &self.cursor.as_ref().map(|c| (c.position, c.visible)))
            .field("details", &self.details)
            .finish()
    }
}
