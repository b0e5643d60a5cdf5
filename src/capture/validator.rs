//! Plausibility check for GDI window captures.
//!
//! Some windows paint nothing into a GDI copy and the copy still "succeeds",
//! leaving a black bitmap. The only hint is the share of pure black pixels, so
//! a suspicious GDI result is compared against a plain screen copy of the same
//! area.

use image::RgbaImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::capture::{dependencies::PixelSource, types::Rect};

/// GDI results with less black than this (in percent) are accepted outright.
pub const DEFAULT_MIN_BLACK_PERCENT: f64 = 1.0;
/// Black percentage above which a partially off-screen GDI result is distrusted.
pub const DEFAULT_OFFSCREEN_BLACK_PERCENT: f64 = 50.0;

/// Tuning constants for the black-pixel heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidatorThresholds {
    /// Percentage of black pixels (0-100) below which a GDI capture is trusted without comparison
    #[serde(default = "default_min_black_percent")]
    pub min_black_percent: f64,

    /// Percentage of black pixels (0-100) a partially off-screen GDI capture must exceed to be replaced
    #[serde(default = "default_offscreen_black_percent")]
    pub offscreen_black_percent: f64,
}

impl Default for ValidatorThresholds {
    fn default() -> Self {
        Self {
            min_black_percent: default_min_black_percent(),
            offscreen_black_percent: default_offscreen_black_percent(),
        }
    }
}

fn default_min_black_percent() -> f64 {
    DEFAULT_MIN_BLACK_PERCENT
}

fn default_offscreen_black_percent() -> f64 {
    DEFAULT_OFFSCREEN_BLACK_PERCENT
}

/// What the validator decided about a GDI capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Little enough black that no comparison was made.
    Accepted,
    /// Compared with a screen copy and kept.
    KeptAfterComparison,
    /// Replaced by the screen copy.
    ReplacedByScreen,
}

/// Share of exactly black pixels (alpha ignored), in percent.
pub fn black_pixel_percentage(image: &RgbaImage) -> f64 {
    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let black = image
        .pixels()
        .filter(|p| p.0[0] == 0 && p.0[1] == 0 && p.0[2] == 0)
        .count() as u64;
    black as f64 * 100.0 / total as f64
}

/// Decides between a GDI and a screen capture of the same window from their statistics.
pub fn prefer_screen_capture(
    gdi_black: f64,
    gdi_area: u64,
    screen_black: f64,
    screen_area: u64,
    thresholds: &ValidatorThresholds,
) -> bool {
    if screen_area == gdi_area {
        gdi_black > screen_black
    } else if screen_area < gdi_area {
        // Window reaches outside the screen, so only a mostly black GDI copy is suspicious.
        gdi_black > thresholds.offscreen_black_percent && gdi_black > screen_black
    } else {
        log::debug!(
            "Screen copy ({} px) larger than GDI copy ({} px), keeping GDI",
            screen_area,
            gdi_area
        );
        false
    }
}

/// Validates a GDI capture of the window covering `visible_rect` on screen.
///
/// Returns the image to keep and the verdict.
pub async fn validate_gdi_capture(
    gdi: RgbaImage,
    visible_rect: Rect,
    pixels: &dyn PixelSource,
    thresholds: &ValidatorThresholds,
) -> (RgbaImage, Verdict) {
    let gdi_black = black_pixel_percentage(&gdi);
    if gdi_black < thresholds.min_black_percent {
        return (gdi, Verdict::Accepted);
    }

    log::debug!(
        "GDI capture is {:.2}% black, comparing with a screen copy of {}",
        gdi_black,
        visible_rect
    );
    let Some(screen) = pixels.capture_screen_region(visible_rect).await else {
        log::debug!("Screen copy for comparison failed, keeping GDI capture");
        return (gdi, Verdict::KeptAfterComparison);
    };

    let screen_black = black_pixel_percentage(&screen);
    let gdi_area = gdi.width() as u64 * gdi.height() as u64;
    let screen_area = screen.width() as u64 * screen.height() as u64;

    if prefer_screen_capture(gdi_black, gdi_area, screen_black, screen_area, thresholds) {
        log::debug!(
            "Using screen capture, GDI had additional black ({:.2}% vs {:.2}%)",
            gdi_black,
            screen_black
        );
        (screen, Verdict::ReplacedByScreen)
    } else {
        (gdi, Verdict::KeptAfterComparison)
    }
}
