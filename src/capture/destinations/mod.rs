//! Built-in destinations and the registry that maps configured names to them.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbaImage, imageops};

use crate::capture::{
    artifact::CaptureArtifact, dependencies::Destination, types::CaptureError,
};
use crate::config::Config;

pub mod clipboard;
pub mod external;
pub mod file;

pub use clipboard::ClipboardDestination;
pub use external::ExternalCommandDestination;
pub use file::FileDestination;

/// Maps configured designations to destinations, in order.
///
/// Names other than the built-ins are looked up among the `[[external_command]]`
/// entries. Unknown names are skipped with a warning; the host registers any
/// further destinations itself.
pub fn build_destinations(names: &[String], config: &Config) -> Vec<Arc<dyn Destination>> {
    let mut destinations: Vec<Arc<dyn Destination>> = Vec::new();
    for name in names {
        match name.as_str() {
            clipboard::DESIGNATION => destinations.push(Arc::new(ClipboardDestination)),
            file::DESIGNATION => {
                destinations.push(Arc::new(FileDestination::from_config(&config.file)))
            }
            other => match config.external_commands.iter().find(|c| c.name == other) {
                Some(command) => destinations.push(Arc::new(
                    ExternalCommandDestination::from_config(command, &config.file),
                )),
                None => log::warn!("Unknown destination '{}' ignored", other),
            },
        }
    }
    destinations
}

/// The artifact's pixels with the pointer drawn in, if it is visible.
pub(crate) fn composed_pixels(artifact: &CaptureArtifact) -> Result<RgbaImage, CaptureError> {
    let pixels = artifact
        .pixels()
        .ok_or_else(|| CaptureError::ImageError("capture has no pixels".into()))?;
    let mut composed = pixels.clone();
    if let Some(cursor) = &artifact.cursor
        && cursor.visible
        && let Some(image) = &cursor.image
    {
        imageops::overlay(
            &mut composed,
            image,
            i64::from(cursor.position.x),
            i64::from(cursor.position.y),
        );
    }
    Ok(composed)
}

/// Encodes the artifact in `format`; formats without alpha get an opaque copy.
pub(crate) fn encode(artifact: &CaptureArtifact, format: ImageFormat) -> Result<Vec<u8>, CaptureError> {
    let image = DynamicImage::ImageRgba8(composed_pixels(artifact)?);
    let image = match format {
        ImageFormat::Jpeg | ImageFormat::Bmp => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format)?;
    Ok(bytes.into_inner())
}
