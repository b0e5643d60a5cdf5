//! Configuration type definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::capture::types::{ScreenCaptureMode, WindowCaptureTechnique};

/// Capture behaviour.
///
/// Controls how captures are taken and where they go when the caller does not
/// name any destination.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaptureConfig {
    /// Delay before capturing in milliseconds, lets menus close (valid range: 0 - 60000)
    #[serde(default)]
    pub capture_delay_ms: u64,

    /// Include the mouse pointer when the request asks for it
    #[serde(default = "default_true")]
    pub capture_mouse_pointer: bool,

    /// Technique for window captures: "auto", "gdi", "compositor", "compositor-transparent" or "screen"
    #[serde(default)]
    pub window_capture_technique: WindowCaptureTechnique,

    /// Display used by full screen captures: "auto" (under the pointer), "full-screen" or `{ fixed = N }`
    #[serde(default)]
    pub screen_capture_mode: ScreenCaptureMode,

    /// Resolve child windows deeply so the selection can snap to nested controls
    #[serde(default)]
    pub window_capture_all_child_locations: bool,

    /// Play a shutter sound when a capture is taken
    #[serde(default)]
    pub play_camera_sound: bool,

    /// Flash the captured area
    #[serde(default)]
    pub show_flash: bool,

    /// Destinations used when the request names none (e.g. "Clipboard", "File")
    #[serde(default = "default_output_destinations")]
    pub output_destinations: Vec<String>,

    /// Window classes that must never be captured through the compositor
    #[serde(default)]
    pub compositor_excluded_apps: Vec<String>,

    /// Window classes that only render correctly through the compositor
    #[serde(default)]
    pub composited_apps: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_delay_ms: 0,
            capture_mouse_pointer: true,
            window_capture_technique: WindowCaptureTechnique::default(),
            screen_capture_mode: ScreenCaptureMode::default(),
            window_capture_all_child_locations: false,
            play_camera_sound: false,
            show_flash: false,
            output_destinations: default_output_destinations(),
            compositor_excluded_apps: Vec::new(),
            composited_apps: Vec::new(),
        }
    }
}

/// Settings for the file destination.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileConfig {
    /// Directory for saved captures, `~/` is expanded
    #[serde(default = "default_save_directory")]
    pub save_directory: String,

    /// Filename template (supports chrono format specifiers)
    #[serde(default = "default_filename_template")]
    pub filename_template: String,

    /// Image format: "png", "jpg" or "bmp"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            save_directory: default_save_directory(),
            filename_template: default_filename_template(),
            format: default_format(),
        }
    }
}

/// Placeholder replaced by the saved capture's path in external command arguments.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// A program that receives every capture routed to it, e.g. an image editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExternalCommandConfig {
    /// Destination name used in `output_destinations` and `--destination`
    pub name: String,

    /// Program to run, looked up in `PATH` unless absolute
    pub command: String,

    /// Arguments; `{path}` is replaced with the saved capture
    #[serde(default = "default_command_args")]
    pub args: Vec<String>,
}

fn default_command_args() -> Vec<String> {
    vec![PATH_PLACEHOLDER.to_string()]
}

fn default_true() -> bool {
    true
}

fn default_output_destinations() -> Vec<String> {
    vec!["Clipboard".to_string(), "File".to_string()]
}

fn default_save_directory() -> String {
    "~/Pictures/Lensgrab".to_string()
}

fn default_filename_template() -> String {
    "capture_%Y-%m-%d_%H%M%S".to_string()
}

fn default_format() -> String {
    "png".to_string()
}
