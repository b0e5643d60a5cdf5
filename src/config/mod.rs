//! Configuration file support for lensgrab.
//!
//! This module handles loading and validating user settings from the configuration file
//! located at `~/.config/lensgrab/config.toml`. Settings include capture behaviour, the
//! black-pixel validator thresholds and file destination options.
//!
//! If no config file exists, sensible defaults are used automatically.

pub mod state;
pub mod types;

pub use state::SessionState;
pub use types::{CaptureConfig, ExternalCommandConfig, FileConfig, PATH_PLACEHOLDER};

use anyhow::{Context, Result};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::capture::validator::ValidatorThresholds;

/// Directory name under the user's config directory.
pub const APP_DIR: &str = "lensgrab";

/// Formats the file destination can encode.
pub const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

const MAX_CAPTURE_DELAY_MS: u64 = 60_000;

/// Destination names taken by the built-in destinations.
const RESERVED_DESTINATIONS: &[&str] = &["File", "Clipboard", "Picker", "Editor"];

/// Main configuration structure containing all user settings.
///
/// # Example TOML
/// ```toml
/// [capture]
/// capture_delay_ms = 250
/// window_capture_technique = "auto"
/// screen_capture_mode = { fixed = 1 }
/// output_destinations = ["Clipboard", "File"]
///
/// [validator]
/// min_black_percent = 1.0
/// offscreen_black_percent = 50.0
///
/// [file]
/// save_directory = "~/Pictures/Lensgrab"
/// format = "png"
///
/// [[external_command]]
/// name = "GIMP"
/// command = "gimp"
/// args = ["{path}"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
pub struct Config {
    /// Capture behaviour and default destinations
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Black-pixel heuristic for GDI window captures
    #[serde(default)]
    pub validator: ValidatorThresholds,

    /// File destination settings
    #[serde(default)]
    pub file: FileConfig,

    /// Programs available as destinations under their own name
    #[serde(default, rename = "external_command")]
    pub external_commands: Vec<ExternalCommandConfig>,
}

impl Config {
    /// Validates and clamps all configuration values to acceptable ranges.
    ///
    /// Invalid values are clamped to the nearest valid value and a warning is logged.
    ///
    /// Validated ranges:
    /// - `capture_delay_ms`: 0 - 60000
    /// - `min_black_percent`, `offscreen_black_percent`: 0.0 - 100.0
    /// - `file.format`: one of [`SUPPORTED_FORMATS`]
    pub(crate) fn validate_and_clamp(&mut self) {
        if self.capture.capture_delay_ms > MAX_CAPTURE_DELAY_MS {
            log::warn!(
                "Invalid capture_delay_ms {}, clamping to 0-{} range",
                self.capture.capture_delay_ms,
                MAX_CAPTURE_DELAY_MS
            );
            self.capture.capture_delay_ms = MAX_CAPTURE_DELAY_MS;
        }

        if !(0.0..=100.0).contains(&self.validator.min_black_percent) {
            log::warn!(
                "Invalid min_black_percent {:.2}, clamping to 0.0-100.0 range",
                self.validator.min_black_percent
            );
            self.validator.min_black_percent = clamp_percent(self.validator.min_black_percent);
        }

        if !(0.0..=100.0).contains(&self.validator.offscreen_black_percent) {
            log::warn!(
                "Invalid offscreen_black_percent {:.2}, clamping to 0.0-100.0 range",
                self.validator.offscreen_black_percent
            );
            self.validator.offscreen_black_percent =
                clamp_percent(self.validator.offscreen_black_percent);
        }

        let format = self.file.format.to_lowercase();
        if SUPPORTED_FORMATS.contains(&format.as_str()) {
            self.file.format = format;
        } else {
            log::warn!(
                "Invalid file format '{}', falling back to 'png'",
                self.file.format
            );
            self.file.format = "png".to_string();
        }

        if self.file.filename_template.trim().is_empty() {
            log::warn!("Empty filename_template, falling back to the default");
            self.file.filename_template = FileConfig::default().filename_template;
        }

        dedup_names("output destination", &mut self.capture.output_destinations);
        normalize_app_list(
            "compositor_excluded_apps",
            &mut self.capture.compositor_excluded_apps,
        );
        normalize_app_list("composited_apps", &mut self.capture.composited_apps);

        self.validate_external_commands();

        let excluded = &self.capture.compositor_excluded_apps;
        self.capture.composited_apps.retain(|app| {
            if excluded.contains(app) {
                log::warn!(
                    "'{}' is listed in both composited_apps and compositor_excluded_apps, keeping the exclusion",
                    app
                );
                false
            } else {
                true
            }
        });
    }

    /// Drops unusable external commands and makes sure each one receives the capture path.
    fn validate_external_commands(&mut self) {
        let mut names: Vec<String> = RESERVED_DESTINATIONS.iter().map(|n| n.to_string()).collect();
        self.external_commands.retain_mut(|entry| {
            entry.name = entry.name.trim().to_string();
            entry.command = entry.command.trim().to_string();
            if entry.name.is_empty() || entry.command.is_empty() {
                log::warn!("External command without name or command ignored");
                return false;
            }
            if names.contains(&entry.name) {
                log::warn!(
                    "External command '{}' clashes with another destination, ignored",
                    entry.name
                );
                return false;
            }
            names.push(entry.name.clone());
            if !entry.args.iter().any(|arg| arg.contains(PATH_PLACEHOLDER)) {
                log::warn!(
                    "External command '{}' never uses {}, appending it",
                    entry.name,
                    PATH_PLACEHOLDER
                );
                entry.args.push(PATH_PLACEHOLDER.to_string());
            }
            true
        });
    }

    /// Returns the configuration directory (`~/.config/lensgrab`).
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined (e.g., HOME not set).
    pub fn get_config_dir() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not find config directory")?
            .join(APP_DIR))
    }

    /// Returns the path to the configuration file.
    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    /// Loads configuration from file, or returns defaults if not found.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The config directory path cannot be determined
    /// - The file exists but cannot be read
    /// - The file exists but contains invalid TOML syntax
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            info!("Config file not found, using defaults");
            debug!("Expected config at: {}", config_path.display());
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let config = Self::from_toml(&config_str)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

        info!("Loaded config from {}", config_path.display());
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(source: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(source)?;
        config.validate_and_clamp();
        Ok(config)
    }

    /// Saves the current configuration to file, creating the directory if needed.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let config_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, config_str)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        info!("Saved config to {}", config_path.display());
        Ok(())
    }

    /// JSON schema describing the configuration file.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }
}

fn dedup_names(kind: &str, names: &mut Vec<String>) {
    let mut seen = Vec::new();
    names.retain(|name| {
        if seen.contains(name) {
            log::warn!("Duplicate {} '{}' ignored", kind, name);
            false
        } else {
            seen.push(name.clone());
            true
        }
    });
}

/// Trims window class names and drops blanks and duplicates.
fn normalize_app_list(key: &str, apps: &mut Vec<String>) {
    for app in apps.iter_mut() {
        *app = app.trim().to_string();
    }
    apps.retain(|app| {
        if app.is_empty() {
            log::warn!("Empty entry in {} ignored", key);
        }
        !app.is_empty()
    });
    dedup_names(key, apps);
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
