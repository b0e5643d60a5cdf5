//! Cross-request state persisted between runs (`~/.config/lensgrab/state.toml`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::types::Rect;

/// State remembered from one capture to the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Region of the last region/window capture, in screen coordinates.
    #[serde(default)]
    pub last_captured_region: Option<Rect>,
}

impl SessionState {
    pub fn get_state_path() -> Result<PathBuf> {
        Ok(super::Config::get_config_dir()?.join("state.toml"))
    }

    /// Loads the persisted state; a missing or unreadable file yields the default state.
    pub fn load() -> Result<Self> {
        let path = Self::get_state_path()?;
        Ok(Self::load_from(&path))
    }

    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                log::debug!("No capture state at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                log::warn!(
                    "Ignoring corrupt capture state {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_state_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize state")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write state to {}", path.display()))?;
        log::debug!("Saved capture state to {}", path.display());
        Ok(())
    }
}
