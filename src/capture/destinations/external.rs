//! Handing captures to user-configured programs.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use async_trait::async_trait;
use tokio::task;

use super::file::FileDestination;
use crate::capture::{
    artifact::CaptureArtifact,
    dependencies::Destination,
    types::{CaptureError, ExportNotification},
};
use crate::config::{ExternalCommandConfig, FileConfig, PATH_PLACEHOLDER};

/// Saves the capture to a scratch file and runs a configured program on it.
///
/// The file is left in place; editors usually return before they read it.
#[derive(Debug, Clone)]
pub struct ExternalCommandDestination {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    file: FileDestination,
}

impl ExternalCommandDestination {
    pub fn from_config(command: &ExternalCommandConfig, file: &FileConfig) -> Self {
        Self::with_directory(command, file, std::env::temp_dir().join(crate::config::APP_DIR))
    }

    /// Same as [`ExternalCommandDestination::from_config`] but saves into `directory`.
    pub fn with_directory(
        command: &ExternalCommandConfig,
        file: &FileConfig,
        directory: PathBuf,
    ) -> Self {
        Self {
            name: command.name.clone(),
            command: command.command.clone(),
            args: command.args.clone(),
            file: FileDestination {
                save_directory: directory,
                filename_template: file.filename_template.clone(),
                format: file.format.clone(),
            },
        }
    }

    fn arguments(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(PATH_PLACEHOLDER, &path))
            .collect()
    }

    /// Saves `artifact` and runs the command, returning the first line it printed.
    fn run(&self, artifact: &CaptureArtifact) -> Result<(PathBuf, Option<String>), CaptureError> {
        let path = self.file.save(artifact)?;
        let args = self.arguments(&path);
        log::info!("Running {} {:?}", self.command, args);

        let output = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.failure(format!("could not start {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string);
        Ok((path, first_line))
    }

    fn failure(&self, reason: String) -> CaptureError {
        CaptureError::DestinationFailure {
            destination: self.name.clone(),
            reason,
        }
    }
}

#[async_trait]
impl Destination for ExternalCommandDestination {
    fn designation(&self) -> &str {
        &self.name
    }

    async fn export(&self, artifact: &CaptureArtifact) -> ExportNotification {
        let destination = self.clone();
        let artifact = artifact.clone();
        let result = task::spawn_blocking(move || destination.run(&artifact))
            .await
            .map_err(|e| self.failure(format!("command task failed: {}", e)))
            .and_then(|result| result);

        match result {
            // Upload scripts print the resulting link; surface it instead of the path.
            Ok((_, Some(line))) => ExportNotification::success(self.name.clone(), Some(line)),
            Ok((path, None)) => ExportNotification::success(
                self.name.clone(),
                Some(format!("stored_at {}", path.display())),
            ),
            Err(e) => ExportNotification::failure(self.name.clone(), e.to_string()),
        }
    }
}
