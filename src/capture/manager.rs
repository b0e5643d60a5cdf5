use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::capture::{
    cancel::CancelSignal,
    dependencies::CaptureDependencies,
    orchestrator::{CaptureOrchestrator, CaptureRequest, CaptureRun, CaptureSettings, RunOutcome},
    types::{CaptureError, CaptureStatus},
};

/// Final result of a queued capture.
#[derive(Debug)]
pub enum CaptureOutcome {
    Success(CaptureRun),
    Failed(String),
    Cancelled(String),
}

struct Job {
    request: CaptureRequest,
    cancel: CancelSignal,
}

/// Shared state for queued capture operations.
///
/// Requests are processed one at a time by a background task, so captures never
/// overlap and the last captured region is always up to date for the next one.
#[derive(Clone)]
pub struct CaptureManager {
    /// Channel for sending capture requests.
    request_tx: mpsc::UnboundedSender<Job>,
    /// Shared status of the current capture operation.
    status: Arc<Mutex<CaptureStatus>>,
    /// Shared result of the last capture (if any).
    last_result: Arc<Mutex<Option<CaptureOutcome>>>,
    settings: Arc<Mutex<CaptureSettings>>,
    /// Cancellation handle of the capture being processed.
    current: Arc<Mutex<Option<CancelSignal>>>,
}

impl CaptureManager {
    /// Create a new capture manager using the desktop backends configured by `settings`.
    ///
    /// This spawns a background task that runs the captures.
    ///
    /// # Arguments
    /// * `runtime_handle` - Tokio runtime handle for spawning async tasks
    /// * `settings` - Configuration and remembered state shared by all requests
    pub fn new(runtime_handle: &tokio::runtime::Handle, settings: CaptureSettings) -> Self {
        let dependencies = CaptureDependencies::from_config(&settings.capture);
        Self::with_dependencies(runtime_handle, dependencies, settings)
    }

    /// Create a capture manager with custom dependencies (useful for testing).
    pub fn with_dependencies(
        runtime_handle: &tokio::runtime::Handle,
        dependencies: CaptureDependencies,
        settings: CaptureSettings,
    ) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<Job>();
        let status = Arc::new(Mutex::new(CaptureStatus::Idle));
        let last_result = Arc::new(Mutex::new(None));
        let settings = Arc::new(Mutex::new(settings));
        let current = Arc::new(Mutex::new(None::<CancelSignal>));
        let orchestrator = CaptureOrchestrator::new(Arc::new(dependencies));

        let status_clone = status.clone();
        let result_clone = last_result.clone();
        let settings_clone = settings.clone();
        let current_clone = current.clone();

        runtime_handle.spawn(async move {
            while let Some(Job { request, cancel }) = request_rx.recv().await {
                log::debug!("Processing capture request: {:?}", request.mode);
                *status_clone.lock().await = CaptureStatus::InProgress;
                *current_clone.lock().await = Some(cancel.clone());

                let result = {
                    let mut settings = settings_clone.lock().await;
                    orchestrator.run(request, &mut settings, &cancel).await
                };
                *current_clone.lock().await = None;

                let (status, outcome) = match result {
                    Ok(run) => match run.outcome {
                        RunOutcome::UserCancelled => {
                            let reason = "selection cancelled".to_string();
                            log::info!("Capture cancelled: {}", reason);
                            (
                                CaptureStatus::Cancelled(reason.clone()),
                                CaptureOutcome::Cancelled(reason),
                            )
                        }
                        _ => {
                            log::info!("Capture finished in state {:?}", run.state());
                            (CaptureStatus::Success, CaptureOutcome::Success(run))
                        }
                    },
                    Err(CaptureError::Cancelled(reason)) => {
                        log::info!("Capture cancelled: {}", reason);
                        (
                            CaptureStatus::Cancelled(reason.clone()),
                            CaptureOutcome::Cancelled(reason),
                        )
                    }
                    Err(e) => {
                        let error_message = e.to_string();
                        log::error!("Capture failed: {}", error_message);
                        (
                            CaptureStatus::Failed(error_message.clone()),
                            CaptureOutcome::Failed(error_message),
                        )
                    }
                };
                *status_clone.lock().await = status;
                *result_clone.lock().await = Some(outcome);
            }
        });

        Self {
            request_tx,
            status,
            last_result,
            settings,
            current,
        }
    }

    /// Queue a capture.
    ///
    /// This is non-blocking and returns immediately. The returned signal cancels
    /// this request while it waits, delays or acquires.
    pub fn request_capture(&self, request: CaptureRequest) -> Result<CancelSignal, CaptureError> {
        let cancel = CancelSignal::new();
        self.request_tx
            .send(Job {
                request,
                cancel: cancel.clone(),
            })
            .map_err(|_| CaptureError::AcquisitionFailure("Capture manager not running".to_string()))?;
        Ok(cancel)
    }

    /// Get the current capture status.
    pub async fn get_status(&self) -> CaptureStatus {
        self.status.lock().await.clone()
    }

    /// Get the result of the last capture and clear it.
    pub async fn take_result(&self) -> Option<CaptureOutcome> {
        self.last_result.lock().await.take()
    }

    /// Try to get the result without waiting (non-blocking).
    pub fn try_take_result(&self) -> Option<CaptureOutcome> {
        self.last_result.try_lock().ok().and_then(|mut r| r.take())
    }

    /// Cancel the capture currently being processed, if any.
    pub async fn cancel(&self) {
        if let Some(cancel) = self.current.lock().await.as_ref() {
            log::info!("Cancelling current capture");
            cancel.cancel();
        }
    }

    /// Shared settings, including the remembered region.
    pub fn settings(&self) -> Arc<Mutex<CaptureSettings>> {
        self.settings.clone()
    }

    /// Reset status to idle.
    pub async fn reset(&self) {
        *self.status.lock().await = CaptureStatus::Idle;
    }
}

#[cfg(test)]
impl CaptureManager {
    pub(crate) fn with_closed_channel_for_test() -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        drop(rx);
        Self {
            request_tx: tx,
            status: Arc::new(Mutex::new(CaptureStatus::Idle)),
            last_result: Arc::new(Mutex::new(None)),
            settings: Arc::new(Mutex::new(CaptureSettings::default())),
            current: Arc::new(Mutex::new(None)),
        }
    }
}
