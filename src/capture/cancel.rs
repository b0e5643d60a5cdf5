//! Cancellation signal shared by every suspension point of a capture run.

use std::{future::Future, sync::Arc};

use tokio::sync::watch;

use crate::capture::types::CaptureError;

/// Cloneable one-shot cancellation flag.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`CancelSignal::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Unreachable while `self` holds the sender.
            std::future::pending::<()>().await;
        }
    }

    /// Runs `future` unless cancellation wins the race.
    pub async fn guard<F>(&self, stage: &str, future: F) -> Result<F::Output, CaptureError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => {
                log::info!("Capture cancelled during {}", stage);
                Err(CaptureError::Cancelled(format!("cancelled during {stage}")))
            }
            output = future => Ok(output),
        }
    }
}
