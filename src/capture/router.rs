//! Delivery of a finished artifact to its destinations.

use crate::capture::{
    artifact::{CaptureArtifact, CaptureDetails},
    types::{CaptureError, ExportNotification, ExportOutcome, Rect},
};

/// What happened to an artifact once routed.
#[derive(Debug)]
pub struct RouteReport {
    /// One notification per invoked destination, in invocation order.
    pub notifications: Vec<ExportNotification>,
    /// Details as they were after routing (the pixels may already be gone).
    pub details: CaptureDetails,
    pub bounds: Option<Rect>,
    /// Set when a destination took ownership; the caller must keep it alive.
    pub retained: Option<CaptureArtifact>,
}

impl RouteReport {
    pub fn is_retained(&self) -> bool {
        self.retained.is_some()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExportNotification> {
        self.notifications.iter().filter(|n| !n.is_success())
    }
}

/// Exports `artifact` to every destination registered in its details.
///
/// A failing destination never stops the others. The artifact is disposed here
/// unless an exclusive destination or a successful editor claimed it.
pub async fn route(mut artifact: CaptureArtifact) -> RouteReport {
    let bounds = artifact.bounds();
    let mut notifications = Vec::new();
    let mut disposable = true;

    let exclusive = artifact
        .details
        .destinations()
        .iter()
        .find(|d| d.is_exclusive())
        .cloned();

    if let Some(destination) = exclusive {
        log::info!(
            "Calling exclusive destination {}",
            destination.designation()
        );
        let notification = destination.export(&artifact).await;
        log_notification(&notification);
        notifications.push(notification);
        artifact.details.clear_destinations();
        disposable = false;
    } else {
        let destinations = artifact.details.destinations().to_vec();
        for destination in destinations {
            log::info!("Calling destination {}", destination.designation());
            let notification = destination.export(&artifact).await;
            log_notification(&notification);
            if destination.is_editor() && notification.is_success() {
                log::debug!(
                    "{} took ownership of the capture",
                    destination.designation()
                );
                disposable = false;
            }
            notifications.push(notification);
        }
    }

    let details = artifact.details.clone();
    let retained = if disposable {
        artifact.dispose();
        None
    } else {
        Some(artifact)
    };

    RouteReport {
        notifications,
        details,
        bounds,
        retained,
    }
}

fn log_notification(notification: &ExportNotification) {
    let message = notification.message.as_deref().unwrap_or("");
    match notification.outcome {
        ExportOutcome::Success => log::info!("{} succeeded {}", notification.source, message),
        ExportOutcome::Cancelled => log::info!("{} was cancelled", notification.source),
        ExportOutcome::Failure => {
            let error = CaptureError::DestinationFailure {
                destination: notification.source.clone(),
                reason: message.to_string(),
            };
            log::error!("{error}")
        }
    }
}
