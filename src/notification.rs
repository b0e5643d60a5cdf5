//! Desktop notifications for capture results via freedesktop D-Bus.

use std::collections::HashMap;
use zbus::{Connection, proxy, zvariant::Value};

use crate::capture::types::{ExportNotification, ExportOutcome};

/// D-Bus interface for freedesktop Notifications.
#[proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    /// Returns the notification id.
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: Vec<&str>,
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;
}

/// Urgency hint understood by freedesktop notification daemons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low = 0,
    Normal = 1,
    Critical = 2,
}

/// A notification about one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub summary: String,
    pub body: String,
    pub icon: &'static str,
    pub urgency: Urgency,
}

impl Notice {
    /// The capture could not be taken at all.
    pub fn capture_failed(reason: &str) -> Self {
        Self {
            summary: "Capture failed".to_string(),
            body: reason.to_string(),
            icon: "dialog-error",
            urgency: Urgency::Critical,
        }
    }

    /// Report for one destination; cancelled exports are not worth a popup.
    pub fn for_export(notification: &ExportNotification) -> Option<Self> {
        let body = notification.message.clone().unwrap_or_default();
        match notification.outcome {
            ExportOutcome::Success => Some(Self {
                summary: format!("Capture sent to {}", notification.source),
                body,
                icon: "camera-photo",
                urgency: Urgency::Low,
            }),
            ExportOutcome::Failure => Some(Self {
                summary: format!("Export to {} failed", notification.source),
                body,
                icon: "dialog-warning",
                urgency: Urgency::Normal,
            }),
            ExportOutcome::Cancelled => None,
        }
    }
}

/// Sends `notice` to the notification daemon on the session bus.
pub async fn send_notification(notice: &Notice) -> zbus::Result<u32> {
    let connection = Connection::session().await?;
    let proxy = NotificationsProxy::new(&connection).await?;

    let mut hints = HashMap::new();
    hints.insert("urgency", Value::U8(notice.urgency as u8));

    proxy
        .notify(
            "Lensgrab",
            0,
            notice.icon,
            &notice.summary,
            &notice.body,
            vec![],
            hints,
            3000, // 3 second timeout
        )
        .await
}
