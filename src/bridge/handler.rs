//! Per-notification work: classify, actuate, report.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::classify::{Command, is_known_subject};
use crate::actuator::{Action, Actuator};
use crate::error::Error;
use crate::mail::{Notification, NotificationHandler, Notifier};

/// Names used in report subjects, e.g. `Synced Simplisafe -> Blink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLabels {
    pub source: String,
    pub target: String,
}

impl Default for SyncLabels {
    fn default() -> Self {
        Self {
            source: "Simplisafe".into(),
            target: "Blink".into(),
        }
    }
}

impl SyncLabels {
    pub fn confirmation_subject(&self) -> String {
        format!("Synced {} -> {}", self.source, self.target)
    }

    pub fn failure_subject(&self) -> String {
        format!("Sync Failed {} -> {}", self.source, self.target)
    }
}

/// Mirrors alarm status emails onto the remote platform.
pub struct SyncHandler {
    actuator: Arc<dyn Actuator>,
    notifier: Arc<dyn Notifier>,
    report_recipient: String,
    labels: SyncLabels,
}

impl SyncHandler {
    pub fn new(
        actuator: Arc<dyn Actuator>,
        notifier: Arc<dyn Notifier>,
        report_recipient: impl Into<String>,
        labels: SyncLabels,
    ) -> Self {
        Self {
            actuator,
            notifier,
            report_recipient: report_recipient.into(),
            labels,
        }
    }

    /// Apply `action` and send the confirmation.
    async fn sync(&self, action: Action) -> Result<(), Error> {
        self.actuator.apply(action).await?;
        self.notifier
            .send(
                &self.report_recipient,
                &self.labels.confirmation_subject(),
                confirmation_body(action),
            )
            .await?;
        Ok(())
    }

    /// Best effort: a failed report is logged and dropped.
    async fn report_failure(&self, err: &Error) {
        if let Err(send_err) = self
            .notifier
            .send(
                &self.report_recipient,
                &self.labels.failure_subject(),
                &err.to_string(),
            )
            .await
        {
            error!("Failed to send failure report: {send_err}");
        }
    }
}

#[async_trait]
impl NotificationHandler for SyncHandler {
    async fn handle(&self, notification: Notification) {
        info!("Received email {}", notification.subject);

        let command = Command::classify(&notification.subject);
        let Some(action) = command.action() else {
            info!("Skipping. Not monitoring related");
            return;
        };

        if !is_known_subject(&notification.subject) {
            warn!(
                subject = %notification.subject,
                command = ?command,
                "Unrecognized subject variant; acting on it anyway"
            );
        }

        match self.sync(action).await {
            Ok(()) => info!(command = ?command, "Sync complete"),
            Err(e) => {
                error!("Failed to sync: {e}");
                self.report_failure(&e).await;
            }
        }
    }
}

fn confirmation_body(action: Action) -> &'static str {
    match action {
        Action::Arm => "Armed",
        Action::Disarm => "Disarmed",
    }
}
