//! Event bridge. Logs both collaborators in, then routes every alarm
//! status email through `SyncHandler`.
//!
//! State machine: `Uninitialized` → `Active`. There is no way back; a
//! failed login leaves the bridge `Uninitialized` and the caller exits.

pub mod classify;
pub mod handler;
pub mod live;

pub use classify::Command;
pub use handler::{SyncHandler, SyncLabels};
pub use live::LiveConnector;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::actuator::Actuator;
use crate::config::BridgeConfig;
use crate::error::{self, ActuatorError, BridgeError, MailError};
use crate::mail::{Mailbox, NotificationWatcher, Notifier, Subscription};

/// Lifecycle of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Active,
}

/// Produces logged-in collaborators. The live stack or test fakes.
#[async_trait]
pub trait Connector: Send + Sync {
    type Mailbox: Mailbox + 'static;

    async fn connect_mailbox(&self) -> Result<Self::Mailbox, MailError>;

    async fn connect_actuator(&self) -> Result<Arc<dyn Actuator>, ActuatorError>;

    fn notifier(&self) -> Arc<dyn Notifier>;
}

/// Routing settings for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub alarm_sender: String,
    pub report_recipient: String,
    pub labels: SyncLabels,
}

impl BridgeSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            alarm_sender: config.alarm_sender.clone(),
            report_recipient: config.report_recipient.clone(),
            labels: SyncLabels::default(),
        }
    }
}

pub struct EventBridge {
    settings: BridgeSettings,
    state: BridgeState,
}

impl EventBridge {
    pub fn new(settings: BridgeSettings) -> Self {
        Self {
            settings,
            state: BridgeState::Uninitialized,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Log in to the mailbox, then the remote platform, then subscribe.
    ///
    /// Either login failing is returned as-is and the bridge stays
    /// `Uninitialized`.
    pub async fn start<C: Connector>(&mut self, connector: &C) -> error::Result<Subscription> {
        if self.state == BridgeState::Active {
            return Err(BridgeError::AlreadyActive.into());
        }

        info!("Starting");
        let mailbox = connector.connect_mailbox().await?;
        let actuator = connector.connect_actuator().await?;

        let handler = Arc::new(SyncHandler::new(
            actuator,
            connector.notifier(),
            self.settings.report_recipient.clone(),
            self.settings.labels.clone(),
        ));
        let subscription =
            NotificationWatcher::new(mailbox, self.settings.alarm_sender.clone()).subscribe(handler);

        self.state = BridgeState::Active;
        info!(
            sender = %self.settings.alarm_sender,
            report_to = %self.settings.report_recipient,
            "Bridge active"
        );
        Ok(subscription)
    }
}
