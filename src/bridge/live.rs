//! Production collaborators: IMAP inbox, Blink REST, SMTP.

use std::sync::Arc;

use async_trait::async_trait;

use super::Connector;
use crate::actuator::{Actuator, BlinkClient, VerificationPrompt};
use crate::config::BridgeConfig;
use crate::error::{ActuatorError, MailError};
use crate::mail::{ImapMailbox, Notifier, SmtpNotifier};

pub struct LiveConnector {
    config: BridgeConfig,
    prompt: Arc<dyn VerificationPrompt>,
}

impl LiveConnector {
    pub fn new(config: BridgeConfig, prompt: Arc<dyn VerificationPrompt>) -> Self {
        Self { config, prompt }
    }
}

#[async_trait]
impl Connector for LiveConnector {
    type Mailbox = ImapMailbox;

    async fn connect_mailbox(&self) -> Result<ImapMailbox, MailError> {
        ImapMailbox::connect(self.config.mail.clone()).await
    }

    async fn connect_actuator(&self) -> Result<Arc<dyn Actuator>, ActuatorError> {
        let client = BlinkClient::new(self.config.blink.clone(), Arc::clone(&self.prompt));
        Ok(Arc::new(client.login().await?))
    }

    fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::new(SmtpNotifier::new(self.config.mail.clone()))
    }
}
