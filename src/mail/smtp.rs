//! Outbound mail over SMTPS, authenticated as the watched account.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::{error, info};

use super::Notifier;
use crate::config::MailConfig;
use crate::error::MailError;

/// Sends plain-text mail from the configured account.
pub struct SmtpNotifier {
    config: MailConfig,
}

impl SmtpNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!("Sending email to {recipient}");

        let email = build_message(&self.config.address, recipient, subject, body)?;
        let config = self.config.clone();
        let to = recipient.to_string();

        let result = tokio::task::spawn_blocking(move || {
            let creds = Credentials::new(
                config.address.clone(),
                config.password.expose_secret().to_string(),
            );
            let transport = SmtpTransport::relay(&config.smtp_host)
                .map_err(|e| delivery_error(&to, format!("SMTP relay error: {e}")))?
                .port(config.smtp_port)
                .credentials(creds)
                .build();
            transport
                .send(&email)
                .map(|_| ())
                .map_err(|e| delivery_error(&to, format!("SMTP send failed: {e}")))
        })
        .await
        .map_err(|e| delivery_error(recipient, format!("SMTP task panicked: {e}")))?;

        if let Err(e) = &result {
            error!("{e}");
        }
        result
    }
}

/// Build a plain-text message; addresses are validated here.
pub fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, MailError> {
    Message::builder()
        .from(
            from.parse()
                .map_err(|e| delivery_error(to, format!("Invalid from address: {e}")))?,
        )
        .to(to
            .parse()
            .map_err(|e| delivery_error(to, format!("Invalid to address: {e}")))?)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| delivery_error(to, format!("Failed to build email: {e}")))
}

fn delivery_error(recipient: &str, reason: String) -> MailError {
    MailError::Delivery {
        recipient: recipient.to_string(),
        reason,
    }
}
