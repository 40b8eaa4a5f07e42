//! Configuration types, built from environment variables.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Sender address of the alarm vendor's status emails.
pub const DEFAULT_ALARM_SENDER: &str = "no-reply@info.simplisafe.com";

/// Login endpoint base used before the server assigns a tier.
pub const DEFAULT_BLINK_API_BASE: &str = "https://rest-prod.immedia-semi.com";

/// Tier endpoint template; `{tier}` is replaced after login.
pub const DEFAULT_BLINK_TIER_URL: &str = "https://rest-{tier}.immedia-semi.com";

/// Network name that selects every discovered network.
pub const ALL_NETWORKS: &str = "*";

/// Mailbox settings shared by the inbound watch and outbound send.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub address: String,
    pub password: SecretString,
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub mailbox: String,
    /// Applies to TCP connect and to reads until the mailbox is selected.
    pub auth_timeout: Duration,
}

/// Which discovered networks arm/disarm applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkSelection {
    All,
    Named(String),
}

impl NetworkSelection {
    fn parse(value: &str) -> Self {
        if value == ALL_NETWORKS {
            Self::All
        } else {
            Self::Named(value.to_string())
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(wanted) => wanted == name,
        }
    }
}

/// Remote actuation platform settings.
#[derive(Debug, Clone)]
pub struct BlinkConfig {
    pub client_id: String,
    pub email: String,
    pub password: SecretString,
    pub networks: NetworkSelection,
    /// Sent as `reauth` on login.
    pub verified: bool,
    pub api_base: String,
    pub tier_url: String,
}

impl BlinkConfig {
    /// Base endpoint for the server-assigned tier.
    pub fn tier_base(&self, tier: &str) -> String {
        self.tier_url.replace("{tier}", tier)
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mail: MailConfig,
    pub blink: BlinkConfig,
    /// Only emails from this address are considered.
    pub alarm_sender: String,
    /// Recipient of sync confirmations and failure reports.
    pub report_recipient: String,
    pub log_dir: Option<String>,
}

impl BridgeConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };
        let optional = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let address = required("GMAIL_EMAIL")?;
        let mail_password = required("GMAIL_PASS")?;
        let client_id = required("BLINK_CLIENT")?;
        let blink_email = required("BLINK_EMAIL")?;
        let blink_password = required("BLINK_PASS")?;
        let network = required("BLINK_NETWORK")?;
        let verified = required("BLINK_VERIFIED")?.eq_ignore_ascii_case("true");

        let imap_port = parse_number(&lookup, "MAIL_IMAP_PORT", 993)?;
        let smtp_port = parse_number(&lookup, "MAIL_SMTP_PORT", 465)?;
        let auth_timeout_ms: u64 = parse_number(&lookup, "MAIL_AUTH_TIMEOUT_MS", 3000)?;

        let report_recipient = optional("REPORT_RECIPIENT", &address);

        Ok(Self {
            mail: MailConfig {
                imap_host: optional("MAIL_IMAP_HOST", "imap.gmail.com"),
                imap_port,
                smtp_host: optional("MAIL_SMTP_HOST", "smtp.gmail.com"),
                smtp_port,
                mailbox: optional("MAIL_MAILBOX", "INBOX"),
                auth_timeout: Duration::from_millis(auth_timeout_ms),
                password: SecretString::from(mail_password),
                address,
            },
            blink: BlinkConfig {
                client_id,
                email: blink_email,
                password: SecretString::from(blink_password),
                networks: NetworkSelection::parse(&network),
                verified,
                api_base: optional("BLINK_API_BASE", DEFAULT_BLINK_API_BASE),
                tier_url: optional("BLINK_TIER_URL", DEFAULT_BLINK_TIER_URL),
            },
            alarm_sender: optional("ALARM_SENDER", DEFAULT_ALARM_SENDER),
            report_recipient,
            log_dir: lookup("LOG_DIR").filter(|v| !v.trim().is_empty()),
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
