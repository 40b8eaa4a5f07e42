//! Error types for alarm-sync.

/// Top-level error type for the bridge process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Remote actuation API errors.
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("Login failed with status {status}: {message}")]
    Auth { status: u16, message: String },

    #[error("Login request failed: {0}")]
    AuthRequest(String),

    #[error("Client verification failed: {reason}")]
    Verification { reason: String },

    #[error("Network discovery failed: {reason}")]
    Discovery { reason: String },

    #[error("Not authenticated. Call login() first")]
    NotAuthenticated,

    #[error("Failed to {action} network {network_id} with status {status} and message: {message}")]
    Actuation {
        action: &'static str,
        network_id: u64,
        status: u16,
        message: String,
    },

    #[error("Failed to {action} network {network_id}: {reason}")]
    ActuationRequest {
        action: &'static str,
        network_id: u64,
        reason: String,
    },
}

impl ActuatorError {
    /// Network responsible for a failed arm/disarm, if any.
    pub fn network_id(&self) -> Option<u64> {
        match self {
            Self::Actuation { network_id, .. } | Self::ActuationRequest { network_id, .. } => {
                Some(*network_id)
            }
            _ => None,
        }
    }
}

/// Mailbox errors, inbound and outbound.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mailbox connection failed: {0}")]
    Connection(String),

    #[error("Failed to send email to {recipient}: {reason}")]
    Delivery { recipient: String, reason: String },

    #[error("Failed to parse message {uid}: {reason}")]
    Parse { uid: u32, reason: String },
}

/// Event bridge lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Bridge already active")]
    AlreadyActive,

    #[error("Notification watch ended: {0}")]
    WatchEnded(#[from] MailError),
}

/// Result type alias for the bridge.
pub type Result<T> = std::result::Result<T, Error>;
