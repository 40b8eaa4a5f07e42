//! Remote actuation: arm/disarm every selected network on the camera platform.
//!
//! `BlinkClient::login` produces a `BlinkSession`, which is the live
//! `Actuator`. The bridge only sees the trait, so tests swap in fakes.

pub mod blink;
pub mod model;
pub mod prompt;

pub use blink::{BlinkClient, BlinkSession};
pub use model::Network;
pub use prompt::{StdinPrompt, VerificationPrompt};

use async_trait::async_trait;

use crate::error::ActuatorError;

/// The state change requested of the remote platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Arm,
    Disarm,
}

impl Action {
    /// Path segment and log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Disarm => "disarm",
        }
    }
}

/// An authenticated handle able to arm and disarm the remote system.
///
/// Both operations are all-or-nothing across networks: any network
/// failing fails the whole call.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn arm(&self) -> Result<(), ActuatorError>;

    async fn disarm(&self) -> Result<(), ActuatorError>;

    async fn apply(&self, action: Action) -> Result<(), ActuatorError> {
        match action {
            Action::Arm => self.arm().await,
            Action::Disarm => self.disarm().await,
        }
    }
}
