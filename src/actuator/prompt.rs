//! Operator prompt for the platform's one-time verification code.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::ActuatorError;

/// Source of the one-time code sent to the account owner during login.
#[async_trait]
pub trait VerificationPrompt: Send + Sync {
    async fn read_code(&self) -> Result<String, ActuatorError>;
}

/// Reads the code from a single line on stdin.
pub struct StdinPrompt;

#[async_trait]
impl VerificationPrompt for StdinPrompt {
    async fn read_code(&self) -> Result<String, ActuatorError> {
        let prompt_failed = |e: std::io::Error| ActuatorError::Verification {
            reason: format!("prompt failed: {e}"),
        };
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(b"Enter the Blink verification PIN: ")
            .await
            .map_err(prompt_failed)?;
        stderr.flush().await.map_err(prompt_failed)?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await {
            Ok(Some(line)) => Ok(line.trim().to_string()),
            Ok(None) => Err(ActuatorError::Verification {
                reason: "stdin closed before a PIN was entered".into(),
            }),
            Err(e) => Err(ActuatorError::Verification {
                reason: format!("failed to read PIN: {e}"),
            }),
        }
    }
}
