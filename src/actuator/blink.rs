//! Blink REST client: login, optional PIN verification, network discovery,
//! and arm/disarm fanned out across every selected network.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

use super::model::{
    Account, LoginRequest, LoginResponse, Network, NetworksResponse, PinRequest, PinResponse,
};
use super::{Action, Actuator, VerificationPrompt};
use crate::config::{BlinkConfig, NetworkSelection};
use crate::error::ActuatorError;

/// Auth header expected by every post-login endpoint.
const TOKEN_HEADER: &str = "TOKEN_AUTH";

/// Performs the credential exchange. Holds no session state itself.
pub struct BlinkClient {
    config: BlinkConfig,
    http: reqwest::Client,
    prompt: Arc<dyn VerificationPrompt>,
}

impl BlinkClient {
    pub fn new(config: BlinkConfig, prompt: Arc<dyn VerificationPrompt>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            prompt,
        }
    }

    /// Log in, verify the client if the server asks for it, and discover networks.
    pub async fn login(&self) -> Result<BlinkSession, ActuatorError> {
        info!("Logging in to Blink API");

        let body = LoginRequest {
            email: &self.config.email,
            password: self.config.password.expose_secret(),
            unique_id: &self.config.client_id,
            reauth: self.config.verified,
        };

        let resp = self
            .http
            .post(format!("{}/api/v5/account/login", self.config.api_base))
            .json(&body)
            .send()
            .await
            .map_err(|e| ActuatorError::AuthRequest(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Blink login rejected: {message}");
            return Err(ActuatorError::Auth {
                status: status.as_u16(),
                message,
            });
        }

        let data: LoginResponse = resp
            .json()
            .await
            .map_err(|e| ActuatorError::AuthRequest(format!("invalid login response: {e}")))?;

        if data.auth.token.is_empty() {
            return Err(ActuatorError::AuthRequest(
                "login response carried an empty token".into(),
            ));
        }

        let base_url = self.config.tier_base(&data.account.tier);
        let token = data.auth.token;
        debug!(tier = %data.account.tier, base_url = %base_url, "Blink tier assigned");

        if data.account.client_verification_required {
            self.verify_client(&base_url, &token, &data.account).await?;
        }

        let networks = self.discover(&base_url, &token).await?;

        Ok(BlinkSession::new(self.http.clone(), base_url, token, networks))
    }

    async fn verify_client(
        &self,
        base_url: &str,
        token: &str,
        account: &Account,
    ) -> Result<(), ActuatorError> {
        info!("Blink requires client verification");

        let pin = self.prompt.read_code().await?;
        if pin.is_empty() {
            return Err(ActuatorError::Verification {
                reason: "empty PIN".into(),
            });
        }

        let resp = self
            .http
            .post(format!(
                "{base_url}/api/v4/account/{}/client/{}/pin/verify",
                account.account_id, account.client_id
            ))
            .header(TOKEN_HEADER, token)
            .json(&PinRequest { pin: &pin })
            .send()
            .await
            .map_err(|e| ActuatorError::Verification {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ActuatorError::Verification {
                reason: format!("PIN verification failed with status {status}: {message}"),
            });
        }

        let data: PinResponse = resp.json().await.map_err(|e| ActuatorError::Verification {
            reason: format!("invalid verification response: {e}"),
        })?;
        if !data.valid {
            return Err(ActuatorError::Verification {
                reason: "PIN invalid or expired".into(),
            });
        }

        info!("Client successfully verified");
        Ok(())
    }

    async fn discover(&self, base_url: &str, token: &str) -> Result<Vec<Network>, ActuatorError> {
        let resp = self
            .http
            .get(format!("{base_url}/networks"))
            .header(TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|e| ActuatorError::Discovery {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ActuatorError::Discovery {
                reason: format!("failed to get networks with status {status}"),
            });
        }

        let data: NetworksResponse = resp.json().await.map_err(|e| ActuatorError::Discovery {
            reason: format!("invalid networks response: {e}"),
        })?;

        let networks = select_networks(data.networks, &self.config.networks)?;
        info!(
            count = networks.len(),
            names = %networks.iter().map(|n| n.name.as_str()).collect::<Vec<_>>().join(", "),
            "Discovered Blink networks"
        );
        Ok(networks)
    }
}

/// Apply the configured selection to the account's network listing.
pub fn select_networks(
    listed: Vec<Network>,
    selection: &NetworkSelection,
) -> Result<Vec<Network>, ActuatorError> {
    if listed.is_empty() {
        return Err(ActuatorError::Discovery {
            reason: "account has no networks".into(),
        });
    }

    let selected: Vec<Network> = listed
        .into_iter()
        .filter(|n| selection.matches(&n.name))
        .collect();

    match (selected.is_empty(), selection) {
        (true, NetworkSelection::Named(name)) => Err(ActuatorError::Discovery {
            reason: format!("{name} is missing from networks"),
        }),
        _ => Ok(selected),
    }
}

/// An established session: token, tier endpoint, and the networks to act on.
///
/// The token is never refreshed. Once the platform rejects it, every call
/// fails until a fresh `BlinkClient::login`.
#[derive(Clone)]
pub struct BlinkSession {
    http: reqwest::Client,
    base_url: String,
    token: String,
    networks: Vec<Network>,
}

impl BlinkSession {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        token: String,
        networks: Vec<Network>,
    ) -> Self {
        Self {
            http,
            base_url,
            token,
            networks,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    /// Send `action` to every network concurrently and wait for all of them.
    async fn actuate(&self, action: Action) -> Result<(), ActuatorError> {
        if self.token.is_empty() || self.networks.is_empty() {
            return Err(ActuatorError::NotAuthenticated);
        }

        info!(
            action = action.as_str(),
            networks = self.networks.len(),
            "Sending Blink {} request",
            action.as_str()
        );

        let results = join_all(
            self.networks
                .iter()
                .map(|network| self.actuate_network(network, action)),
        )
        .await;

        let mut failures: Vec<ActuatorError> =
            results.into_iter().filter_map(Result::err).collect();

        if failures.is_empty() {
            info!(action = action.as_str(), "Blink {} success", action.as_str());
            return Ok(());
        }

        error!(
            action = action.as_str(),
            failed = failures.len(),
            total = self.networks.len(),
            "Blink {} failed",
            action.as_str()
        );
        Err(failures.swap_remove(0))
    }

    async fn actuate_network(&self, network: &Network, action: Action) -> Result<(), ActuatorError> {
        let resp = self
            .http
            .post(format!(
                "{}/network/{}/{}",
                self.base_url,
                network.id,
                action.as_str()
            ))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| ActuatorError::ActuationRequest {
                action: action.as_str(),
                network_id: network.id,
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            debug!(network_id = network.id, network = %network.name, "Network {} ok", action.as_str());
            return Ok(());
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!("Blink rejected the session token; a fresh login is required");
        }

        let message = resp.text().await.unwrap_or_default();
        warn!(
            network_id = network.id,
            network = %network.name,
            status = status.as_u16(),
            "Network {} failed",
            action.as_str()
        );
        Err(ActuatorError::Actuation {
            action: action.as_str(),
            network_id: network.id,
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Actuator for BlinkSession {
    async fn arm(&self) -> Result<(), ActuatorError> {
        self.actuate(Action::Arm).await
    }

    async fn disarm(&self) -> Result<(), ActuatorError> {
        self.actuate(Action::Disarm).await
    }
}
