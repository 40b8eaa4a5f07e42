//! Shared fakes: an in-process Blink API and channel-driven mail collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use alarm_sync::actuator::VerificationPrompt;
use alarm_sync::config::{BlinkConfig, NetworkSelection};
use alarm_sync::error::{ActuatorError, MailError};
use alarm_sync::mail::{Mailbox, Notifier, RawMessage};

/// Maximum time any test is allowed to run before we consider it hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const PASSWORD: &str = "hunter2";
pub const TOKEN: &str = "tok-123";
pub const TIER: &str = "u099";

/// Behaviour and call log of the fake Blink API.
#[derive(Debug, Default)]
pub struct BlinkState {
    pub verification_required: bool,
    pub valid_pin: String,
    pub networks: Vec<Value>,
    pub failing_network: Option<u64>,
    /// `arm:<id>` / `disarm:<id>` in arrival order.
    pub actions: Vec<String>,
    pub pins: Vec<String>,
    pub logins: usize,
}

#[derive(Clone, Default)]
pub struct FakeBlink {
    pub state: Arc<Mutex<BlinkState>>,
}

impl FakeBlink {
    pub fn with_networks(ids: &[u64]) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().networks = ids
            .iter()
            .map(|id| json!({ "id": id, "name": format!("Site {id}"), "armed": false }))
            .collect();
        fake
    }

    pub fn require_pin(self, pin: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.verification_required = true;
            state.valid_pin = pin.to_string();
        }
        self
    }

    pub fn fail_network(self, id: u64) -> Self {
        self.state.lock().unwrap().failing_network = Some(id);
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().unwrap().actions.clone()
    }

    /// Serve on a random port. Post-login routes live under `/<tier>` so
    /// tests see the client follow the assigned tier.
    pub async fn serve(&self) -> u16 {
        let tiered = Router::new()
            .route(
                "/api/v4/account/{account_id}/client/{client_id}/pin/verify",
                post(verify_pin),
            )
            .route("/networks", get(networks))
            .route("/network/{id}/{action}", post(actuate));

        let app = Router::new()
            .route("/api/v5/account/login", post(login))
            .nest(&format!("/{TIER}"), tiered)
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("token_auth")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == TOKEN)
}

async fn login(State(fake): State<FakeBlink>, Json(body): Json<Value>) -> Response {
    let mut state = fake.state.lock().unwrap();
    state.logins += 1;
    if body["password"] != PASSWORD {
        return (StatusCode::UNAUTHORIZED, "bad credentials").into_response();
    }
    Json(json!({
        "account": {
            "account_id": 11,
            "user_id": 5,
            "client_id": 22,
            "client_verification_required": state.verification_required,
            "tier": TIER
        },
        "auth": { "token": TOKEN }
    }))
    .into_response()
}

async fn verify_pin(
    State(fake): State<FakeBlink>,
    Path((account_id, client_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) || account_id != "11" || client_id != "22" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut state = fake.state.lock().unwrap();
    let pin = body["pin"].as_str().unwrap_or_default().to_string();
    let valid = pin == state.valid_pin;
    state.pins.push(pin);
    Json(json!({ "valid": valid })).into_response()
}

async fn networks(State(fake): State<FakeBlink>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let state = fake.state.lock().unwrap();
    Json(json!({ "networks": state.networks })).into_response()
}

async fn actuate(
    State(fake): State<FakeBlink>,
    Path((id, action)): Path<(u64, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut state = fake.state.lock().unwrap();
    state.actions.push(format!("{action}:{id}"));
    if state.failing_network == Some(id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(json!({ "id": id })).into_response()
}

pub fn blink_config(port: u16, networks: NetworkSelection) -> BlinkConfig {
    BlinkConfig {
        client_id: "client-1".into(),
        email: "me@example.com".into(),
        password: SecretString::from(PASSWORD),
        networks,
        verified: false,
        api_base: format!("http://127.0.0.1:{port}"),
        tier_url: format!("http://127.0.0.1:{port}/{{tier}}"),
    }
}

/// Prompt that answers with a fixed code.
pub struct FixedPin(pub String);

#[async_trait]
impl VerificationPrompt for FixedPin {
    async fn read_code(&self) -> Result<String, ActuatorError> {
        Ok(self.0.clone())
    }
}

/// Mailbox fed by the test: each batch sent is one new-mail signal.
/// Dropping the sender ends the watch with a connection error.
pub struct ChannelMailbox {
    signals: mpsc::UnboundedReceiver<Vec<RawMessage>>,
    pending: VecDeque<Vec<RawMessage>>,
}

impl ChannelMailbox {
    pub fn new() -> (Self, mpsc::UnboundedSender<Vec<RawMessage>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                signals: rx,
                pending: VecDeque::new(),
            },
            tx,
        )
    }
}

#[async_trait]
impl Mailbox for ChannelMailbox {
    async fn wait_for_mail(&mut self) -> Result<(), MailError> {
        match self.signals.recv().await {
            Some(batch) => {
                self.pending.push_back(batch);
                Ok(())
            }
            None => Err(MailError::Connection("connection dropped".into())),
        }
    }

    async fn fetch_unseen_from(&mut self, _sender: &str) -> Result<Vec<RawMessage>, MailError> {
        Ok(self.pending.pop_front().unwrap_or_default())
    }
}

/// A sent email: (recipient, subject, body).
pub type SentEmail = (String, String, String);

/// Notifier that forwards every send to the test.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<SentEmail>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SentEmail>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let _ = self
            .tx
            .send((recipient.into(), subject.into(), body.into()));
        Ok(())
    }
}

pub fn status_email(uid: u32, subject: &str) -> RawMessage {
    RawMessage {
        uid,
        bytes: format!(
            "From: SimpliSafe <no-reply@info.simplisafe.com>\r\n\
             To: me@gmail.com\r\n\
             Subject: {subject}\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             Status changed.\r\n"
        )
        .into_bytes(),
    }
}
