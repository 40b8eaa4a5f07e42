//! Wire types for the camera platform's REST API.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub unique_id: &'a str,
    pub reauth: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub account: Account,
    pub auth: AuthToken,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    #[serde(deserialize_with = "string_or_number")]
    pub account_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub client_id: String,
    #[serde(default)]
    pub client_verification_required: bool,
    pub tier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthToken {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct PinRequest<'a> {
    pub pin: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PinResponse {
    #[serde(default)]
    pub valid: bool,
}

/// A registered site the platform can arm or disarm independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub armed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworksResponse {
    #[serde(default)]
    pub networks: Vec<Network>,
}

/// The platform returns ids as numbers on some API versions and strings on others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
