//! Session endpoint bodies.

use serde::{Deserialize, Serialize};

/// Body for `POST /api/sessions/getRefreshToken`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Reply from `getRefreshToken`. An empty `token` means the credentials were refused.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub token: String,
}

/// Body for `POST /api/sessions/login`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest<'a> {
    #[serde(rename = "refreshToken")]
    pub refresh_token: &'a str,
}

/// Reply from the refresh-token exchange.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub success: bool,
}
