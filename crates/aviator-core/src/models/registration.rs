//! Account registration bodies (OTP email verification and user creation).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct OtpRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OtpResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailExistsRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailExistsResponse {
    #[serde(default)]
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: String,
}
