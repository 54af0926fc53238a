//! Wire types for the backend auth endpoints.
//!
//! Domain resources (orders, warranties, inventory) stay untyped
//! `serde_json::Value`: the backend owns their shape and this crate only
//! relays them.

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::session::model::User;

// =============================================================================
// LOGIN / REFRESH
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Body of a successful login or OTP verification.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Body of `POST /auth/refresh/`. `refresh` is present only when the backend
/// rotates refresh tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirm: String,
}

// =============================================================================
// OTP
// =============================================================================

/// Where an OTP is delivered. A contact containing `@` is an email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contact {
    Email(String),
    Phone(String),
}

impl Contact {
    /// Classify a free-form contact string.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty contact.
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let contact = raw.trim();
        if contact.is_empty() {
            return Err(ApiError::validation("contact", "Email or phone is required."));
        }
        if contact.contains('@') {
            Ok(Self::Email(contact.to_owned()))
        } else {
            Ok(Self::Phone(contact.to_owned()))
        }
    }

    fn split(&self) -> (Option<&str>, Option<&str>) {
        match self {
            Self::Email(email) => (Some(email.as_str()), None),
            Self::Phone(phone) => (None, Some(phone.as_str())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpType {
    #[default]
    Login,
    Verification,
    PasswordReset,
}

#[derive(Debug, Serialize)]
pub(crate) struct OtpSendRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    pub otp_type: OtpType,
}

impl<'a> OtpSendRequest<'a> {
    pub(crate) fn new(contact: &'a Contact, otp_type: OtpType) -> Self {
        let (email, phone) = contact.split();
        Self { email, phone, otp_type }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct OtpVerifyRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    pub otp_code: &'a str,
}

impl<'a> OtpVerifyRequest<'a> {
    pub(crate) fn new(contact: &'a Contact, otp_code: &'a str) -> Self {
        let (email, phone) = contact.split();
        Self { email, phone, otp_code }
    }
}

/// Body of `POST /auth/otp/send/`. `otp` is only echoed to admin callers.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpSendResponse {
    pub message: String,
    #[serde(default)]
    pub otp: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u32>,
}

// =============================================================================
// PASSWORD RESET
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct PasswordResetRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordResetConfirm<'a> {
    pub email: &'a str,
    pub otp_code: &'a str,
    pub new_password: &'a str,
    pub new_password_confirm: &'a str,
}

/// Generic `{"message": "..."}` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
