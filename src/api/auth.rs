//! Authentication flows: password login, OTP, registration, password reset.
//!
//! Login and OTP verification install the returned tokens and user in the
//! session store. These requests are public: they carry no bearer token and
//! a 401 from them is a wrong credential, not an expired session.

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

use serde_json::Value;
use tracing::{debug, info};

use super::require_field;
use crate::error::ApiError;
use crate::net::client::{ApiClient, ApiRequest};
use crate::net::types::{
    AuthResponse, Contact, Credentials, MessageResponse, OtpSendRequest, OtpSendResponse, OtpType, OtpVerifyRequest,
    PasswordResetConfirm, PasswordResetRequest, RefreshRequest, RegisterRequest,
};
use crate::session::model::User;

pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `POST /auth/login/`. On success the session is authenticated.
    ///
    /// # Errors
    ///
    /// `Validation` for blank input; `Api { status: 401, .. }` for wrong
    /// credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        require_field("email", email, "Email is required.")?;
        require_field("password", password, "Password is required.")?;
        let credentials = Credentials { email: email.trim().to_owned(), password: password.to_owned() };
        let request = ApiRequest::post("auth/login/").public().encode(&credentials)?;
        let response: AuthResponse = self.client.send_json(request).await?;
        Ok(self.establish(response))
    }

    /// `POST /auth/register/`. Does not sign in; returns the created account.
    ///
    /// # Errors
    ///
    /// `Validation` when the passwords differ; backend field errors as `Api`.
    pub async fn register(&self, registration: &RegisterRequest) -> Result<Value, ApiError> {
        require_field("email", &registration.email, "Email is required.")?;
        if registration.password != registration.password_confirm {
            return Err(ApiError::validation("password_confirm", "Passwords do not match."));
        }
        let request = ApiRequest::post("auth/register/").public().encode(registration)?;
        self.client.send_json(request).await
    }

    /// `POST /auth/otp/send/` for a login code.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty contact.
    pub async fn send_otp(&self, contact: &str) -> Result<OtpSendResponse, ApiError> {
        self.send_otp_with_type(contact, OtpType::Login).await
    }

    /// `POST /auth/otp/send/` for any purpose.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty contact.
    pub async fn send_otp_with_type(&self, contact: &str, otp_type: OtpType) -> Result<OtpSendResponse, ApiError> {
        let contact = Contact::parse(contact)?;
        let request = ApiRequest::post("auth/otp/send/")
            .public()
            .encode(&OtpSendRequest::new(&contact, otp_type))?;
        let response: OtpSendResponse = self.client.send_json(request).await?;
        debug!(?otp_type, expires_in = ?response.expires_in, "otp sent");
        Ok(response)
    }

    /// `POST /auth/otp/verify/`. On success the session is authenticated.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty contact or code; `Api { status: 400, .. }`
    /// for a wrong or expired code.
    pub async fn verify_otp(&self, contact: &str, otp_code: &str) -> Result<User, ApiError> {
        let contact = Contact::parse(contact)?;
        require_field("otp_code", otp_code, "Enter the code you received.")?;
        let request = ApiRequest::post("auth/otp/verify/")
            .public()
            .encode(&OtpVerifyRequest::new(&contact, otp_code.trim()))?;
        let response: AuthResponse = self.client.send_json(request).await?;
        Ok(self.establish(response))
    }

    /// `POST /auth/refresh/` through the client's single-flight coordinator.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when no refresh token is stored or it is rejected.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        self.client.refresh_access_token().await
    }

    /// `POST /auth/password-reset/`.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank email.
    pub async fn request_password_reset(&self, email: &str) -> Result<MessageResponse, ApiError> {
        require_field("email", email, "Email is required.")?;
        let request = ApiRequest::post("auth/password-reset/")
            .public()
            .encode(&PasswordResetRequest { email: email.trim() })?;
        self.client.send_json(request).await
    }

    /// `POST /auth/password-reset/confirm/`.
    ///
    /// # Errors
    ///
    /// `Validation` when the new passwords differ or a field is blank.
    pub async fn confirm_password_reset(
        &self,
        email: &str,
        otp_code: &str,
        new_password: &str,
        new_password_confirm: &str,
    ) -> Result<MessageResponse, ApiError> {
        require_field("email", email, "Email is required.")?;
        require_field("otp_code", otp_code, "Enter the code you received.")?;
        require_field("new_password", new_password, "Password is required.")?;
        if new_password != new_password_confirm {
            return Err(ApiError::validation("new_password_confirm", "Passwords do not match."));
        }
        let body = PasswordResetConfirm {
            email: email.trim(),
            otp_code: otp_code.trim(),
            new_password,
            new_password_confirm,
        };
        let request = ApiRequest::post("auth/password-reset/confirm/").public().encode(&body)?;
        self.client.send_json(request).await
    }

    /// `POST /auth/logout/` if signed in, then clear the local session.
    /// The server call is best effort; the local logout always happens.
    pub async fn logout(&self) {
        let session = self.client.session();
        if session.is_authenticated() {
            let request = match session.refresh_token() {
                Some(refresh) => ApiRequest::post("auth/logout/").encode(&RefreshRequest { refresh: &refresh }),
                None => Ok(ApiRequest::post("auth/logout/")),
            };
            let result = match request {
                Ok(request) => self.client.send_empty(request).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                debug!(error = %e, "server logout failed; clearing local session anyway");
            }
        }
        session.logout();
    }

    fn establish(&self, response: AuthResponse) -> User {
        let AuthResponse { access, refresh, user } = response;
        info!(user_id = user.id, role = ?user.role, "signed in");
        self.client.session().set_auth(user.clone(), access, refresh);
        user
    }
}
