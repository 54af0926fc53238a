//! Profile, user directory and wholesaler onboarding endpoints.

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;

use serde_json::{Map, Value, json};

use super::{Params, list_request};
use crate::error::ApiError;
use crate::net::client::{ApiClient, ApiRequest, FormField};
use crate::session::model::User;

const APPLICATIONS: &str = "users/wholesaler-applications/";

/// Supporting document attached to a wholesaler application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct UserApi<'a> {
    client: &'a ApiClient,
}

impl<'a> UserApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `GET /users/me/`, replacing the stored user with the fresh record.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn me(&self) -> Result<User, ApiError> {
        let user: User = self.client.send_json(ApiRequest::get("users/me/")).await?;
        self.client.session().set_user(user.clone());
        Ok(user)
    }

    /// `PATCH /users/update_profile/` with the changed fields. The backend
    /// returns the full record, which replaces the stored user.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty patch; backend field errors as `Api`.
    pub async fn update_profile(&self, changes: &Map<String, Value>) -> Result<User, ApiError> {
        if changes.is_empty() {
            return Err(ApiError::validation("profile", "Nothing to update."));
        }
        let request = ApiRequest::patch("users/update_profile/").json(Value::Object(changes.clone()));
        let user: User = self.client.send_json(request).await?;
        self.client.session().set_user(user.clone());
        Ok(user)
    }

    /// `GET /users/wholesalers/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn wholesalers(&self) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::get("users/wholesalers/")).await
    }

    /// `GET /users/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn list(&self, params: Params<'_>) -> Result<Value, ApiError> {
        self.client.send_json(list_request("users/", params)).await
    }

    /// `POST /users/{id}/toggle_active/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn toggle_active(&self, id: i64) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post(format!("users/{id}/toggle_active/"))).await
    }

    /// `POST /users/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn create(&self, body: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post("users/").json(body)).await
    }

    /// `PATCH /users/{id}/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn update(&self, id: i64, body: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::patch(format!("users/{id}/")).json(body)).await
    }

    /// `DELETE /users/{id}/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client.send_empty(ApiRequest::delete(format!("users/{id}/"))).await
    }

    // -------------------------------------------------------------------------
    // Wholesaler applications
    // -------------------------------------------------------------------------

    /// `GET /users/wholesaler-applications/`. Applicants see their own,
    /// admins see all.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn wholesaler_applications(&self, params: Params<'_>) -> Result<Value, ApiError> {
        self.client.send_json(list_request(APPLICATIONS, params)).await
    }

    /// `GET /users/wholesaler-applications/{id}/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn wholesaler_application(&self, id: i64) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::get(format!("{APPLICATIONS}{id}/"))).await
    }

    /// `POST /users/wholesaler-applications/{id}/approve/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn approve_wholesaler_application(&self, id: i64, notes: Option<&str>) -> Result<Value, ApiError> {
        self.review_application(id, "approve", notes).await
    }

    /// `POST /users/wholesaler-applications/{id}/reject/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn reject_wholesaler_application(&self, id: i64, notes: Option<&str>) -> Result<Value, ApiError> {
        self.review_application(id, "reject", notes).await
    }

    /// `POST /users/wholesaler-applications/` as `multipart/form-data`.
    /// Null and empty string values are left out, as the web form does.
    ///
    /// # Errors
    ///
    /// `Validation` when no field carries a value; otherwise any [`ApiError`].
    pub async fn submit_wholesaler_application(
        &self,
        fields: &Map<String, Value>,
        document: Option<Document>,
    ) -> Result<Value, ApiError> {
        let mut parts: Vec<FormField> = fields
            .iter()
            .filter_map(|(name, value)| form_value(value).map(|value| FormField::text(name.as_str(), value)))
            .collect();
        if parts.is_empty() {
            return Err(ApiError::validation("application", "Nothing to submit."));
        }
        if let Some(Document { file_name, bytes }) = document {
            parts.push(FormField::file("document", file_name, bytes));
        }
        self.client.send_json(ApiRequest::post(APPLICATIONS).multipart(parts)).await
    }

    async fn review_application(&self, id: i64, action: &str, notes: Option<&str>) -> Result<Value, ApiError> {
        let body = notes.map_or_else(|| json!({}), |notes| json!({ "notes": notes }));
        let request = ApiRequest::post(format!("{APPLICATIONS}{id}/{action}/")).json(body);
        self.client.send_json(request).await
    }
}

fn form_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
