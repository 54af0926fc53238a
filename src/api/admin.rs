//! Admin dashboard endpoints.

use serde_json::Value;

use crate::error::ApiError;
use crate::net::client::{ApiClient, ApiRequest};

pub struct AdminApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AdminApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `GET /admin/metrics/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; non-admins get `Api { status: 403, .. }`.
    pub async fn metrics(&self) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::get("admin/metrics/")).await
    }
}
