//! Warranty issue, activation, verification and claims.

use serde_json::Value;

use super::{Params, list_request, require_segment};
use crate::error::ApiError;
use crate::net::client::{ApiClient, ApiRequest};

pub struct WarrantyApi<'a> {
    client: &'a ApiClient,
}

impl<'a> WarrantyApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `GET /warranty/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn list(&self, params: Params<'_>) -> Result<Value, ApiError> {
        self.client.send_json(list_request("warranty/", params)).await
    }

    /// `POST /warranty/claim/`: a consumer claims the warranty on a serial.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn claim(&self, request: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post("warranty/claim/").json(request)).await
    }

    /// `POST /warranty/issue/`: admin or wholesaler issues a warranty.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn issue(&self, request: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post("warranty/issue/").json(request)).await
    }

    /// `POST /warranty/activate/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn activate(&self, request: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post("warranty/activate/").json(request)).await
    }

    /// `GET /warranty/verify/{serial}/`. Public: no sign-in required.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank serial; `Api { status: 404, .. }` for an
    /// unknown one.
    pub async fn verify(&self, serial_number: &str) -> Result<Value, ApiError> {
        let serial_number = require_segment("serial_number", serial_number)?;
        self.client
            .send_json(ApiRequest::get(format!("warranty/verify/{serial_number}/")).public())
            .await
    }

    /// `GET /warranty/claims/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn claims(&self, params: Params<'_>) -> Result<Value, ApiError> {
        self.client.send_json(list_request("warranty/claims/", params)).await
    }

    /// `POST /warranty/claims/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn create_claim(&self, claim: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post("warranty/claims/").json(claim)).await
    }

    /// `GET /warranty/{id}/certificate/` as raw PDF bytes.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn certificate(&self, id: i64) -> Result<Vec<u8>, ApiError> {
        self.client.send_bytes(ApiRequest::get(format!("warranty/{id}/certificate/"))).await
    }
}
