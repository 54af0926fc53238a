//! Battery models, serial numbers and stock allocation.

use serde_json::Value;

use super::{Params, list_request};
use crate::error::ApiError;
use crate::net::client::{ApiClient, ApiRequest};

pub struct InventoryApi<'a> {
    client: &'a ApiClient,
}

impl<'a> InventoryApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `GET /inventory/models/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn battery_models(&self, params: Params<'_>) -> Result<Value, ApiError> {
        self.client.send_json(list_request("inventory/models/", params)).await
    }

    /// `POST /inventory/models/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn create_battery_model(&self, model: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post("inventory/models/").json(model)).await
    }

    /// `PATCH /inventory/models/{id}/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn update_battery_model(&self, id: i64, changes: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::patch(format!("inventory/models/{id}/")).json(changes)).await
    }

    /// `DELETE /inventory/models/{id}/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn delete_battery_model(&self, id: i64) -> Result<(), ApiError> {
        self.client.send_empty(ApiRequest::delete(format!("inventory/models/{id}/"))).await
    }

    /// `GET /inventory/serials/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn serials(&self, params: Params<'_>) -> Result<Value, ApiError> {
        self.client.send_json(list_request("inventory/serials/", params)).await
    }

    /// `POST /inventory/serials/generate/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn generate_serials(&self, request: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post("inventory/serials/generate/").json(request)).await
    }

    /// `GET /inventory/allocations/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn allocations(&self, params: Params<'_>) -> Result<Value, ApiError> {
        self.client.send_json(list_request("inventory/allocations/", params)).await
    }

    /// `POST /inventory/allocations/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn allocate_stock(&self, allocation: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post("inventory/allocations/").json(allocation)).await
    }
}
