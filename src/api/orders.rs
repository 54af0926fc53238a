//! Order lifecycle: create, review (accept / reject), fulfill, invoice.

use serde_json::Value;

use super::{Params, list_request};
use crate::error::ApiError;
use crate::net::client::{ApiClient, ApiRequest};

pub struct OrderApi<'a> {
    client: &'a ApiClient,
}

impl<'a> OrderApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `GET /orders/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn list(&self, params: Params<'_>) -> Result<Value, ApiError> {
        self.client.send_json(list_request("orders/", params)).await
    }

    /// `GET /orders/{id}/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn get(&self, id: i64) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::get(format!("orders/{id}/"))).await
    }

    /// `POST /orders/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn create(&self, order: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post("orders/").json(order)).await
    }

    /// `PATCH /orders/{id}/`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn update(&self, id: i64, changes: Value) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::patch(format!("orders/{id}/")).json(changes)).await
    }

    /// `POST /orders/{id}/accept/`.
    ///
    /// # Errors
    ///
    /// `Api` when the order is not pending.
    pub async fn accept(&self, id: i64) -> Result<Value, ApiError> {
        self.transition(id, "accept").await
    }

    /// `POST /orders/{id}/reject/`.
    ///
    /// # Errors
    ///
    /// `Api` when the order is not pending.
    pub async fn reject(&self, id: i64) -> Result<Value, ApiError> {
        self.transition(id, "reject").await
    }

    /// `POST /orders/{id}/fulfill/`.
    ///
    /// # Errors
    ///
    /// `Api` when the order has not been accepted.
    pub async fn fulfill(&self, id: i64) -> Result<Value, ApiError> {
        self.transition(id, "fulfill").await
    }

    /// `GET /orders/{id}/invoice/` as raw PDF bytes.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn invoice(&self, id: i64) -> Result<Vec<u8>, ApiError> {
        self.client.send_bytes(ApiRequest::get(format!("orders/{id}/invoice/"))).await
    }

    async fn transition(&self, id: i64, action: &str) -> Result<Value, ApiError> {
        self.client.send_json(ApiRequest::post(format!("orders/{id}/{action}/"))).await
    }
}
