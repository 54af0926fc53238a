//! Typed bindings for the backend REST endpoints.
//!
//! Each area is a borrowed view over an [`ApiClient`], so every call shares
//! the client's session, 401 policy and refresh coordinator:
//!
//! ```ignore
//! let user = client.auth().login("dealer@example.com", "pw").await?;
//! let orders = client.orders().list(&[("status", "PENDING")]).await?;
//! ```
//!
//! Auth and profile calls are typed and update the session store. Domain
//! resources are returned as `serde_json::Value`.

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub mod admin;
pub mod auth;
pub mod inventory;
pub mod orders;
pub mod users;
pub mod warranty;

use crate::error::ApiError;
use crate::net::client::{ApiClient, ApiRequest};

pub use admin::AdminApi;
pub use auth::AuthApi;
pub use inventory::InventoryApi;
pub use orders::OrderApi;
pub use users::UserApi;
pub use warranty::WarrantyApi;

/// Query parameters for list endpoints, e.g. `&[("status", "PENDING")]`.
pub type Params<'a> = &'a [(&'a str, &'a str)];

impl ApiClient {
    #[must_use]
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    #[must_use]
    pub fn users(&self) -> UserApi<'_> {
        UserApi::new(self)
    }

    #[must_use]
    pub fn inventory(&self) -> InventoryApi<'_> {
        InventoryApi::new(self)
    }

    #[must_use]
    pub fn orders(&self) -> OrderApi<'_> {
        OrderApi::new(self)
    }

    #[must_use]
    pub fn warranty(&self) -> WarrantyApi<'_> {
        WarrantyApi::new(self)
    }

    #[must_use]
    pub fn admin(&self) -> AdminApi<'_> {
        AdminApi::new(self)
    }
}

fn list_request(path: &str, params: Params<'_>) -> ApiRequest {
    ApiRequest::get(path).query_pairs(params.iter().copied())
}

/// Reject an empty path segment before it reaches the URL.
fn require_segment<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() || value.contains('/') {
        return Err(ApiError::validation(field, format!("A valid {field} is required.")));
    }
    Ok(value)
}

fn require_field(field: &'static str, value: &str, message: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, message));
    }
    Ok(())
}
