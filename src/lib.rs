//! Client-side session slice for the Lithovolt warranty and distribution
//! platform.
//!
//! ARCHITECTURE
//! ============
//! The backend REST service owns every business rule. This crate owns the
//! pieces a client needs around it:
//! - `session`: the persisted authenticated session and its store.
//! - `net`: the gateway HTTP client (bearer injection, 401 policies,
//!   single-flight token refresh).
//! - `api`: typed bindings for the backend endpoints.
//! - `gate`: role-based navigation tree selection.
//! - `toast`: ephemeral notification queue with timed dismissal.
//!
//! Stores are explicit handles. Nothing here is a process-wide singleton, so
//! tests and embedders create as many isolated instances as they need.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod net;
pub mod session;
pub mod toast;

#[cfg(test)]
mod test_support;

pub use config::{ClientConfig, ClientVariant, ConfigError};
pub use error::ApiError;
pub use gate::{Access, NavTree, RouteGate};
pub use net::client::{ApiClient, ApiRequest, AuthFailurePolicy, FormField};
pub use session::model::{Role, Session, User};
pub use session::storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
pub use session::store::SessionStore;
pub use toast::{NewToast, Toast, ToastId, ToastKind, ToastStore};
