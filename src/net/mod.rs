//! Networking: the gateway HTTP client, its refresh coordinator, and the
//! auth wire types.

pub mod client;
pub mod refresh;
pub mod types;
