//! Authenticated session: data model, durable storage, and the store that
//! owns both.
//!
//! SYSTEM CONTEXT
//! ==============
//! The gateway client reads tokens from the store at send time, the route
//! gate subscribes to it, and login/profile flows mutate it. Nothing else
//! writes session state.

pub mod model;
pub mod storage;
pub mod store;
