//! Session data model: user identity, roles, and the session record.
//!
//! DESIGN
//! ======
//! `Session` keeps its fields private so the authentication invariant holds
//! by construction: a session is authenticated exactly when it carries an
//! access token, and it only carries one alongside a resolved user.
//!
//! The user record is mostly opaque. Only `id`, `email` and `role` are typed;
//! every other field the backend sends is kept in `extra` and written back
//! unchanged.

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// ROLE
// =============================================================================

/// Backend user role. The set is open: unrecognized values are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Wholesaler,
    Consumer,
    Retailer,
    Other(String),
}

impl Role {
    /// Wire representation (`"ADMIN"`, `"WHOLESALER"`, ...).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "ADMIN",
            Self::Wholesaler => "WHOLESALER",
            Self::Consumer => "CONSUMER",
            Self::Retailer => "RETAILER",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "ADMIN" => Self::Admin,
            "WHOLESALER" => Self::Wholesaler,
            "CONSUMER" => Self::Consumer,
            "RETAILER" => Self::Retailer,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// USER
// =============================================================================

/// Identity record returned by login, OTP verification and `/users/me/`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    /// Remaining backend fields (`first_name`, `phone`, `is_verified`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    #[must_use]
    pub fn new(id: i64, email: Option<&str>, role: Option<Role>) -> Self {
        Self { id, email: email.map(str::to_owned), role, extra: Map::new() }
    }

    /// Look up an untyped backend field such as `first_name`.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Shallow-merge `patch` into this user and return the result.
    ///
    /// # Errors
    ///
    /// Returns an error when the patch would leave the record without a
    /// valid `id` or with a non-string `role`/`email`.
    pub fn merged(&self, patch: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(fields))
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Current authentication state of this client.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    user: Option<User>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl Session {
    /// An authenticated session. `refresh_token` is absent for web logins.
    #[must_use]
    pub fn authenticated(user: User, access_token: String, refresh_token: Option<String>) -> Self {
        Self { user: Some(user), access_token: Some(access_token), refresh_token }
    }

    /// Rebuild a session from possibly inconsistent persisted parts.
    ///
    /// A token without a user cannot form a session, so it is dropped.
    #[must_use]
    pub(crate) fn from_parts(user: Option<User>, access_token: Option<String>, refresh_token: Option<String>) -> Self {
        match (user, access_token) {
            (Some(user), Some(access)) => Self::authenticated(user, access, refresh_token),
            (user, _) => Self { user, access_token: None, refresh_token: None },
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn role(&self) -> Option<&Role> {
        self.user.as_ref().and_then(|u| u.role.as_ref())
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub(crate) fn replace_user(&mut self, user: User) {
        self.user = Some(user);
    }

    /// Swap in a refreshed access token. Returns `false` (and changes nothing)
    /// when the session was logged out in the meantime.
    pub(crate) fn rotate(&mut self, access_token: String, refresh_token: Option<String>) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        self.access_token = Some(access_token);
        if let Some(refresh) = refresh_token {
            self.refresh_token = Some(refresh);
        }
        true
    }
}
