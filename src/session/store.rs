//! Session store: the single owner of the authenticated session.
//!
//! DESIGN
//! ======
//! State lives in a `tokio::sync::watch` channel. Readers borrow the current
//! value without blocking writers for long, and subscribers (route gate,
//! UI layers) are woken on every mutation. Handles are cheap clones sharing
//! one channel, so the gateway client and the login flow see the same state.
//!
//! PERSISTENCE
//! ===========
//! Every mutation is written through to [`SessionStorage`] under
//! [`STORAGE_KEY`] while the channel's write lock is held, so concurrent
//! mutations reach storage in the same order they reach memory. Blocking
//! media run under `block_in_place` on multi-thread runtimes. The record
//! keeps the `{"state": {...}, "version": 0}` envelope the Lithovolt web and
//! mobile clients wrote. Logout deletes the record instead of writing an
//! empty one.

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::model::{Session, User};
use super::storage::{MemoryStorage, STORAGE_KEY, SessionStorage, StorageError};

const RECORD_VERSION: u32 = 0;

// =============================================================================
// PERSISTED RECORD
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    state: PersistedSession,
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    is_authenticated: bool,
}

/// Serialize a session into its persisted record.
pub(crate) fn encode_session(session: &Session) -> Result<String, StorageError> {
    let record = PersistedRecord {
        state: PersistedSession {
            user: session.user().cloned(),
            token: session.access_token().map(str::to_owned),
            refresh_token: session.refresh_token().map(str::to_owned),
            is_authenticated: session.is_authenticated(),
        },
        version: RECORD_VERSION,
    };
    Ok(serde_json::to_string(&record)?)
}

/// Parse a persisted record. The stored `isAuthenticated` flag is advisory;
/// authentication is recomputed from the token.
pub(crate) fn decode_session(raw: &str) -> Result<Session, StorageError> {
    let record: PersistedRecord = serde_json::from_str(raw)?;
    let state = record.state;
    if state.is_authenticated != state.token.is_some() {
        debug!(flag = state.is_authenticated, "persisted isAuthenticated disagrees with token; recomputing");
    }
    Ok(Session::from_parts(state.user, state.token, state.refresh_token))
}

// =============================================================================
// STORE
// =============================================================================

/// Shared handle to the session state. Clone freely.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<watch::Sender<Session>>,
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    /// An empty store that writes through to `storage`. Existing records in
    /// `storage` are ignored; see [`SessionStore::rehydrate`].
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self { state: Arc::new(state), storage }
    }

    /// A store backed by process memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Build a store from whatever `storage` holds. Unreadable or corrupt
    /// records are logged and the store starts empty.
    #[must_use]
    pub fn rehydrate(storage: Arc<dyn SessionStorage>) -> Self {
        let session = match storage.load(STORAGE_KEY) {
            Ok(Some(raw)) => match decode_session(&raw) {
                Ok(session) => session,
                Err(e) => {
                    warn!(error = %e, "discarding unreadable session record");
                    Session::default()
                }
            },
            Ok(None) => Session::default(),
            Err(e) => {
                warn!(error = %e, "session storage load failed; starting signed out");
                Session::default()
            }
        };
        if let Some(user) = session.user() {
            debug!(user_id = user.id, authenticated = session.is_authenticated(), "session rehydrated");
        }
        let (state, _) = watch::channel(session);
        Self { state: Arc::new(state), storage }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    /// Current access token, read live on every call.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token().map(str::to_owned)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.state.borrow().refresh_token().map(str::to_owned)
    }

    /// Receiver woken after every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Replace the whole session after a successful login, OTP verification
    /// or refresh.
    pub fn set_auth(&self, user: User, access_token: impl Into<String>, refresh_token: Option<String>) {
        let user_id = user.id;
        let session = Session::authenticated(user, access_token.into(), refresh_token);
        self.state.send_modify(|current| {
            *current = session;
            self.persist(current);
        });
        info!(user_id, "session authenticated");
    }

    /// Replace the user record only. Never authenticates a session on its own.
    pub fn set_user(&self, user: User) {
        self.state.send_modify(|current| {
            current.replace_user(user);
            self.persist(current);
        });
    }

    /// Shallow-merge profile fields into the current user. Without a user, or
    /// when the merge produces an invalid record, nothing changes.
    pub fn update_user(&self, patch: &Map<String, Value>) {
        let Some(user) = self.user() else {
            debug!("update_user ignored: no user in session");
            return;
        };
        match user.merged(patch) {
            Ok(merged) => self.set_user(merged),
            Err(e) => warn!(error = %e, "update_user rejected patch"),
        }
    }

    /// Install a refreshed access token while keeping the user. Returns
    /// `false` if the session was logged out before the refresh landed.
    pub(crate) fn apply_refresh(&self, access_token: String, refresh_token: Option<String>) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|current| {
            applied = current.rotate(access_token, refresh_token);
            if applied {
                self.persist(current);
            }
            applied
        });
        applied
    }

    /// Clear the session and delete the persisted record. Idempotent.
    pub fn logout(&self) {
        self.state.send_modify(|current| {
            if let Some(user) = current.user() {
                info!(user_id = user.id, "session cleared");
            }
            *current = Session::default();
            if let Err(e) = self.storage_io(|storage| storage.remove(STORAGE_KEY)) {
                warn!(error = %e, "session record removal failed");
            }
        });
    }

    fn persist(&self, session: &Session) {
        let result = encode_session(session).and_then(|raw| self.storage_io(|storage| storage.save(STORAGE_KEY, &raw)));
        if let Err(e) = result {
            warn!(error = %e, "session persist failed");
        }
    }

    fn storage_io<R>(&self, io: impl FnOnce(&dyn SessionStorage) -> R) -> R {
        let storage = self.storage.as_ref();
        if !storage.is_blocking() {
            return io(storage);
        }
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| io(storage))
            }
            _ => io(storage),
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.state.borrow();
        f.debug_struct("SessionStore")
            .field("authenticated", &session.is_authenticated())
            .field("user_id", &session.user().map(|u| u.id))
            .finish_non_exhaustive()
    }
}
