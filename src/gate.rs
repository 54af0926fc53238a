//! Role-based navigation gate.
//!
//! Picks which navigation tree a client shows from the session alone:
//!
//! ```text
//! not authenticated ──▶ Unauthenticated   (/login)
//! ADMIN             ──▶ Admin             (/admin)
//! WHOLESALER        ──▶ Wholesaler        (/wholesaler)
//! anything else     ──▶ Consumer          (/)
//! ```
//!
//! Authentication is checked first, so a stale role on a signed-out session
//! never opens a privileged tree. Roles the client does not recognize (and
//! sessions with no role at all) land in the consumer tree.

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;

use tokio::sync::watch;
use tracing::debug;

use crate::session::model::{Role, Session};
use crate::session::store::SessionStore;

/// Top-level navigation subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavTree {
    Unauthenticated,
    Admin,
    Wholesaler,
    Consumer,
}

impl NavTree {
    /// Select the tree for `session`.
    #[must_use]
    pub fn resolve(session: &Session) -> Self {
        if !session.is_authenticated() {
            return Self::Unauthenticated;
        }
        match session.role() {
            Some(Role::Admin) => Self::Admin,
            Some(Role::Wholesaler) => Self::Wholesaler,
            // Consumer, Retailer, unknown roles and a missing role.
            Some(Role::Consumer | Role::Retailer | Role::Other(_)) | None => Self::Consumer,
        }
    }

    /// Route the tree opens on.
    #[must_use]
    pub fn entry_path(self) -> &'static str {
        match self {
            Self::Unauthenticated => "/login",
            Self::Admin => "/admin",
            Self::Wholesaler => "/wholesaler",
            Self::Consumer => "/",
        }
    }
}

impl std::fmt::Display for NavTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Admin => "admin",
            Self::Wholesaler => "wholesaler",
            Self::Consumer => "consumer",
        };
        f.write_str(name)
    }
}

/// Outcome of a protected-route check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    RedirectToLogin,
}

/// Check a route that only `allowed` roles may open. An empty list admits
/// any authenticated session.
#[must_use]
pub fn guard(session: &Session, allowed: &[Role]) -> Access {
    if !session.is_authenticated() {
        return Access::RedirectToLogin;
    }
    if allowed.is_empty() {
        return Access::Granted;
    }
    match session.role() {
        Some(role) if allowed.contains(role) => Access::Granted,
        _ => Access::RedirectToLogin,
    }
}

/// Follows a session store and re-resolves the tree on every change.
#[derive(Debug)]
pub struct RouteGate {
    rx: watch::Receiver<Session>,
    current: NavTree,
}

impl RouteGate {
    #[must_use]
    pub fn new(store: &SessionStore) -> Self {
        let rx = store.subscribe();
        let current = NavTree::resolve(&rx.borrow());
        Self { rx, current }
    }

    #[must_use]
    pub fn current(&self) -> NavTree {
        self.current
    }

    /// Wait for the next session change and return the re-resolved tree.
    /// Returns `None` once every store handle has been dropped.
    pub async fn changed(&mut self) -> Option<NavTree> {
        match self.rx.changed().await {
            Ok(()) => {
                let next = NavTree::resolve(&self.rx.borrow_and_update());
                if next != self.current {
                    debug!(from = %self.current, to = %next, "navigation tree changed");
                }
                self.current = next;
                Some(next)
            }
            Err(_) => None,
        }
    }
}
