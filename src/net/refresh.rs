//! Single-flight coordination of refresh-token exchanges.
//!
//! DESIGN
//! ======
//! Refresh tokens are single use on the backend: exchanging one invalidates
//! it. If every request that hit a 401 ran its own exchange, all but the
//! first would present a dead token and strand their callers. The
//! coordinator therefore keeps a tiny state machine:
//!
//! ```text
//! Idle ──401──▶ Refreshing(shared) ──exchange settles──▶ Idle
//!                   ▲      │
//!                   └─401──┘  (join, no new exchange)
//! ```
//!
//! The in-flight exchange is a `futures::future::Shared`, a one-shot future
//! every waiter can poll. All waiters observe the same outcome, woken in the
//! order they subscribed.
//!
//! TRADE-OFFS
//! ==========
//! The exchange is driven by whichever waiter polls it, so dropping the
//! request that started it does not strand the others. The first waiter to
//! observe completion resets the state; a stale completion never clears a
//! newer exchange (pointer identity check).

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

/// Why a refresh exchange produced no token. Cloned to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("refresh token rejected with status {0}")]
    Rejected(u16),
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("refresh response decode failed: {0}")]
    Decode(String),
    #[error("session ended while refresh was in flight")]
    SessionEnded,
}

/// New access token, or the shared failure.
pub type RefreshOutcome = Result<String, RefreshFailure>;

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

enum RefreshState {
    Idle,
    Refreshing(InFlight),
}

/// Collapses concurrent refresh attempts into one upstream exchange.
#[derive(Clone)]
pub struct RefreshCoordinator {
    state: Arc<Mutex<RefreshState>>,
    exchanges: Arc<AtomicU64>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(RefreshState::Idle)), exchanges: Arc::new(AtomicU64::new(0)) }
    }

    /// Join the in-flight exchange, or start one with `start` if idle.
    ///
    /// `start` is only invoked when no exchange is running; it must return a
    /// future that performs the exchange and any state updates exactly once.
    pub async fn run<F, Fut>(&self, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let inflight = {
            let mut state = self.lock();
            match &*state {
                RefreshState::Refreshing(inflight) => {
                    debug!("joining in-flight token refresh");
                    inflight.clone()
                }
                RefreshState::Idle => {
                    let inflight = start().boxed().shared();
                    *state = RefreshState::Refreshing(inflight.clone());
                    let started = self.exchanges.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(exchange = started, "starting token refresh");
                    inflight
                }
            }
        };

        let outcome = inflight.clone().await;
        self.settle(&inflight);
        outcome
    }

    /// Whether an exchange is currently in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(&*self.lock(), RefreshState::Refreshing(_))
    }

    /// Number of exchanges started over this coordinator's lifetime.
    #[must_use]
    pub fn exchanges_started(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    fn settle(&self, finished: &InFlight) {
        let mut state = self.lock();
        if let RefreshState::Refreshing(current) = &*state {
            if current.ptr_eq(finished) {
                *state = RefreshState::Idle;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
