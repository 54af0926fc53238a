//! Ephemeral notification queue with timed dismissal.
//!
//! Toasts are appended in order and each one disappears `duration` after it
//! was added (5 s by default). Visibility is decided against the toast's own
//! deadline, so [`ToastStore::toasts`] is exact even without a runtime; when
//! a tokio runtime is present a removal task also drops the entry and wakes
//! subscribers.

#[cfg(test)]
#[path = "toast_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::config::DEFAULT_TOAST_DURATION_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Warning,
}

impl ToastKind {
    /// Heading shown when a toast has no title.
    #[must_use]
    pub fn default_title(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Error => "Error",
            Self::Info => "Info",
            Self::Warning => "Warning",
        }
    }
}

/// Wall-clock milliseconds plus a random nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToastId {
    millis: u64,
    nonce: u32,
}

impl ToastId {
    fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        Self { millis, nonce: rand::random() }
    }
}

impl std::fmt::Display for ToastId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:08x}", self.millis, self.nonce)
    }
}

/// A toast to be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToast {
    pub kind: ToastKind,
    pub title: Option<String>,
    pub message: Option<String>,
    /// Display time; `None` or zero uses the store default.
    pub duration: Option<Duration>,
}

impl NewToast {
    #[must_use]
    pub fn new(kind: ToastKind) -> Self {
        Self { kind, title: None, message: None, duration: None }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// A queued toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: ToastId,
    pub kind: ToastKind,
    pub title: Option<String>,
    pub message: Option<String>,
    pub duration: Duration,
    pub expires_at: Instant,
}

impl Toast {
    #[must_use]
    pub fn heading(&self) -> &str {
        self.title.as_deref().unwrap_or(self.kind.default_title())
    }

    #[must_use]
    pub fn is_visible_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Shared handle to the toast queue. Clone freely.
#[derive(Clone)]
pub struct ToastStore {
    state: Arc<watch::Sender<Vec<Toast>>>,
    default_duration: Duration,
}

impl Default for ToastStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_duration(Duration::from_millis(DEFAULT_TOAST_DURATION_MS))
    }

    #[must_use]
    pub fn with_default_duration(default_duration: Duration) -> Self {
        let (state, _) = watch::channel(Vec::new());
        Self { state: Arc::new(state), default_duration }
    }

    #[must_use]
    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    /// Append a toast and schedule its removal. Returns the new id.
    pub fn add_toast(&self, new: NewToast) -> ToastId {
        let duration = match new.duration {
            Some(duration) if !duration.is_zero() => duration,
            _ => self.default_duration,
        };
        let id = ToastId::generate();
        let now = Instant::now();
        let expires_at = now + duration;
        let toast = Toast { id, kind: new.kind, title: new.title, message: new.message, duration, expires_at };
        // Without a runtime no removal task runs; expired entries go here.
        self.state.send_modify(|toasts| {
            toasts.retain(|t| t.is_visible_at(now));
            toasts.push(toast);
        });
        debug!(%id, ?duration, "toast added");

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = self.clone();
            handle.spawn(async move {
                tokio::time::sleep_until(expires_at).await;
                store.remove_toast(id);
            });
        }
        id
    }

    /// Remove a toast now. Unknown ids are ignored.
    pub fn remove_toast(&self, id: ToastId) {
        self.state.send_if_modified(|toasts| {
            let before = toasts.len();
            toasts.retain(|t| t.id != id);
            toasts.len() != before
        });
    }

    /// Toasts still visible, oldest first.
    #[must_use]
    pub fn toasts(&self) -> Vec<Toast> {
        let now = Instant::now();
        self.state.borrow().iter().filter(|t| t.is_visible_at(now)).cloned().collect()
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> ToastId {
        self.add_toast(NewToast::new(ToastKind::Success).title(title).message(message))
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> ToastId {
        self.add_toast(NewToast::new(ToastKind::Error).title(title).message(message))
    }

    /// Receiver woken on every add and removal.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.state.subscribe()
    }
}

impl std::fmt::Debug for ToastStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToastStore")
            .field("queued", &self.state.borrow().len())
            .field("default_duration", &self.default_duration)
            .finish()
    }
}
