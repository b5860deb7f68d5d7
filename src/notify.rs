//! User-facing notifications ("toasts").
//!
//! Each notification is independent and auto-expires a fixed interval after it
//! was raised; several may be visible at once. `ToastQueue` keeps them in memory
//! for one client, `LogSink` forwards them to tracing where nobody is watching.

use serde::Serialize;
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::{error, info};
use ulid::Ulid;
use utoipa::ToSchema;

/// How long a toast stays visible.
pub const TOAST_TTL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Notification {
    #[schema(value_type = String)]
    pub id: Ulid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub severity: Severity,
    #[serde(skip)]
    pub created_at: Instant,
}

impl Notification {
    #[must_use]
    pub fn new(title: &str, description: Option<&str>, severity: Severity) -> Self {
        Self {
            id: Ulid::new(),
            title: title.to_string(),
            description: description.map(str::to_string),
            severity,
            created_at: Instant::now(),
        }
    }

    fn expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= TOAST_TTL
    }
}

/// Destination for user-facing messages.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, description: Option<&str>, severity: Severity);
}

/// In-memory toast list with auto-expiry.
#[derive(Debug, Default)]
pub struct ToastQueue {
    toasts: Mutex<Vec<Notification>>,
}

impl ToastQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications still visible now.
    pub fn active(&self) -> Vec<Notification> {
        self.active_at(Instant::now())
    }

    /// Notifications still visible at `now`; expired ones are dropped.
    pub fn active_at(&self, now: Instant) -> Vec<Notification> {
        let mut toasts = self.lock();
        toasts.retain(|toast| !toast.expired_at(now));
        toasts.clone()
    }

    /// Returns the visible notifications and clears the queue.
    pub fn drain(&self) -> Vec<Notification> {
        let now = Instant::now();
        let mut toasts = self.lock();
        let drained = std::mem::take(&mut *toasts);
        drained
            .into_iter()
            .filter(|toast| !toast.expired_at(now))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        // A poisoned list only means a panic mid-push; the data is still usable.
        self.toasts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl NotificationSink for ToastQueue {
    fn notify(&self, title: &str, description: Option<&str>, severity: Severity) {
        self.lock()
            .push(Notification::new(title, description, severity));
    }
}

/// Sink that only logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, title: &str, description: Option<&str>, severity: Severity) {
        let description = description.unwrap_or_default();
        match severity {
            Severity::Error => error!(title, description, "notification"),
            Severity::Success | Severity::Info => info!(title, description, "notification"),
        }
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn notify(&self, title: &str, description: Option<&str>, severity: Severity) {
        (**self).notify(title, description, severity);
    }
}

/// Fan out to both sinks.
impl<A: NotificationSink, B: NotificationSink> NotificationSink for (A, B) {
    fn notify(&self, title: &str, description: Option<&str>, severity: Severity) {
        self.0.notify(title, description, severity);
        self.1.notify(title, description, severity);
    }
}
