//! In-memory registry of signup flows in progress.

use crate::{
    identity::IdentityService,
    notify::{LogSink, NotificationSink, ToastQueue},
    signup::{OtpPolicy, SignupFlow},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use tracing::{debug, warn};
use ulid::Ulid;

/// Flows untouched for longer than this are abandoned.
pub const FLOW_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Upper bound on flows held at once.
pub const MAX_FLOWS: usize = 10_000;

/// A flow plus the toasts it raised since the last response.
#[derive(Clone)]
pub struct FlowHandle {
    pub flow: Arc<SignupFlow>,
    pub toasts: Arc<ToastQueue>,
}

struct Entry {
    handle: FlowHandle,
    touched: Instant,
}

pub struct FlowStore {
    entries: Mutex<HashMap<Ulid, Entry>>,
    capacity: usize,
}

impl Default for FlowStore {
    fn default() -> Self {
        Self::with_capacity(MAX_FLOWS)
    }
}

impl FlowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Start a new flow. Notifications go to the flow's toast queue and to the
    /// log. `None` when the store is full.
    pub fn start(
        &self,
        identity: Option<Arc<dyn IdentityService>>,
        policy: OtpPolicy,
    ) -> Option<Ulid> {
        let toasts = Arc::new(ToastQueue::new());
        let sink: Arc<dyn NotificationSink> = Arc::new((toasts.clone(), LogSink));
        let flow = Arc::new(SignupFlow::new(identity, sink, policy));
        self.insert_at(FlowHandle { flow, toasts }, Instant::now())
    }

    /// Register `handle` at `now`, dropping flows idle past the timeout.
    /// `None` when the live flows still fill the store.
    pub fn insert_at(&self, handle: FlowHandle, now: Instant) -> Option<Ulid> {
        let id = Ulid::new();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.touched) <= FLOW_IDLE_TIMEOUT);
        if entries.len() < before {
            debug!(dropped = before - entries.len(), "abandoned signup flows dropped");
        }
        if entries.len() >= self.capacity {
            warn!(capacity = self.capacity, "signup flow store full");
            return None;
        }
        entries.insert(
            id,
            Entry {
                handle,
                touched: now,
            },
        );
        Some(id)
    }

    /// Look up a flow and mark it as used.
    pub fn get(&self, id: &Ulid) -> Option<FlowHandle> {
        let mut entries = self.lock();
        let entry = entries.get_mut(id)?;
        entry.touched = Instant::now();
        Some(entry.handle.clone())
    }

    pub fn remove(&self, id: &Ulid) -> Option<FlowHandle> {
        self.lock().remove(id).map(|entry| entry.handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Ulid, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signup::FlowState;

    fn handle() -> FlowHandle {
        let toasts = Arc::new(ToastQueue::new());
        let flow = Arc::new(SignupFlow::new(None, toasts.clone(), OtpPolicy::default()));
        FlowHandle { flow, toasts }
    }

    #[test]
    fn start_registers_a_flow_in_details() {
        let store = FlowStore::new();
        let id = store.start(None, OtpPolicy::Concurrent).unwrap();
        let handle = store.get(&id).unwrap();
        assert_eq!(handle.flow.state(), FlowState::Details);
        assert_eq!(store.len(), 1);

        assert!(store.remove(&id).is_some());
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn idle_flows_are_dropped_on_insert() {
        let store = FlowStore::new();
        let start = Instant::now();
        let stale = store.insert_at(handle(), start).unwrap();
        let fresh = store
            .insert_at(handle(), start + Duration::from_secs(20 * 60))
            .unwrap();

        let later = start + FLOW_IDLE_TIMEOUT + Duration::from_secs(1);
        store.insert_at(handle(), later);

        assert!(store.get(&stale).is_none());
        assert!(store.get(&fresh).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn full_store_refuses_new_flows_until_one_goes_idle() {
        let store = FlowStore::with_capacity(2);
        let start = Instant::now();
        assert!(store.insert_at(handle(), start).is_some());
        assert!(store.insert_at(handle(), start).is_some());
        assert!(store.insert_at(handle(), start).is_none());
        assert_eq!(store.len(), 2);

        let later = start + FLOW_IDLE_TIMEOUT + Duration::from_secs(1);
        assert!(store.insert_at(handle(), later).is_some());
        assert_eq!(store.len(), 1);
    }
}
