//! Process-local view of the current session.
//!
//! One owner publishes, any number of consumers observe. Consumers only ever
//! get a `watch::Receiver`, so they cannot replace the session themselves.
//!
//! This is for embedded, single-user consumers of the library that call
//! `auth::sign_in` / `auth::sign_out` directly. The HTTP server serves many
//! users and keeps each session in its cookie instead, so it passes no
//! context.

use crate::identity::Session;
use tokio::sync::watch;

#[derive(Debug)]
pub struct SessionContext {
    sender: watch::Sender<Option<Session>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn set_session(&self, session: Session) {
        self.sender.send_replace(Some(session));
    }

    pub fn clear_session(&self) {
        self.sender.send_replace(None);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }

    /// Snapshot of the session at call time.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.sender.borrow().clone()
    }
}
