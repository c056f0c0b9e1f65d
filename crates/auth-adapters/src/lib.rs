//! poundtrades/crates/auth-adapters/src/lib.rs
//!
//! Session adapter over the hosted authentication collaborator. The real
//! identity provider lives elsewhere; this mirrors its "who is signed in"
//! state and rebroadcasts sign-in/sign-out transitions, the way the app
//! subscribes to auth-state changes.

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use domains::{AuthEvent, AuthSessions, UserId};

pub struct LocalSessions {
    current: RwLock<Option<UserId>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for LocalSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSessions {
    pub fn new() -> Self {
        LocalSessions {
            current: RwLock::new(None),
            events: broadcast::channel(16).0,
        }
    }

    /// Records a sign-in reported by the identity provider. Any previous
    /// session ends first, so subscribers see its sign-out.
    pub async fn sign_in(&self, user: UserId) {
        let mut current = self.current.write().await;
        if let Some(previous) = current.take() {
            if previous != user {
                let _ = self.events.send(AuthEvent::SignedOut(previous));
            }
        }
        *current = Some(user);
        tracing::debug!(%user, "session started");
        let _ = self.events.send(AuthEvent::SignedIn(user));
    }

    /// Ends the current session, if any. Idempotent.
    pub async fn sign_out(&self) {
        let mut current = self.current.write().await;
        if let Some(user) = current.take() {
            tracing::debug!(%user, "session ended");
            let _ = self.events.send(AuthEvent::SignedOut(user));
        }
    }
}

#[async_trait]
impl AuthSessions for LocalSessions {
    async fn current_user(&self) -> Option<UserId> {
        *self.current.read().await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
