use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::task::UserId;

/// Handle on the signed-in identity. Clones share the same state, and
/// every login/logout is broadcast to receivers from
/// [`subscribe`](Self::subscribe).
#[derive(Debug, Clone)]
pub struct Session {
    tx: Arc<watch::Sender<Option<UserId>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn signed_in(user: UserId) -> Self {
        let session = Self::new();
        session.login(user);
        session
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }

    pub fn login(&self, user: UserId) {
        info!(user = %user, "session login");
        self.tx.send_replace(Some(user));
    }

    pub fn logout(&self) {
        let previous = self.tx.send_replace(None);
        info!(user = ?previous, "session logout");
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }
}
