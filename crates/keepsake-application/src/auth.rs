//! Authentication state broadcast.

use keepsake_core::auth::AuthState;
use tokio::sync::watch;

/// Owner side of the authentication state.
///
/// The sign-in flow writes here; sessions hold a receiver from
/// [`AuthChannel::subscribe`] and react to changes.
#[derive(Debug)]
pub struct AuthChannel {
    sender: watch::Sender<AuthState>,
}

impl AuthChannel {
    pub fn new(initial: AuthState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.sender.borrow().clone()
    }

    pub fn login(&self, access_token: impl Into<String>) {
        let state = AuthState::authenticated(access_token);
        tracing::info!("[AuthChannel] Signed in");
        self.sender.send_replace(state);
    }

    pub fn logout(&self) {
        tracing::info!("[AuthChannel] Signed out");
        self.sender.send_replace(AuthState::anonymous());
    }
}

impl Default for AuthChannel {
    fn default() -> Self {
        Self::new(AuthState::anonymous())
    }
}
