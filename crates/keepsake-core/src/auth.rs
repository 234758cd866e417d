//! Authentication capability boundary.

/// What the onboarding flow knows about the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub access_token: Option<String>,
}

impl AuthState {
    /// A signed-out state.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A signed-in state carrying `token`.
    pub fn authenticated(token: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            access_token: Some(token.into()),
        }
    }

    /// The bearer credential, available only while authenticated with a
    /// non-empty token.
    pub fn credential(&self) -> Option<&str> {
        if !self.is_authenticated {
            return None;
        }
        self.access_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }
}
