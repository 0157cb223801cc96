//! Explicit session context shared by everything that talks to the backend

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::UserIdentity;

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    user: Option<UserIdentity>,
}

/// Bearer token and signed-in user.
///
/// Cloning is cheap and every clone sees the same state, so the CLI can load
/// it once at boot, hand it to the API client, and clear it on logout.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<SessionState>>,
}

impl SessionContext {
    /// An empty, signed-out session
    pub fn new() -> Self {
        Self::default()
    }

    /// A session populated from stored credentials
    pub fn load(token: Option<String>, user: Option<UserIdentity>) -> Self {
        let ctx = Self::new();
        {
            let mut state = ctx.inner.write();
            state.token = token.filter(|t| !t.is_empty());
            state.user = user;
        }
        ctx
    }

    /// Replace the bearer token
    pub fn set_token(&self, token: impl Into<String>) {
        self.inner.write().token = Some(token.into());
    }

    /// Replace the signed-in user
    pub fn set_user(&self, user: UserIdentity) {
        self.inner.write().user = Some(user);
    }

    /// Current token, if any
    pub fn token(&self) -> Option<String> {
        self.inner.read().token.clone()
    }

    /// Current user, if any
    pub fn user(&self) -> Option<UserIdentity> {
        self.inner.read().user.clone()
    }

    /// Whether a token is present
    pub fn is_authenticated(&self) -> bool {
        self.inner.read().token.is_some()
    }

    /// `Authorization` header value, accepting tokens stored with or without
    /// the `Bearer ` prefix
    pub fn authorization(&self) -> Option<String> {
        self.inner.read().token.as_ref().map(|t| {
            if t.starts_with("Bearer ") {
                t.clone()
            } else {
                format!("Bearer {}", t)
            }
        })
    }

    /// Forget token and user (logout)
    pub fn clear(&self) {
        let mut state = self.inner.write();
        state.token = None;
        state.user = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let ctx = SessionContext::new();
        let other = ctx.clone();
        ctx.set_token("abc");
        assert_eq!(other.authorization().as_deref(), Some("Bearer abc"));

        other.clear();
        assert!(!ctx.is_authenticated());
        assert!(ctx.authorization().is_none());
    }

    #[test]
    fn test_load_ignores_empty_token() {
        let ctx = SessionContext::load(Some(String::new()), Some(UserIdentity::student("s1")));
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.user().map(|u| u.id), Some("s1".to_string()));
    }

    #[test]
    fn test_bearer_prefix_not_doubled() {
        let ctx = SessionContext::load(Some("Bearer xyz".into()), None);
        assert_eq!(ctx.authorization().as_deref(), Some("Bearer xyz"));
    }
}
