use crate::error::AuthError;
use tracing::{info, warn};

/// The signed-in user, as resolved by the auth provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSession {
    pub user_id: String,
}

impl UserSession {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }
}

/// Third-party auth collaborator. Sign-in and password flows live behind
/// it; the map only needs to know who is signed in.
pub trait AuthProvider: Send + Sync {
    fn restore(&self) -> Result<UserSession, AuthError>;
}

/// Resolves the session from a configured user id; empty means signed out
pub struct StaticAuthProvider {
    user_id: Option<String>,
}

impl StaticAuthProvider {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|id| !id.trim().is_empty()),
        }
    }
}

impl AuthProvider for StaticAuthProvider {
    fn restore(&self) -> Result<UserSession, AuthError> {
        self.user_id
            .as_deref()
            .map(UserSession::new)
            .ok_or(AuthError::SignedOut)
    }
}

/// Application-wide state handed to screens explicitly.
/// `start` subscribes to the auth provider, `stop` tears the session down.
pub struct AppContext {
    provider: Box<dyn AuthProvider>,
    session: Option<UserSession>,
}

impl AppContext {
    pub fn new(provider: Box<dyn AuthProvider>) -> Self {
        Self {
            provider,
            session: None,
        }
    }

    pub fn start(&mut self) -> Option<&UserSession> {
        match self.provider.restore() {
            Ok(session) => {
                info!(user = %session.user_id, "session restored");
                self.session = Some(session);
            }
            Err(e) => {
                warn!("no session: {e}");
                self.session = None;
            }
        }
        self.session.as_ref()
    }

    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            info!(user = %session.user_id, "session closed");
        }
    }

    pub fn session(&self) -> Option<&UserSession> {
        self.session.as_ref()
    }
}
