//! Authentication lifecycle: recovery from the persisted token, login,
//! logout and teardown after the backend rejects the credential.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, OnceLock, Weak,
};

use async_trait::async_trait;
use shared::{domain::User, protocol::LoginRequest};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ClientResult},
    gateway::{AuthorizationLost, AuthorizationObserver, RequestGateway},
    navigation::{Navigator, View},
    token_store::TokenStore,
};

pub const LOGIN_FAILED_MESSAGE: &str =
    "Login failed. Please check your credentials and try again.";
pub const MISSING_CREDENTIALS_MESSAGE: &str = "Username and password are required.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Recovering,
    Authenticated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub token: Option<String>,
    pub user: Option<User>,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    fn unauthenticated() -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            token: None,
            user: None,
            loading: false,
            last_error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated && self.user.is_some()
    }
}

/// State that belongs to one signed-in user and must not outlive the session.
pub trait SessionScoped: Send + Sync {
    fn session_cleared(&self);
}

pub struct SessionManager {
    gateway: Arc<RequestGateway>,
    token_store: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<SessionSnapshot>,
    generation: AtomicU64,
    persist_lock: Mutex<()>,
    scoped: OnceLock<Weak<dyn SessionScoped>>,
}

impl SessionManager {
    /// Builds the manager and registers it as the gateway's authorization observer.
    pub fn new(
        gateway: Arc<RequestGateway>,
        token_store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<SessionManager>| {
            let observer: Weak<dyn AuthorizationObserver> = weak.clone();
            if !gateway.set_observer(observer) {
                warn!("gateway already has an authorization observer; keeping the existing one");
            }
            let (state, _) = watch::channel(SessionSnapshot::unauthenticated());
            Self {
                gateway,
                token_store,
                navigator,
                state,
                generation: AtomicU64::new(0),
                persist_lock: Mutex::new(()),
                scoped: OnceLock::new(),
            }
        })
    }

    /// Registers state cleared whenever the session is torn down. Only the
    /// first registration takes effect.
    pub fn set_scoped(&self, scoped: Weak<dyn SessionScoped>) -> bool {
        self.scoped.set(scoped).is_ok()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Resolves the view to show: protected views fall back to the login view
    /// without an authenticated session.
    pub fn guard(&self, view: View) -> View {
        if view.requires_session() && !self.is_authenticated() {
            View::Login
        } else {
            view
        }
    }

    /// Restores a session from the persisted token, if any.
    pub async fn initialize(&self) -> SessionSnapshot {
        let generation = self.begin_operation();

        let stored = match self.token_store.load().await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to read persisted session token");
                None
            }
        };
        if !self.is_current(generation) {
            return self.snapshot();
        }

        let Some(token) = stored else {
            self.state.send_replace(SessionSnapshot::unauthenticated());
            return self.snapshot();
        };

        self.gateway.attach_token(token.clone());
        self.state.send_replace(SessionSnapshot {
            phase: SessionPhase::Recovering,
            token: Some(token.clone()),
            user: None,
            loading: true,
            last_error: None,
        });

        let result = self.gateway.current_user().await;
        if !self.is_current(generation) {
            debug!("discarding superseded session recovery");
            return self.snapshot();
        }

        // An authorization loss while recovering detaches the token.
        let still_attached = self.gateway.token().as_deref() == Some(token.as_str());
        match result {
            Ok(user) if still_attached => {
                info!(username = %user.username, "session recovered from persisted token");
                self.state.send_replace(SessionSnapshot {
                    phase: SessionPhase::Authenticated,
                    token: Some(token),
                    user: Some(user),
                    loading: false,
                    last_error: None,
                });
            }
            Ok(_) => {
                warn!("persisted session token revoked during recovery; starting signed out");
                self.clear_local_session();
                self.persist_current().await;
            }
            Err(err) => {
                warn!(error = %err, "persisted session token rejected; starting signed out");
                self.clear_local_session();
                self.persist_current().await;
            }
        }

        self.snapshot()
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<User> {
        if username.trim().is_empty() || password.is_empty() {
            let mut next = self.snapshot();
            next.last_error = Some(MISSING_CREDENTIALS_MESSAGE.to_string());
            self.state.send_replace(next);
            return Err(ClientError::validation(MISSING_CREDENTIALS_MESSAGE));
        }

        let generation = self.begin_operation();
        let mut pending = self.snapshot();
        pending.loading = true;
        pending.last_error = None;
        self.state.send_replace(pending);

        let result = self
            .gateway
            .login(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await;

        if !self.is_current(generation) {
            debug!(username, "discarding superseded login response");
            return Err(ClientError::Superseded);
        }

        match result {
            Ok(body) => {
                self.gateway.attach_token(body.token.clone());
                self.state.send_replace(SessionSnapshot {
                    phase: SessionPhase::Authenticated,
                    token: Some(body.token),
                    user: Some(body.user.clone()),
                    loading: false,
                    last_error: None,
                });
                info!(username = %body.user.username, "login succeeded");
                self.persist_current().await;
                Ok(body.user)
            }
            Err(err) => {
                warn!(username, error = %err, "login failed");
                let mut next = self.snapshot();
                next.loading = false;
                next.last_error = Some(LOGIN_FAILED_MESSAGE.to_string());
                if next.phase != SessionPhase::Authenticated {
                    next.phase = SessionPhase::Failed;
                }
                self.state.send_replace(next);
                Err(err)
            }
        }
    }

    /// Signs out locally. The backend notification is best effort and its
    /// failures are ignored.
    pub async fn logout(&self) {
        self.begin_operation();
        let token = self.gateway.token();

        self.clear_local_session();
        self.persist_current().await;
        info!("signed out");

        if let Err(err) = self.gateway.logout(token).await {
            debug!(error = %err, "ignoring failed logout notification");
        }
    }

    fn begin_operation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn clear_local_session(&self) {
        self.gateway.detach_token();
        self.state.send_replace(SessionSnapshot::unauthenticated());
        if let Some(scoped) = self.scoped.get().and_then(Weak::upgrade) {
            scoped.session_cleared();
        }
    }

    /// Writes the in-memory token to the durable store. Serialized so the
    /// stored value always ends up matching the latest session state.
    async fn persist_current(&self) {
        let _guard = self.persist_lock.lock().await;
        let token = self.state.borrow().token.clone();
        let result = match token {
            Some(token) => self.token_store.save(&token).await,
            None => self.token_store.clear().await,
        };
        if let Err(err) = result {
            warn!(error = %format!("{err:#}"), "failed to sync persisted session token");
        }
    }
}

#[async_trait]
impl AuthorizationObserver for SessionManager {
    async fn on_authorization_lost(&self, lost: AuthorizationLost) {
        let current = self.state.borrow().token.clone();
        if current.is_some() && current != lost.token {
            debug!(resource = %lost.resource, "ignoring authorization loss for a replaced token");
            return;
        }

        self.clear_local_session();
        if self.navigator.current() != View::Login {
            self.navigator.navigate(View::Login);
        }
        info!(resource = %lost.resource, "session cleared after authorization failure");
        self.persist_current().await;
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
