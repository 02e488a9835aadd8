//! Session controller: owns the authentication state machine.
//!
//! State starts at `Loading`. `start()` restores a session from the stored
//! refresh token, `login()` obtains a new refresh token, `logout()` forgets
//! it. Every failure collapses into `Unauthenticated`.
//!
//! `start()` and `login()` run one at a time, in call order. `logout()` never
//! waits for them: it advances the session epoch, and a request that was in
//! flight across a logout drops its result instead of resurrecting the
//! session.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};

use super::state::AuthState;
use super::store::TokenStore;

/// Shortest refresh token the backend issues; anything shorter is a refusal.
pub const MIN_REFRESH_TOKEN_LEN: usize = 11;

/// How the session is established right after a successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PostLoginSession {
    /// Use the refresh token itself as the session value until the next
    /// `start()`. This is what the backend has been observed to accept.
    #[default]
    #[serde(rename = "refresh-token")]
    RefreshToken,
    /// Exchange the new refresh token for a session token immediately.
    #[serde(rename = "exchange")]
    Exchange,
}

/// Failure kinds, only used to label log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    Transport,
    Rejected,
    Storage,
}

impl FailureKind {
    fn of(err: &anyhow::Error) -> Self {
        if let Some(api) = err.downcast_ref::<ApiError>() {
            if api.is_transport() {
                FailureKind::Transport
            } else {
                FailureKind::Rejected
            }
        } else if err.downcast_ref::<reqwest::Error>().is_some() {
            FailureKind::Transport
        } else {
            FailureKind::Storage
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::Rejected => "rejected",
            FailureKind::Storage => "storage",
        }
    }
}

fn is_plausible_refresh_token(token: &str) -> bool {
    token.len() >= MIN_REFRESH_TOKEN_LEN
}

pub struct SessionController {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    policy: PostLoginSession,
    state: watch::Sender<AuthState>,
    /// Single slot for `start()`/`login()`
    transition: tokio::sync::Mutex<()>,
    /// Bumped by every logout; guards commits of in-flight results
    epoch: Mutex<u64>,
}

impl SessionController {
    pub fn new(api: ApiClient, store: Arc<dyn TokenStore>, policy: PostLoginSession) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            api,
            store,
            policy,
            state,
            transition: tokio::sync::Mutex::new(()),
            epoch: Mutex::new(0),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Observe state changes. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn session_token(&self) -> Option<String> {
        self.state.borrow().session_token().map(str::to_string)
    }

    /// Restore the session from the stored refresh token.
    ///
    /// Without a stored token this settles on `Unauthenticated` without
    /// touching the network. A failed exchange leaves the stored token alone.
    pub async fn start(&self) -> AuthState {
        let _slot = self.transition.lock().await;
        let epoch = self.current_epoch();

        let Some(refresh_token) = self.load_stored_token().await else {
            info!("No stored refresh token");
            return self.commit(epoch, AuthState::Unauthenticated, None);
        };
        self.commit(epoch, AuthState::Loading, None);

        match self.api.exchange_session(&refresh_token).await {
            Ok(session_token) => {
                info!("Session restored from stored refresh token");
                self.commit(epoch, AuthState::Authenticated { session_token }, None)
            }
            Err(e) => {
                warn!(kind = FailureKind::of(&e).as_str(), error = %e, "Session exchange failed");
                self.commit(epoch, AuthState::Unauthenticated, None)
            }
        }
    }

    /// Log in with email and password, persisting the refresh token on success.
    pub async fn login(&self, username: &str, password: &str) -> AuthState {
        let _slot = self.transition.lock().await;
        let epoch = self.current_epoch();
        self.commit(epoch, AuthState::Loading, None);

        let resp = match self.api.get_refresh_token(username, password).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(kind = FailureKind::of(&e).as_str(), error = %e, "Login request failed");
                return self.commit(epoch, AuthState::Unauthenticated, None);
            }
        };

        if !is_plausible_refresh_token(&resp.token) {
            warn!(
                kind = FailureKind::Rejected.as_str(),
                message = %resp.message,
                token_len = resp.token.len(),
                "Login refused"
            );
            return self.commit(epoch, AuthState::Unauthenticated, None);
        }
        let refresh_token = resp.token;

        let next = match self.policy {
            PostLoginSession::RefreshToken => {
                debug!("Using refresh token as session token until next start");
                AuthState::Authenticated {
                    session_token: refresh_token.clone(),
                }
            }
            PostLoginSession::Exchange => match self.api.exchange_session(&refresh_token).await {
                Ok(session_token) => AuthState::Authenticated { session_token },
                Err(e) => {
                    warn!(
                        kind = FailureKind::of(&e).as_str(),
                        error = %e,
                        "Session exchange after login failed"
                    );
                    AuthState::Unauthenticated
                }
            },
        };

        let state = self.commit(epoch, next, Some(&refresh_token));
        if state.is_authenticated() {
            info!("Logged in");
        }
        state
    }

    /// Forget the stored refresh token. Always ends `Unauthenticated`.
    pub fn logout(&self) -> AuthState {
        let mut epoch = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *epoch += 1;

        if let Err(e) = self.store.clear() {
            warn!(kind = FailureKind::Storage.as_str(), error = %e, "Failed to clear refresh token");
        }
        self.state.send_replace(AuthState::Unauthenticated);
        info!("Logged out");
        AuthState::Unauthenticated
    }

    /// Read the store off the async worker; the key source may block on the keychain.
    async fn load_stored_token(&self) -> Option<String> {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(token) => token,
            Err(e) => {
                warn!(kind = FailureKind::Storage.as_str(), error = %e, "Token store read panicked");
                None
            }
        }
    }

    fn current_epoch(&self) -> u64 {
        *self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist `refresh_token` (if any) and publish `next`, unless a logout
    /// happened after `epoch` was read. Returns the resulting state.
    ///
    /// The save runs under the epoch lock so a concurrent logout cannot clear
    /// the store between the check and the write.
    fn commit(&self, epoch: u64, next: AuthState, refresh_token: Option<&str>) -> AuthState {
        let current = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != epoch {
            debug!(result = next.label(), "Discarding auth result superseded by logout");
            return self.state();
        }

        let next = match refresh_token {
            Some(token) => match self.store.save(token) {
                Ok(()) => next,
                Err(e) => {
                    warn!(kind = FailureKind::Storage.as_str(), error = %e, "Failed to persist refresh token");
                    AuthState::Unauthenticated
                }
            },
            None => next,
        };

        self.state.send_replace(next.clone());
        next
    }
}

// ============================================================================
// Tests
// ============================================================================
