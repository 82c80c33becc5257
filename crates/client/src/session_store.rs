//! The client's single authentication session.
//!
//! Invariants:
//! - in memory and in storage, `token` and `user` are present together or
//!   not at all
//! - a failed refresh leaves no session behind
//! - at most one refresh exchange is in flight per store

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use usermgr_auth::{AccessToken, Identity, Session};

use crate::dto::{AuthResponse, LoginRequest, RefreshTokenRequest};
use crate::error::ApiError;
use crate::storage::{SessionStorage, TOKEN_KEY, USER_KEY};

pub struct SessionStore {
    http: reqwest::Client,
    base_url: String,
    storage: Arc<dyn SessionStorage>,
    state: RwLock<Option<Session>>,
    /// Serializes refresh exchanges.
    refresh_gate: Mutex<()>,
}

impl SessionStore {
    /// Create the store and hydrate it from `storage`.
    ///
    /// Missing or unreadable records yield an unauthenticated store.
    pub fn init(
        http: reqwest::Client,
        base_url: &str,
        storage: Arc<dyn SessionStorage>,
    ) -> Arc<Self> {
        let hydrated = hydrate(storage.as_ref());
        match &hydrated {
            Some(session) => tracing::info!(login = %session.identity.login, "restored session"),
            None => tracing::debug!("no stored session"),
        }

        Arc::new(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            storage,
            state: RwLock::new(hydrated),
            refresh_gate: Mutex::new(()),
        })
    }

    pub async fn session(&self) -> Option<Session> {
        self.state.read().await.clone()
    }

    pub async fn token(&self) -> Option<AccessToken> {
        self.state.read().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Exchange credentials for a session.
    ///
    /// Returns `false` on rejection or transport failure; any prior session
    /// is left untouched in that case. Holds the refresh gate so a refresh
    /// in flight cannot land on the new session.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        let _gate = self.refresh_gate.lock().await;
        let body = LoginRequest {
            login: username,
            password,
        };

        match self.post_auth("/auth/login", &body).await {
            Ok(auth) => {
                let session = auth.into_session();
                let mut state = self.state.write().await;
                self.persist(&session);
                tracing::info!(login = %session.identity.login, "logged in");
                *state = Some(session);
                true
            }
            Err(err) => {
                tracing::warn!(login = %username, "login failed: {err}");
                false
            }
        }
    }

    /// End this session. Local state is cleared even if the server call fails.
    pub async fn logout(&self) {
        if let Some(token) = self.token().await {
            if let Err(err) = self.post_authenticated("/auth/logout", &token).await {
                tracing::warn!("remote logout failed, clearing local session anyway: {err}");
            }
        }
        self.clear_local().await;
        tracing::info!("logged out");
    }

    /// Invalidate every session of this user, this one included.
    ///
    /// Local state is cleared only once the server confirmed.
    pub async fn logout_all(&self) -> Result<(), ApiError> {
        let token = self.token().await.ok_or(ApiError::Unauthorized)?;
        self.post_authenticated("/auth/logout-all", &token).await?;
        self.clear_local().await;
        tracing::info!("logged out of all sessions");
        Ok(())
    }

    /// Invalidate every *other* session of this user. Local state is kept.
    pub async fn logout_others(&self) -> Result<(), ApiError> {
        let token = self.token().await.ok_or(ApiError::Unauthorized)?;
        self.post_authenticated("/auth/logout-others", &token).await?;
        tracing::info!("logged out of other sessions");
        Ok(())
    }

    /// Exchange the current token for a new one.
    ///
    /// On failure (including "no token") the whole session is cleared.
    pub async fn refresh(&self) -> bool {
        let _gate = self.refresh_gate.lock().await;
        match self.token().await {
            Some(current) => self.exchange(&current).await,
            None => {
                self.clear_local().await;
                false
            }
        }
    }

    /// Refresh on behalf of a request that was rejected while holding `stale`.
    ///
    /// Callers racing on the same stale token share one exchange: whoever
    /// gets the gate second sees a different current token and reuses it.
    /// The exchange runs in its own task, so a caller dropping this future
    /// never leaves a rotated-but-unsaved token behind.
    pub async fn refresh_after(self: &Arc<Self>, stale: &AccessToken) -> bool {
        let store = Arc::clone(self);
        let stale = stale.clone();

        let task = tokio::spawn(async move {
            let _gate = store.refresh_gate.lock().await;
            match store.token().await {
                Some(current) if current != stale => {
                    tracing::debug!("token already refreshed by a concurrent request");
                    true
                }
                Some(current) => store.exchange(&current).await,
                None => false,
            }
        });

        match task.await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                tracing::error!("refresh task failed: {err}");
                false
            }
        }
    }

    /// Drop the session from memory and storage.
    pub async fn clear_local(&self) {
        *self.state.write().await = None;
        discard(self.storage.as_ref());
    }

    /// Drop the session only if it still holds `token`.
    ///
    /// Returns `false` when the session was already replaced (logout, a new
    /// login or a concurrent refresh), in which case nothing changes.
    pub async fn clear_if_current(&self, token: &AccessToken) -> bool {
        let mut state = self.state.write().await;
        if !holds(&state, token) {
            return false;
        }
        *state = None;
        discard(self.storage.as_ref());
        true
    }

    /// Must be called with the refresh gate held.
    ///
    /// The outcome applies only to the session that still holds `current`;
    /// if the session changed meanwhile the result is discarded.
    async fn exchange(&self, current: &AccessToken) -> bool {
        let body = RefreshTokenRequest {
            token: current.as_str(),
        };
        let result = self.post_auth("/auth/refresh", &body).await;

        let mut state = self.state.write().await;
        if !holds(&state, current) {
            tracing::debug!("session changed during refresh, discarding result");
            return false;
        }

        match result {
            Ok(auth) => {
                let Some(session) = state.as_mut() else {
                    return false;
                };
                session.rotate(auth.token, auth.expires_at);
                self.persist(session);
                tracing::info!("token refreshed");
                true
            }
            Err(err) => {
                tracing::warn!("token refresh rejected, ending session: {err}");
                *state = None;
                discard(self.storage.as_ref());
                false
            }
        }
    }

    /// POST `body` to an auth endpoint and decode the session it returns.
    async fn post_auth<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AuthResponse, ApiError> {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.json().await?)
    }

    async fn post_authenticated(&self, path: &str, token: &AccessToken) -> Result<(), ApiError> {
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            body: resp.text().await.unwrap_or_default(),
        })
    }

    fn persist(&self, session: &Session) {
        let identity = match serde_json::to_string(&session.identity) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!("failed to encode identity: {err}");
                return;
            }
        };
        let written = self
            .storage
            .set(TOKEN_KEY, session.token.as_str())
            .and_then(|()| self.storage.set(USER_KEY, &identity));
        if let Err(err) = written {
            tracing::warn!("session not persisted; it will not survive a restart: {err}");
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn hydrate(storage: &dyn SessionStorage) -> Option<Session> {
    let token = match storage.get(TOKEN_KEY) {
        Ok(Some(token)) if !token.trim().is_empty() => token,
        Ok(_) => return None,
        Err(err) => {
            tracing::warn!("stored token unreadable, starting signed out: {err}");
            return None;
        }
    };

    let raw_user = match storage.get(USER_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::warn!("stored token has no identity record, starting signed out");
            discard(storage);
            return None;
        }
        Err(err) => {
            tracing::warn!("stored identity unreadable, starting signed out: {err}");
            return None;
        }
    };

    match serde_json::from_str::<Identity>(&raw_user) {
        Ok(identity) => Some(Session::new(AccessToken::new(token), identity)),
        Err(err) => {
            tracing::warn!("stored identity is corrupt, starting signed out: {err}");
            discard(storage);
            None
        }
    }
}

fn holds(state: &Option<Session>, token: &AccessToken) -> bool {
    state.as_ref().is_some_and(|s| s.token == *token)
}

fn discard(storage: &dyn SessionStorage) {
    for key in [TOKEN_KEY, USER_KEY] {
        if let Err(err) = storage.remove(key) {
            tracing::warn!(key, "failed to clear stored session: {err}");
        }
    }
}
