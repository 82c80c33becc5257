//! Authenticated request gateway.
//!
//! Every API call goes through [`Gateway::execute`]:
//! 1. attach `Authorization: Bearer <token>` when signed in
//! 2. dispatch
//! 3. on the first 401, refresh through the [`SessionStore`] and replay once
//! 4. hand every other failure back unchanged

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;

use usermgr_auth::AccessToken;

use crate::error::ApiError;
use crate::session_store::SessionStore;

/// One logical request, plus whether it has already been replayed.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAttempt {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Set once a 401 triggered a refresh; a retried attempt is never
    /// refreshed again.
    pub retried: bool,
}

impl RequestAttempt {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A successful (2xx) response, fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Detached in-flight request.
///
/// Dropping the handle discards the outcome but lets the request (and any
/// refresh/replay it triggered) run to completion.
#[derive(Debug)]
pub struct RequestHandle {
    inner: JoinHandle<Result<ApiResponse, ApiError>>,
}

impl RequestHandle {
    pub async fn join(self) -> Result<ApiResponse, ApiError> {
        match self.inner.await {
            Ok(result) => result,
            Err(err) => Err(ApiError::Aborted(err.to_string())),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: Arc<str>,
    store: Arc<SessionStore>,
}

impl Gateway {
    pub fn new(http: reqwest::Client, base_url: &str, store: Arc<SessionStore>) -> Self {
        Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            store,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Run `attempt` to completion under the refresh-once policy.
    pub async fn execute(&self, mut attempt: RequestAttempt) -> Result<ApiResponse, ApiError> {
        loop {
            let token = self.store.token().await;
            let resp = self.dispatch(&attempt, token.as_ref()).await?;
            let status = resp.status();

            if status.is_success() {
                let body = resp.bytes().await.map_err(ApiError::from)?;
                return Ok(ApiResponse {
                    status,
                    body: body.to_vec(),
                });
            }

            if status == StatusCode::UNAUTHORIZED {
                let Some(stale) = token else {
                    return Err(ApiError::Unauthorized);
                };
                if attempt.retried {
                    tracing::warn!(
                        method = %attempt.method,
                        path = %attempt.path,
                        "replayed request rejected again"
                    );
                    return Err(ApiError::Unauthorized);
                }

                attempt.retried = true;
                if self.store.refresh_after(&stale).await {
                    tracing::debug!(path = %attempt.path, "replaying after token refresh");
                    continue;
                }

                // A newer session (fresh login) must survive a stale failure.
                self.store.clear_if_current(&stale).await;
                return Err(ApiError::SessionTerminated);
            }

            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(path = %attempt.path, status = status.as_u16(), "request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
    }

    /// Run `attempt` in the background; see [`RequestHandle`].
    pub fn spawn(&self, attempt: RequestAttempt) -> RequestHandle {
        let gateway = self.clone();
        RequestHandle {
            inner: tokio::spawn(async move { gateway.execute(attempt).await }),
        }
    }

    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        attempt: RequestAttempt,
    ) -> Result<T, ApiError> {
        self.execute(attempt).await?.json()
    }

    pub async fn execute_unit(&self, attempt: RequestAttempt) -> Result<(), ApiError> {
        self.execute(attempt).await.map(|_| ())
    }

    async fn dispatch(
        &self,
        attempt: &RequestAttempt,
        token: Option<&AccessToken>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, attempt.path);
        let mut req = self.http.request(attempt.method.clone(), &url);

        if !attempt.query.is_empty() {
            req = req.query(&attempt.query);
        }
        if let Some(body) = &attempt.body {
            req = req.json(body);
        }
        if let Some(token) = token {
            req = req.bearer_auth(token.as_str());
        }

        tracing::debug!(
            method = %attempt.method,
            path = %attempt.path,
            retried = attempt.retried,
            "dispatching"
        );
        req.send().await.map_err(|e| ApiError::Network(e.to_string()))
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attempt_builders() {
        let attempt = RequestAttempt::get("/users/search/by-login").query("login", "jdupont");
        assert_eq!(attempt.method, Method::GET);
        assert_eq!(attempt.query, vec![("login".to_string(), "jdupont".to_string())]);
        assert!(!attempt.retried);

        let attempt = RequestAttempt::post("/roles")
            .json(&json!({"name": "AUDITOR"}))
            .unwrap();
        assert_eq!(attempt.body, Some(json!({"name": "AUDITOR"})));
    }

    #[test]
    fn response_json_reports_decode_errors() {
        let resp = ApiResponse {
            status: StatusCode::OK,
            body: b"not json".to_vec(),
        };
        assert!(matches!(resp.json::<Value>(), Err(ApiError::Decode(_))));
        assert_eq!(resp.text(), "not json");
    }
}
