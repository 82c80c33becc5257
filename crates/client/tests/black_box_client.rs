use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use usermgr_auth::{Permission, PermissionSet};
use usermgr_client::storage::{TOKEN_KEY, USER_KEY};
use usermgr_client::{
    ApiError, ClientConfig, ConsoleClient, MemoryStorage, ReconcileError, RequestAttempt,
    SessionStorage,
};
use usermgr_client::dto::UpdateRole;
use usermgr_core::{Email, RoleId, UserId};

const PASSWORD: &str = "Secret#123";

/// Scriptable stand-in for the user manager backend.
#[derive(Default)]
struct Backend {
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    users_calls: AtomicUsize,
    permission_calls: AtomicUsize,
    token_seq: AtomicUsize,
    /// Last token handed out by login/refresh.
    issued: Mutex<Option<String>>,
    /// Token accepted by protected resources.
    valid: Mutex<Option<String>>,
    refresh_rejected: AtomicBool,
    refresh_delay_ms: AtomicU64,
    logout_fails: AtomicBool,
    reject_all: AtomicBool,
    role_permissions: Mutex<BTreeSet<String>>,
    failing_permission: Mutex<Option<String>>,
    /// Body served by `GET /users/:id/roles`; canonical role objects if unset.
    user_roles_body: Mutex<Option<Value>>,
    /// Requests seen by the user and role resources, in arrival order.
    journal: Mutex<Vec<String>>,
}

impl Backend {
    fn issue(&self) -> String {
        let token = format!("tok-{}", self.token_seq.fetch_add(1, Ordering::SeqCst));
        *self.issued.lock().unwrap() = Some(token.clone());
        *self.valid.lock().unwrap() = Some(token.clone());
        token
    }

    /// Server-side expiry: the issued token no longer opens resources but
    /// can still be refreshed.
    fn expire(&self) {
        *self.valid.lock().unwrap() = None;
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        if self.reject_all.load(Ordering::SeqCst) {
            return false;
        }
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let valid = self.valid.lock().unwrap();
        matches!((presented, valid.as_deref()), (Some(p), Some(v)) if p == v)
    }

    fn set_role_permissions(&self, perms: &[&str]) {
        *self.role_permissions.lock().unwrap() = perms.iter().map(|p| p.to_string()).collect();
    }

    fn role_permissions(&self) -> BTreeSet<String> {
        self.role_permissions.lock().unwrap().clone()
    }

    fn record(&self, entry: impl Into<String>) {
        self.journal.lock().unwrap().push(entry.into());
    }

    fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

const USER_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

fn user_body() -> Value {
    json!({
        "id": USER_ID,
        "login": "jdupont",
        "firstName": "Jean",
        "emails": ["jean+test@example.com"],
        "_links": { "self": { "href": format!("/api/v1/users/{USER_ID}") } }
    })
}

fn auth_body(token: &str) -> Value {
    json!({
        "token": token,
        "userId": "550e8400-e29b-41d4-a716-446655440000",
        "login": "jdupont",
        "roles": ["ADMIN"],
        "permissions": ["ADMIN", "USER_READ"],
        "expiresAt": 4_102_444_800_000_i64
    })
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    backend.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["login"] == "jdupont" && body["password"] == PASSWORD {
        let token = backend.issue();
        Json(auth_body(&token)).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "bad credentials").into_response()
    }
}

async fn refresh(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = backend.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let known = backend.issued.lock().unwrap().clone();
    let presented = body["token"].as_str().map(str::to_string);
    if backend.refresh_rejected.load(Ordering::SeqCst) || known.is_none() || presented != known {
        return (StatusCode::UNAUTHORIZED, "refresh rejected").into_response();
    }
    let token = backend.issue();
    Json(auth_body(&token)).into_response()
}

async fn logout(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if backend.logout_fails.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "logout unavailable").into_response();
    }
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_users(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.users_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "_embedded": { "userResponseList": [user_body()] },
        "_links": { "self": { "href": "/api/v1/users" } }
    }))
    .into_response()
}

async fn search_user(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(by): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    backend.record(format!("GET search/{by}?{}", pairs.join("&")));

    let hit = match by.as_str() {
        "by-login" => query.get("login").is_some_and(|l| l == "jdupont"),
        "by-email" => query
            .get("email")
            .is_some_and(|e| e == "jean+test@example.com"),
        _ => false,
    };
    if hit {
        Json(user_body()).into_response()
    } else {
        (StatusCode::NOT_FOUND, "user not found").into_response()
    }
}

async fn remove_contact(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path((user_id, kind, value)): Path<(String, String, String)>,
) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    backend.record(format!("DELETE {user_id}/{kind}/{value}"));
    StatusCode::NO_CONTENT.into_response()
}

async fn user_roles(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let body = backend.user_roles_body.lock().unwrap().clone();
    Json(body.unwrap_or_else(|| {
        json!([{
            "id": "6ba7b810-9dad-11d1-80b4-00c04fd430c8",
            "name": "ADMIN",
            "description": "Administrator",
            "permissions": ["ADMIN"]
        }])
    }))
    .into_response()
}

async fn update_role(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(role_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    backend.record(format!("PUT role {role_id} name={}", body["name"]));
    StatusCode::NO_CONTENT.into_response()
}

async fn get_role(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(role_id): Path<String>,
) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    backend.record(format!("GET role {role_id}"));
    Json(json!({
        "id": role_id,
        "name": "MODERATOR",
        "permissions": backend.role_permissions(),
    }))
    .into_response()
}

async fn mutate_permission(
    backend: &Backend,
    headers: &HeaderMap,
    permission: &str,
    add: bool,
) -> Response {
    backend.permission_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.authorized(headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if backend.failing_permission.lock().unwrap().as_deref() == Some(permission) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "write failed").into_response();
    }
    let mut perms = backend.role_permissions.lock().unwrap();
    if add {
        perms.insert(permission.to_string());
    } else {
        perms.remove(permission);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn add_permission(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path((_role_id, permission)): Path<(String, String)>,
) -> Response {
    mutate_permission(&backend, &headers, &permission, true).await
}

async fn remove_permission(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path((_role_id, permission)): Path<(String, String)>,
) -> Response {
    mutate_permission(&backend, &headers, &permission, false).await
}

async fn boom() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "kaput").into_response()
}

fn router(backend: Arc<Backend>) -> Router {
    Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/logout-all", post(logout))
        .route("/api/v1/auth/logout-others", post(logout))
        .route("/api/v1/users", get(list_users))
        .route("/api/v1/users/search/:by", get(search_user))
        .route("/api/v1/users/:id/roles", get(user_roles))
        .route("/api/v1/users/:id/:kind/:value", delete(remove_contact))
        .route("/api/v1/roles/:id", get(get_role).put(update_role))
        .route(
            "/api/v1/roles/:id/permissions/:permission",
            post(add_permission).delete(remove_permission),
        )
        .route("/api/v1/boom", get(boom))
        .with_state(backend)
}

struct TestServer {
    base_url: String,
    backend: Arc<Backend>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let backend = Arc::new(Backend::default());
        let app = router(backend.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api/v1", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            backend,
            handle,
        }
    }

    fn client(&self, storage: Arc<MemoryStorage>) -> ConsoleClient {
        let config = ClientConfig::new(&self.base_url).unwrap();
        ConsoleClient::new(&config, storage).unwrap()
    }

    async fn logged_in_client(&self) -> (ConsoleClient, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let client = self.client(storage.clone());
        assert!(client.store.login("jdupont", PASSWORD).await);
        (client, storage)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn perms(names: &[&str]) -> PermissionSet {
    names.iter().map(|n| Permission::parse(n).unwrap()).collect()
}

#[tokio::test]
async fn login_persists_token_and_identity() {
    let srv = TestServer::spawn().await;
    let (client, storage) = srv.logged_in_client().await;

    let session = client.store.session().await.unwrap();
    assert_eq!(session.identity.login, "jdupont");
    assert!(session.has_permission(&Permission::USER_READ));
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("tok-0"));
    assert!(storage.get(USER_KEY).unwrap().is_some());

    // A second client over the same storage picks the session up.
    let restarted = srv.client(storage);
    assert_eq!(
        restarted.store.token().await.map(|t| t.as_str().to_string()),
        Some("tok-0".to_string())
    );
}

#[tokio::test]
async fn wrong_password_leaves_store_unauthenticated() {
    let srv = TestServer::spawn().await;
    let storage = Arc::new(MemoryStorage::new());
    let client = srv.client(storage.clone());

    assert!(!client.store.login("jdupont", "wrong").await);

    assert!(!client.store.is_authenticated().await);
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(srv.backend.login_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_login_keeps_prior_session() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;

    assert!(!client.store.login("jdupont", "wrong").await);

    let token = client.store.token().await.unwrap();
    assert_eq!(token.as_str(), "tok-0");
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_request_replayed() {
    let srv = TestServer::spawn().await;
    let (client, storage) = srv.logged_in_client().await;
    srv.backend.expire();

    let users = client.users.list().await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].display_name(), "Jean");
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(srv.backend.users_calls.load(Ordering::SeqCst), 2);
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));
    // Identity survives the rotation.
    assert_eq!(client.store.session().await.unwrap().identity.login, "jdupont");
}

#[tokio::test]
async fn second_401_after_refresh_is_terminal() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;
    srv.backend.reject_all.store(true, Ordering::SeqCst);

    let err = client.users.list().await.unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(srv.backend.users_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn overlapping_401s_share_one_refresh() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;
    srv.backend.expire();
    srv.backend.refresh_delay_ms.store(100, Ordering::SeqCst);

    let calls = (0..5).map(|_| client.users.list());
    let results = futures_util::future::join_all(calls).await;

    assert!(results.iter().all(Result::is_ok), "{results:?}");
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_refresh_terminates_the_session() {
    let srv = TestServer::spawn().await;
    let (client, storage) = srv.logged_in_client().await;
    srv.backend.expire();
    srv.backend.refresh_rejected.store(true, Ordering::SeqCst);

    let err = client.users.list().await.unwrap_err();

    assert_eq!(err, ApiError::SessionTerminated);
    assert!(err.requires_login());
    assert!(client.store.session().await.is_none());
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(USER_KEY).unwrap(), None);
}

#[tokio::test]
async fn unauthenticated_401_does_not_refresh() {
    let srv = TestServer::spawn().await;
    let client = srv.client(Arc::new(MemoryStorage::new()));

    let err = client.users.list().await.unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn other_failures_pass_through_unchanged() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;

    let err = client
        .gateway
        .execute(RequestAttempt::get("/boom"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Status {
            status: 500,
            body: "kaput".to_string()
        }
    );
    assert!(client.store.is_authenticated().await);
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn logout_clears_local_state_when_remote_fails() {
    let srv = TestServer::spawn().await;
    let (client, storage) = srv.logged_in_client().await;
    srv.backend.logout_fails.store(true, Ordering::SeqCst);

    client.store.logout().await;

    assert!(!client.store.is_authenticated().await);
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn logout_all_clears_only_on_success() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;

    srv.backend.logout_fails.store(true, Ordering::SeqCst);
    let err = client.store.logout_all().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(client.store.is_authenticated().await);

    srv.backend.logout_fails.store(false, Ordering::SeqCst);
    client.store.logout_all().await.unwrap();
    assert!(!client.store.is_authenticated().await);
}

#[tokio::test]
async fn logout_others_keeps_this_session() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;

    client.store.logout_others().await.unwrap();

    assert!(client.store.is_authenticated().await);
}

#[tokio::test]
async fn set_permissions_converges_role() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;
    srv.backend.set_role_permissions(&["USER_READ", "ROLE_READ"]);
    let role_id = RoleId::new();

    let desired = perms(&["USER_READ", "USER_CREATE"]);
    let report = client.roles.set_permissions(role_id, &desired).await.unwrap();

    assert_eq!(report.added, perms(&["USER_CREATE"]));
    assert_eq!(report.removed, perms(&["ROLE_READ"]));
    assert_eq!(
        srv.backend.role_permissions(),
        BTreeSet::from(["USER_CREATE", "USER_READ"].map(String::from))
    );
    assert_eq!(srv.backend.permission_calls.load(Ordering::SeqCst), 2);

    let again = client.roles.set_permissions(role_id, &desired).await.unwrap();
    assert!(again.is_noop());
    assert_eq!(srv.backend.permission_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn partial_reconcile_reports_failures_without_rollback() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;
    srv.backend.set_role_permissions(&["USER_READ", "ROLE_READ"]);
    *srv.backend.failing_permission.lock().unwrap() = Some("USER_DELETE".to_string());
    let role_id = RoleId::new();

    let desired = perms(&["USER_READ", "USER_DELETE", "ROLE_CREATE"]);
    let err = client
        .roles
        .set_permissions(role_id, &desired)
        .await
        .unwrap_err();

    let ReconcileError::Partial {
        attempted,
        report,
        failures,
        ..
    } = err
    else {
        panic!("expected partial failure, got {err:?}");
    };
    assert_eq!(attempted, 3);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].permission, Permission::USER_DELETE);
    assert_eq!(report.added, perms(&["ROLE_CREATE"]));
    assert_eq!(report.removed, perms(&["ROLE_READ"]));
    assert_eq!(
        srv.backend.role_permissions(),
        BTreeSet::from(["ROLE_CREATE", "USER_READ"].map(String::from))
    );
}

#[tokio::test]
async fn dropped_handle_still_completes_refresh() {
    let srv = TestServer::spawn().await;
    let (client, storage) = srv.logged_in_client().await;
    srv.backend.expire();
    srv.backend.refresh_delay_ms.store(50, Ordering::SeqCst);

    drop(client.gateway.spawn(RequestAttempt::get("/users")));

    for _ in 0..100 {
        if srv.backend.users_calls.load(Ordering::SeqCst) == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(srv.backend.users_calls.load(Ordering::SeqCst), 2);
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn spawned_request_can_be_joined() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;

    let handle = client.gateway.spawn(RequestAttempt::get("/users"));
    let response = handle.join().await.unwrap();

    let body: Value = response.json().unwrap();
    assert_eq!(body["_embedded"]["userResponseList"][0]["login"], "jdupont");
}

#[tokio::test]
async fn user_list_reads_hal_collection() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;

    let users = client.users.list().await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].login, "jdupont");
    assert_eq!(users[0].emails, ["jean+test@example.com"]);
}

/// Log out and back in while a refresh for the old token is still in
/// flight; the late outcome must not touch the new session.
async fn relogin_during_refresh(refresh_rejected: bool) {
    let srv = TestServer::spawn().await;
    let (client, storage) = srv.logged_in_client().await;
    srv.backend.expire();
    srv.backend.refresh_delay_ms.store(200, Ordering::SeqCst);
    srv.backend
        .refresh_rejected
        .store(refresh_rejected, Ordering::SeqCst);

    let pending = client.gateway.spawn(RequestAttempt::get("/users"));
    for _ in 0..100 {
        if srv.backend.refresh_calls.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);

    client.store.logout().await;
    assert!(client.store.login("jdupont", PASSWORD).await);
    let fresh = client.store.token().await.unwrap();

    let outcome = pending.join().await;

    assert_eq!(outcome.unwrap_err(), ApiError::SessionTerminated);
    assert_eq!(client.store.token().await, Some(fresh.clone()));
    assert_eq!(
        storage.get(TOKEN_KEY).unwrap().as_deref(),
        Some(fresh.as_str())
    );
    assert!(client.users.list().await.is_ok());
}

#[tokio::test]
async fn late_refresh_failure_spares_a_fresh_login() {
    relogin_during_refresh(true).await;
}

#[tokio::test]
async fn late_refresh_success_spares_a_fresh_login() {
    relogin_during_refresh(false).await;
}

#[tokio::test]
async fn search_sends_query_parameters() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;

    let by_login = client.users.find_by_login("jdupont").await.unwrap();
    let email = Email::parse("jean+test@example.com").unwrap();
    let by_email = client.users.find_by_email(&email).await.unwrap();
    let missing = client.users.find_by_login("nobody").await.unwrap_err();

    assert_eq!(by_login.login, "jdupont");
    assert_eq!(by_email.id, by_login.id);
    assert_eq!(missing.status(), Some(404));
    assert_eq!(
        srv.backend.journal(),
        [
            "GET search/by-login?login=jdupont",
            "GET search/by-email?email=jean+test@example.com",
            "GET search/by-login?login=nobody",
        ]
    );
}

#[tokio::test]
async fn contact_removal_paths_arrive_decoded() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;
    let user_id: UserId = USER_ID.parse().unwrap();

    client
        .users
        .remove_email(user_id, "jean+test@example.com")
        .await
        .unwrap();
    client
        .users
        .remove_phone_number(user_id, "+33612345678")
        .await
        .unwrap();

    assert_eq!(
        srv.backend.journal(),
        [
            format!("DELETE {USER_ID}/emails/jean+test@example.com"),
            format!("DELETE {USER_ID}/phone-numbers/+33612345678"),
        ]
    );
}

#[tokio::test]
async fn user_roles_decode_canonical_role_objects() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;
    let user_id: UserId = USER_ID.parse().unwrap();

    let roles = client.users.roles(user_id).await.unwrap();

    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name.as_str(), "ADMIN");
    assert!(roles[0].permissions.contains(&Permission::ADMIN));
}

#[tokio::test]
async fn user_roles_reject_bare_id_list() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;
    *srv.backend.user_roles_body.lock().unwrap() =
        Some(json!(["6ba7b810-9dad-11d1-80b4-00c04fd430c8"]));
    let user_id: UserId = USER_ID.parse().unwrap();

    let err = client.users.roles(user_id).await.unwrap_err();

    assert!(matches!(err, ApiError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn role_edit_updates_then_refetches_then_reconciles() {
    let srv = TestServer::spawn().await;
    let (client, _storage) = srv.logged_in_client().await;
    srv.backend.set_role_permissions(&["USER_READ", "ROLE_READ"]);
    let role_id = RoleId::new();

    let update = UpdateRole {
        name: "SUPPORT".to_string(),
        description: Some("Helpdesk".to_string()),
    };
    let desired = perms(&["USER_READ", "USER_UPDATE"]);
    let report = client
        .roles
        .update_with_permissions(role_id, &update, &desired)
        .await
        .unwrap();

    assert_eq!(report.added, perms(&["USER_UPDATE"]));
    assert_eq!(report.removed, perms(&["ROLE_READ"]));
    assert_eq!(
        srv.backend.journal(),
        [
            format!("PUT role {role_id} name=\"SUPPORT\""),
            format!("GET role {role_id}"),
        ]
    );
    assert_eq!(
        srv.backend.role_permissions(),
        BTreeSet::from(["USER_READ", "USER_UPDATE"].map(String::from))
    );
}
