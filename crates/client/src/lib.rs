//! `usermgr-client` — authenticated API access for the user/role console.
//!
//! **Responsibility:** everything the console does over HTTP.
//!
//! - [`SessionStore`]: the one session of this client (token + identity),
//!   persisted through a [`SessionStorage`]
//! - [`Gateway`]: bearer auth, a single silent refresh on 401, replay once
//! - [`reconcile`]: converge a role's permissions to a desired set
//! - [`UserService`] / [`RoleService`]: typed REST bindings
//!
//! The backend remains the authority for every decision; nothing here
//! caches domain data.

pub mod config;
pub mod dto;
pub mod error;
pub mod gateway;
pub mod reconcile;
pub mod services;
pub mod session_store;
pub mod storage;

use std::sync::Arc;

pub use config::ClientConfig;
pub use error::{ApiError, ConfigError};
pub use gateway::{ApiResponse, Gateway, RequestAttempt, RequestHandle};
pub use reconcile::{
    FailedOperation, PermissionDiff, PermissionOp, ReconcileError, ReconcileReport,
    RolePermissions, reconcile,
};
pub use services::{RoleService, UserService};
pub use session_store::SessionStore;
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};

/// Everything a console front-end needs, wired to one shared session.
#[derive(Clone)]
pub struct ConsoleClient {
    pub store: Arc<SessionStore>,
    pub gateway: Gateway,
    pub users: UserService,
    pub roles: RoleService,
}

impl ConsoleClient {
    /// Build the client and hydrate the session from `storage`.
    pub fn new(
        config: &ClientConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, ConfigError> {
        let http = config.http_client()?;
        let store = SessionStore::init(http.clone(), config.base_url(), storage);
        let gateway = Gateway::new(http, config.base_url(), store.clone());

        Ok(Self {
            users: UserService::new(gateway.clone()),
            roles: RoleService::new(gateway.clone()),
            store,
            gateway,
        })
    }

    /// Client backed by the configured session file (or memory if none).
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let storage: Arc<dyn SessionStorage> = match config.session_file() {
            Some(path) => Arc::new(FileStorage::new(path.to_path_buf())),
            None => Arc::new(MemoryStorage::new()),
        };
        Self::new(config, storage)
    }
}
