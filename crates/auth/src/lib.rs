//! `usermgr-auth` — session identity, RBAC vocabulary and client-side guards.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod permissions;
pub mod roles;
pub mod session;

pub use authorize::{AuthzError, GuardDecision, Requirement, authorize, guard};
pub use permissions::{Permission, PermissionSet};
pub use roles::{Role, RoleName};
pub use session::{AccessToken, Identity, Session};
