use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Permission, Session};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("session expired")]
    Expired,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a session for one permission.
///
/// - No IO
/// - No panics
/// - `ADMIN` grants everything
///
/// This is a UX guard only; the backend remains the authority.
pub fn authorize(
    session: &Session,
    required: &Permission,
    now: DateTime<Utc>,
) -> Result<(), AuthzError> {
    if session.is_expired(now) {
        return Err(AuthzError::Expired);
    }

    let perms = &session.identity.permissions;
    if perms.iter().any(Permission::is_wildcard) || perms.contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// What a screen or command needs before it may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any signed-in user.
    Authenticated,
    /// Every listed permission.
    AllOf(Vec<Permission>),
    /// At least one listed permission.
    AnyOf(Vec<Permission>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// No session, or the session has expired.
    RedirectToLogin,
    /// Signed in, but missing this permission.
    Forbidden(Permission),
}

/// Client-side guard in front of a screen/command.
pub fn guard(
    session: Option<&Session>,
    requirement: &Requirement,
    now: DateTime<Utc>,
) -> GuardDecision {
    let Some(session) = session else {
        return GuardDecision::RedirectToLogin;
    };
    if session.is_expired(now) {
        return GuardDecision::RedirectToLogin;
    }

    match requirement {
        Requirement::Authenticated => GuardDecision::Allow,
        Requirement::AllOf(perms) => {
            for perm in perms {
                if authorize(session, perm, now).is_err() {
                    return GuardDecision::Forbidden(perm.clone());
                }
            }
            GuardDecision::Allow
        }
        Requirement::AnyOf(perms) => {
            if perms.is_empty() || perms.iter().any(|p| authorize(session, p, now).is_ok()) {
                GuardDecision::Allow
            } else {
                GuardDecision::Forbidden(perms[0].clone())
            }
        }
    }
}
