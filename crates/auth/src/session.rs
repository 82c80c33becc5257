use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use usermgr_core::UserId;

use crate::{Permission, PermissionSet, RoleName};

/// Opaque bearer token.
///
/// `Debug` is redacted so tokens never end up in logs by accident.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Identity of the signed-in user, persisted next to the token (`user` key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    pub login: String,
    #[serde(default)]
    pub roles: std::collections::BTreeSet<RoleName>,
    #[serde(default)]
    pub permissions: PermissionSet,
    /// Token expiry, Unix milliseconds on the wire.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,
}

/// The one active authentication session of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: AccessToken,
    pub identity: Identity,
}

impl Session {
    pub fn new(token: AccessToken, identity: Identity) -> Self {
        Self { token, identity }
    }

    /// Replace the token after a successful refresh. Identity is kept.
    pub fn rotate(&mut self, token: AccessToken, expires_at: Option<DateTime<Utc>>) {
        self.token = token;
        if expires_at.is_some() {
            self.identity.expires_at = expires_at;
        }
    }

    /// A session without a known expiry is never considered expired locally;
    /// the backend will answer 401 and the gateway refreshes.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.identity.expires_at, Some(exp) if now >= exp)
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.identity.permissions.contains(permission)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.identity.roles.iter().any(|r| r.as_str() == role)
    }
}
