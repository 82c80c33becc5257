use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use usermgr_core::DomainError;

/// Permission identifier.
///
/// Permissions are opaque upper-case tokens (e.g. `USER_READ`). The backend
/// ships a fixed vocabulary (see [`Permission::KNOWN`]) but may grow it, so
/// unknown tokens are carried through rather than rejected. `ADMIN` acts as
/// a wildcard for client-side checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

/// Unordered permission set (ordered storage for stable output).
pub type PermissionSet = BTreeSet<Permission>;

impl Permission {
    pub const USER_CREATE: Permission = Permission(Cow::Borrowed("USER_CREATE"));
    pub const USER_READ: Permission = Permission(Cow::Borrowed("USER_READ"));
    pub const USER_UPDATE: Permission = Permission(Cow::Borrowed("USER_UPDATE"));
    pub const USER_UPDATE_SELF: Permission = Permission(Cow::Borrowed("USER_UPDATE_SELF"));
    pub const USER_DELETE: Permission = Permission(Cow::Borrowed("USER_DELETE"));
    pub const ROLE_CREATE: Permission = Permission(Cow::Borrowed("ROLE_CREATE"));
    pub const ROLE_READ: Permission = Permission(Cow::Borrowed("ROLE_READ"));
    pub const ROLE_UPDATE: Permission = Permission(Cow::Borrowed("ROLE_UPDATE"));
    pub const ROLE_DELETE: Permission = Permission(Cow::Borrowed("ROLE_DELETE"));
    pub const ADMIN: Permission = Permission(Cow::Borrowed("ADMIN"));

    /// Vocabulary offered by the console when editing a role.
    pub const KNOWN: [Permission; 10] = [
        Self::USER_CREATE,
        Self::USER_READ,
        Self::USER_UPDATE,
        Self::USER_UPDATE_SELF,
        Self::USER_DELETE,
        Self::ROLE_CREATE,
        Self::ROLE_READ,
        Self::ROLE_UPDATE,
        Self::ROLE_DELETE,
        Self::ADMIN,
    ];

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Parse user input. Tokens end up in URL paths, so only `A-Z`, digits
    /// and `_` are accepted. Input is upper-cased first.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let token = raw.trim().to_ascii_uppercase();
        if token.is_empty() {
            return Err(DomainError::validation("permission", "permission cannot be empty"));
        }
        if !token
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(DomainError::validation("permission", format!(
                "invalid permission token '{token}'"
            )));
        }
        Ok(Self(Cow::Owned(token)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "ADMIN"
    }

    pub fn is_known(&self) -> bool {
        Self::KNOWN.iter().any(|k| k == self)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for Permission {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
