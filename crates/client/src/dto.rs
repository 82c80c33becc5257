//! Wire shapes of the backend REST API (camelCase JSON).

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use usermgr_auth::{AccessToken, Identity, PermissionSet, RoleName, Session};
use usermgr_core::{BirthDate, Email, Login, Password, PhoneNumber, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshTokenRequest<'a> {
    pub token: &'a str,
}

/// `POST /auth/login` and `POST /auth/refresh` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: AccessToken,
    pub user_id: UserId,
    pub login: String,
    #[serde(default)]
    pub roles: BTreeSet<RoleName>,
    #[serde(default)]
    pub permissions: PermissionSet,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthResponse {
    pub fn into_session(self) -> Session {
        Session::new(
            self.token,
            Identity {
                id: self.user_id,
                login: self.login,
                roles: self.roles,
                permissions: self.permissions,
                expires_at: self.expires_at,
            },
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// `GET /users/:id` response. Absent fields are omitted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub login: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub is_adult: Option<bool>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
}

impl UserResponse {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => self.login.clone(),
        }
    }
}

/// `GET /users` response: a HAL collection.
///
/// The backend omits `_embedded` entirely for an empty collection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserCollection {
    #[serde(rename = "_embedded", default)]
    embedded: Option<EmbeddedUsers>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddedUsers {
    #[serde(default)]
    user_response_list: Vec<UserResponse>,
}

impl UserCollection {
    pub fn into_users(self) -> Vec<UserResponse> {
        self.embedded
            .map(|e| e.user_response_list)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    pub login: Login,
    pub password: Password,
    pub last_name: String,
    pub first_name: String,
    pub birth_date: BirthDate,
    pub emails: Vec<Email>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<PhoneNumber>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePersonalInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    pub birth_date: BirthDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddEmail {
    pub email: Email,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPhoneNumber {
    pub phone_number: PhoneNumber,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: Password,
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CreateRole {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateRole {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
