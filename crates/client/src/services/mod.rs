//! Typed bindings for the users and roles REST resources.

pub mod roles;
pub mod users;

pub use roles::RoleService;
pub use users::UserService;

/// Percent-encode a user-supplied path segment (emails, phone numbers).
pub(crate) fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}
