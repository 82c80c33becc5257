//! `usermgr-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the auth layer and
//! the API client (identifiers, errors, validated profile values). No IO.

pub mod error;
pub mod id;
pub mod profile;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{RoleId, UserId};
pub use profile::{BirthDate, Email, Login, Password, PhoneNumber};
pub use value_object::ValueObject;
