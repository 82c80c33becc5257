//! Validated profile values (login, password, email, phone number, birth date).
//!
//! The rules mirror what the backend enforces, so the console can reject bad
//! input before spending a round-trip on it.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

static LOGIN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("static regex"));

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_+&*-]+(?:\.[a-zA-Z0-9_+&*-]+)*@(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,7}$")
        .expect("static regex")
});

// ─────────────────────────────────────────────────────────────────────────────
// Login
// ─────────────────────────────────────────────────────────────────────────────

/// Account login (4..=50 chars of letters, digits, `.`, `_`, `-`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Login(String);

impl Login {
    pub const MIN_LENGTH: usize = 4;
    pub const MAX_LENGTH: usize = 50;

    pub fn parse(value: &str) -> DomainResult<Self> {
        let value = value.trim();
        let len = value.chars().count();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&len) {
            return Err(DomainError::validation("login", format!(
                "login must be between {} and {} characters",
                Self::MIN_LENGTH,
                Self::MAX_LENGTH
            )));
        }
        if !LOGIN_PATTERN.is_match(value) {
            return Err(DomainError::validation(
                "login",
                "login can only contain letters, numbers, dots, hyphens, and underscores",
            ));
        }
        Ok(Self(value.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Password
// ─────────────────────────────────────────────────────────────────────────────

/// Plain-text password that satisfies the backend strength policy.
///
/// `Debug` is redacted; the value only leaves through [`ValueObject::as_str`]
/// when a request body is built.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct Password(String);

impl Password {
    pub const MIN_LENGTH: usize = 8;
    pub const MAX_LENGTH: usize = 100;

    pub fn parse(value: &str) -> DomainResult<Self> {
        let len = value.chars().count();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&len) {
            return Err(DomainError::validation("password", format!(
                "password must be between {} and {} characters",
                Self::MIN_LENGTH,
                Self::MAX_LENGTH
            )));
        }
        if !value.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::validation(
                "password",
                "password must contain at least one uppercase letter",
            ));
        }
        if !value.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(DomainError::validation(
                "password",
                "password must contain at least one lowercase letter",
            ));
        }
        if !value.chars().any(|c| c.is_ascii_digit()) {
            return Err(DomainError::validation("password", "password must contain at least one digit"));
        }
        if value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::validation(
                "password",
                "password must contain at least one special character",
            ));
        }
        Ok(Self(value.to_string()))
    }
}

impl core::fmt::Debug for Password {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Password(***)")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Email
// ─────────────────────────────────────────────────────────────────────────────

/// Email address, trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub const MAX_LENGTH: usize = 255;

    pub fn parse(value: &str) -> DomainResult<Self> {
        let value = value.trim().to_lowercase();
        if value.is_empty() {
            return Err(DomainError::validation("email", "email cannot be empty"));
        }
        if value.len() > Self::MAX_LENGTH {
            return Err(DomainError::validation("email", format!(
                "email cannot exceed {} characters",
                Self::MAX_LENGTH
            )));
        }
        if !EMAIL_PATTERN.is_match(&value) {
            return Err(DomainError::validation("email", "invalid email format"));
        }
        Ok(Self(value))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Phone number
// ─────────────────────────────────────────────────────────────────────────────

/// Phone number with whitespace stripped (`"+33 6 12 34 56 78"` → `"+33612345678"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub const MAX_LENGTH: usize = 20;
    const MIN_DIGITS: usize = 6;

    pub fn parse(value: &str) -> DomainResult<Self> {
        let normalized: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        if normalized.is_empty() {
            return Err(DomainError::validation("phone_number", "phone number cannot be empty"));
        }
        if normalized.len() > Self::MAX_LENGTH {
            return Err(DomainError::validation("phone_number", format!(
                "phone number cannot exceed {} characters",
                Self::MAX_LENGTH
            )));
        }

        let body = normalized.strip_prefix('+').unwrap_or(&normalized);
        if !body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | '(' | ')'))
        {
            return Err(DomainError::validation("phone_number", "invalid phone number format"));
        }
        if body.chars().filter(|c| c.is_ascii_digit()).count() < Self::MIN_DIGITS {
            return Err(DomainError::validation("phone_number", "phone number is too short"));
        }

        Ok(Self(normalized))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Birth date
// ─────────────────────────────────────────────────────────────────────────────

/// Birth date (ISO `YYYY-MM-DD` on the wire), never in the future.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BirthDate(NaiveDate);

impl BirthDate {
    pub const ADULT_AGE: u32 = 18;

    /// Validate `date` against `today` (passed in to keep this pure).
    pub fn new(date: NaiveDate, today: NaiveDate) -> DomainResult<Self> {
        if date > today {
            return Err(DomainError::validation("birth_date", "birth date cannot be in the future"));
        }
        Ok(Self(date))
    }

    pub fn parse(value: &str, today: NaiveDate) -> DomainResult<Self> {
        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|e| DomainError::validation("birth_date", format!("invalid birth date: {e}")))?;
        Self::new(date, today)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Completed years at `today`.
    pub fn age(&self, today: NaiveDate) -> u32 {
        let mut years = today.year() - self.0.year();
        if (today.month(), today.day()) < (self.0.month(), self.0.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }

    pub fn is_adult(&self, today: NaiveDate) -> bool {
        self.age(today) >= Self::ADULT_AGE
    }
}

impl core::fmt::Display for BirthDate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

macro_rules! impl_string_value {
    ($t:ty) => {
        impl ValueObject for $t {
            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

macro_rules! impl_try_from_string {
    ($t:ty) => {
        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }
    };
}

impl_string_value!(Login);
impl_string_value!(Email);
impl_string_value!(PhoneNumber);
impl_try_from_string!(Login);
impl_try_from_string!(Email);
impl_try_from_string!(PhoneNumber);

// Password intentionally has no Display.
impl ValueObject for Password {
    fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Password> for String {
    fn from(value: Password) -> Self {
        value.0
    }
}
