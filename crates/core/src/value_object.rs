//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. In this crate
/// they are also *validated on construction*: holding an [`crate::Email`]
/// means the string already passed the same checks the backend applies, so
/// requests built from them are not rejected for format reasons.
///
/// ```ignore
/// let a = Email::parse("Alice@Example.com")?;
/// let b = Email::parse("alice@example.com")?;
/// assert_eq!(a, b); // normalized, equal by value
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {
    /// Canonical wire representation.
    fn as_str(&self) -> &str;
}
