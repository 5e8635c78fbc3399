//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity; two instances with the same attribute
/// values are interchangeable. In the ledger this covers quantity bundles such
/// as per-site stock maps and return breakdowns.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Breakdown { good: i64, damaged: i64 }
///
/// impl ValueObject for Breakdown {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
