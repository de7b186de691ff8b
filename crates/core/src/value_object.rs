//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// A value object wraps a primitive (a decimal amount, an enumerated token) and is
/// only ever built through a validating constructor, so holding one proves the
/// wrapped value is legal. There are no setters: a different value means a new
/// instance.
///
/// ```ignore
/// let price = Price::new(dec!(12.50))?;
/// assert_eq!(price, Price::new(dec!(12.5))?);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
