//! Type-safe numeric entity identifiers
//!
//! Every core entity (`Tenant`, `ApiKey`, `Budget`, ...) is keyed by an
//! auto-increment `i64` primary key in the relational store. Wrapping each
//! one in its own type prevents passing a `TagId` where a `TenantId` is
//! expected, while still mapping transparently onto a SQLite `INTEGER`
//! column via `sqlx::Type`.

use std::fmt;

/// Defines a newtype wrapper around `i64` with `Display`, `sqlx::Type` and
/// serde support.
macro_rules! define_id
{
  ( $( #[ $meta:meta ] )* $name:ident ) =>
  {
    $( #[ $meta ] )*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[derive(serde::Serialize, serde::Deserialize)]
    #[derive(sqlx::Type)]
    #[sqlx(transparent)]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl $name
    {
      /// Raw numeric value of this id.
      #[must_use]
      pub fn get(self) -> i64
      {
        self.0
      }
    }

    impl fmt::Display for $name
    {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
      {
        write!(f, "{}", self.0)
      }
    }

    impl From<i64> for $name
    {
      fn from(value: i64) -> Self
      {
        Self(value)
      }
    }

    impl From<$name> for i64
    {
      fn from(id: $name) -> Self
      {
        id.0
      }
    }
  };
}

define_id!(
  /// Primary key of a `Tenant` row.
  TenantId
);

define_id!(
  /// Primary key of an `ApiKey` row.
  ApiKeyId
);

define_id!(
  /// Primary key of a `ModelPricing` row.
  ModelPricingId
);

define_id!(
  /// Primary key of a `Budget` row.
  BudgetId
);

define_id!(
  /// Primary key of a `TagBudget` row.
  TagBudgetId
);

define_id!(
  /// Primary key of a `Tag` row.
  TagId
);

define_id!(
  /// Primary key of a `UsageLedger` row.
  UsageLedgerId
);

define_id!(
  /// Primary key of a `RequestTag` row.
  RequestTagId
);

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn round_trips_through_i64()
  {
    let id = TenantId::from(42);
    assert_eq!(i64::from(id), 42);
    assert_eq!(id.get(), 42);
  }

  #[test]
  fn displays_bare_number()
  {
    let id = TagId::from(7);
    assert_eq!(id.to_string(), "7");
  }

  #[test]
  fn serializes_as_bare_number()
  {
    let id = ApiKeyId::from(9);
    assert_eq!(serde_json::to_string(&id).unwrap(), "9");
  }

  #[test]
  fn deserializes_from_bare_number()
  {
    let id: BudgetId = serde_json::from_str("3").unwrap();
    assert_eq!(id.get(), 3);
  }
}
