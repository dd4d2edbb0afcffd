//! Shared types for BudgetGuard: entity structs, numeric id wrappers, the
//! `BgError` taxonomy, and environment-variable configuration.
//!
//! Every component crate (`bg_auth`, `bg_catalog`, `bg_store`, `bg_policy`,
//! `bg_cost`, `bg_providers`, `bg_proxy`, `bg_ledger`) depends on this
//! crate for the vocabulary they share; none of them redefine these types.

#![cfg_attr(not(feature = "enabled"), allow(unused))]

#[cfg(feature = "enabled")]
pub mod config;

#[cfg(feature = "enabled")]
pub mod entities;

#[cfg(feature = "enabled")]
pub mod error;

#[cfg(feature = "enabled")]
pub mod ids;

#[cfg(feature = "enabled")]
pub use config::{ BudgetGuardConfig, ConfigError };
#[cfg(feature = "enabled")]
pub use entities::*;
#[cfg(feature = "enabled")]
pub use error::BgError;
#[cfg(feature = "enabled")]
pub use ids::*;

#[cfg(feature = "enabled")]
pub type Result<T> = std::result::Result<T, BgError>;
