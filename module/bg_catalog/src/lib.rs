//! Catalog (C2): maps a model name to a provider and unit prices.
//!
//! The relational schema (including the `model_pricing` table) is owned
//! and migrated by `bg_store`; this crate only reads from an
//! already-migrated pool. Pricing is read-mostly, so lookups are served
//! from a short-lived `ArcSwap` snapshot of the whole table (per the
//! concurrency model's "read-mostly, short process-local cache
//! permitted" allowance) rather than hitting SQLite on every call,
//! mirroring the `ArcSwap` pattern `bg_cost`'s prior pricing manager used
//! against an embedded JSON file, now pointed at the database instead.

mod catalog;

pub use catalog::Catalog;
