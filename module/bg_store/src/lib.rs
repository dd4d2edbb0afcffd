//! Budget & Limit Store (C3).
//!
//! Owns the relational schema (migrated here, read directly by `bg_auth`
//! and `bg_catalog` against the same pool rather than through this
//! crate, to avoid a dependency cycle) and the two-tier Redis/SQLite
//! read path for budgets, rate limits, tag budgets and tag sets.

pub mod budget_store;
pub mod cache;
pub mod period;
pub mod schema;

pub use budget_store::{ BudgetAmount, BudgetStore };
pub use cache::{ Cache, RedisCache };
pub use period::{ custom_window, window_for, Window };
