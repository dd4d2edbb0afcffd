//! Admission & Dispatch (C6): the glue pipeline that authenticates a
//! request, routes and rate-limits it, asks the policy module whether
//! to admit it, dispatches to the right provider adapter, accounts the
//! resulting cost and publishes a `UsageEvent` - regardless of whether
//! the request was ultimately admitted.

pub mod handlers;
pub mod pipeline;
pub mod providers;
pub mod state;

pub use providers::ProviderRegistry;
pub use state::ProxyState;
