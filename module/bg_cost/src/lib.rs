//! Cost Estimator (C5): token counting and USD cost computation.
//!
//! Token counting is BPE-based (`tiktoken-rs`) when the upstream response
//! doesn't report actual usage, with the message-framing overhead and
//! fallback-pricing rules described for this component. Currency
//! arithmetic elsewhere in the pipeline uses the microdollar integer
//! representation in `converter` to avoid floating-point drift in the
//! Redis running-sum keys.

#![cfg_attr(not(feature = "enabled"), allow(unused))]

#[cfg(feature = "enabled")]
pub mod converter;

#[cfg(feature = "enabled")]
pub mod estimator;

#[cfg(feature = "enabled")]
pub use estimator::*;
