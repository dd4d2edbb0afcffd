//! Credential Resolver (C1).
//!
//! Authenticates inbound requests by their `X-API-Key` header against
//! the `api_keys` table owned by `bg_store`, with a short-lived
//! process-local cache so steady-state traffic doesn't pay for a bcrypt
//! verification on every request.

pub mod cache;
pub mod extractor;
pub mod resolver;

pub use cache::CredentialCache;
pub use extractor::{ ApiKeyAuth, AuthOutcome, AuthState };
pub use resolver::{ hash_secret, AuthenticatedKey, CredentialResolver };
