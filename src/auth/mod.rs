//! Credential and quota services.
//!
//! This module coordinates session tokens, api keys, and per-key rate
//! limiting behind one gateway entry point.
//!
//! ## Request flow
//!
//! A request arrives with a bearer session token or a bearer api key
//! (`gk_`-prefixed). [`gateway::AuthGateway::authenticate`] dispatches to
//! the matching path, consumes one unit of quota on the key path, and
//! returns an authenticated principal or a terminal failure.
//!
//! ## Quota scope
//!
//! Rate-limit counters are per process and reset on restart. There is no
//! cross-process coordination; deployments that fan out across processes
//! multiply the effective ceiling accordingly.

pub mod gateway;
pub mod keys;
pub mod rate_limit;
mod state;
pub mod token;
pub mod types;
mod utils;

pub use gateway::{AuthGateway, AuthOutcome};
pub use keys::{ApiKeyService, CreatedApiKey};
pub use rate_limit::RateLimiter;
pub use state::AuthConfig;
pub use token::TokenGenerator;
