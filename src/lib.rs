//! # Gatekeeper (Credential & Quota Core)
//!
//! `gatekeeper` guards a multi-tenant service: it issues and verifies
//! session tokens, manages long-lived api keys with scoped permissions,
//! enforces per-key rate limits, and keeps its own schema consistent across
//! deployments with forward/backward migrations.
//!
//! ## Entry points
//!
//! - [`auth::AuthGateway::authenticate`] is the one call the routing layer
//!   makes per inbound request; it returns an authenticated principal or a
//!   terminal failure with a stable status mapping.
//! - [`migrate::run`] brings the schema up to date and must complete before
//!   the gateway accepts traffic.
//! - The `gatekeeper` binary wraps migrations and connectivity checks for
//!   operators.
//!
//! ## Credentials
//!
//! Session tokens are HMAC-signed and never persisted; api keys are random
//! `gk_`-prefixed secrets whose SHA-256 hash is the only form the database
//! ever stores. Revoking a key deletes its row, so the next validation of
//! the raw secret fails.
//!
//! ## Quotas
//!
//! Rate limits are accounted per key over rolling hour and day windows
//! anchored to first use. Counters live in process memory: restarts reset
//! quotas, and multiple processes do not coordinate.

pub mod auth;
pub mod cli;
pub mod error;
pub mod migrate;
pub mod store;
