//! Process-wide auth configuration.
//!
//! Built once at startup from CLI/env values and passed explicitly to every
//! component that needs it. Nothing here is hot-reloaded; rotating the token
//! secret requires a restart and invalidates all outstanding session tokens.

use secrecy::SecretString;

use super::types::RateLimit;

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_REQUESTS_PER_HOUR: u32 = 1_000;
const DEFAULT_REQUESTS_PER_DAY: u32 = 10_000;
const DEFAULT_MAX_SERVERS: u32 = 5;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_secret: SecretString,
    token_ttl_seconds: i64,
    default_rate_limit: RateLimit,
}

impl AuthConfig {
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            default_rate_limit: RateLimit {
                requests_per_hour: DEFAULT_REQUESTS_PER_HOUR,
                requests_per_day: DEFAULT_REQUESTS_PER_DAY,
                max_servers: DEFAULT_MAX_SERVERS,
            },
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_default_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.default_rate_limit = rate_limit;
        self
    }

    pub(crate) fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    /// Policy applied to keys created without an explicit limit.
    #[must_use]
    pub fn default_rate_limit(&self) -> RateLimit {
        self.default_rate_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new(SecretString::from("secret"));
        assert_eq!(config.token_ttl_seconds(), super::DEFAULT_TOKEN_TTL_SECONDS);
        assert_eq!(
            config.default_rate_limit().requests_per_hour,
            super::DEFAULT_REQUESTS_PER_HOUR
        );

        let config = config
            .with_token_ttl_seconds(60)
            .with_default_rate_limit(RateLimit {
                requests_per_hour: 2,
                requests_per_day: 20,
                max_servers: 1,
            });
        assert_eq!(config.token_ttl_seconds(), 60);
        assert_eq!(config.default_rate_limit().requests_per_day, 20);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let config = AuthConfig::new(SecretString::from("super-secret"));
        let formatted = format!("{config:?}");
        assert!(!formatted.contains("super-secret"));
    }
}
