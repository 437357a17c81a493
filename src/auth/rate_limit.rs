//! Per-key request accounting over rolling hour and day windows.
//!
//! Counters live in process memory; a restart resets all quotas and there is
//! no coordination across processes. Each `check` call is one unit of quota:
//! the increment happens atomically with the read and sticks even when the
//! ceiling is exceeded. Accounting and denial are separate jobs; the caller
//! rejects the request when `exceeded` is set.

use dashmap::DashMap;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::types::{RateLimit, RateLimitStatus};

const HOUR: Duration = Duration::hours(1);
const DAY: Duration = Duration::hours(24);

/// One rolling window, anchored to the first request inside it rather than
/// to calendar boundaries, so bursts cannot straddle a boundary for double
/// quota.
#[derive(Clone, Copy, Debug)]
struct Window {
    started_at: OffsetDateTime,
    count: u32,
}

impl Window {
    fn new(now: OffsetDateTime) -> Self {
        Self {
            started_at: now,
            count: 0,
        }
    }

    fn closes_at(&self, span: Duration) -> OffsetDateTime {
        self.started_at + span
    }

    /// Reset the window if `now` has reached its close, then count one call.
    fn record(&mut self, now: OffsetDateTime, span: Duration) {
        if now >= self.closes_at(span) {
            self.started_at = now;
            self.count = 0;
        }
        self.count += 1;
    }

    fn remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.count)
    }
}

#[derive(Clone, Copy, Debug)]
struct KeyCounters {
    hour: Window,
    day: Window,
}

/// In-memory quota accountant, shared by all workers.
pub struct RateLimiter {
    counters: DashMap<Uuid, KeyCounters>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Consume one unit of quota for `key_id` and report the result.
    ///
    /// The read and increment are a single step under the key's map entry
    /// lock, so concurrent calls against the same key never under-count.
    /// Contention is scoped to the key; other keys proceed in parallel.
    pub fn check(&self, key_id: Uuid, policy: RateLimit) -> RateLimitStatus {
        self.check_at(key_id, policy, OffsetDateTime::now_utc())
    }

    /// Drop counters whose day window has fully elapsed. Revoked or idle
    /// keys otherwise keep their slot forever.
    pub fn purge_idle(&self) {
        let now = OffsetDateTime::now_utc();
        self.counters.retain(|_, entry| now < entry.day.closes_at(DAY));
    }

    fn check_at(&self, key_id: Uuid, policy: RateLimit, now: OffsetDateTime) -> RateLimitStatus {
        let mut entry = self.counters.entry(key_id).or_insert_with(|| KeyCounters {
            hour: Window::new(now),
            day: Window::new(now),
        });
        entry.hour.record(now, HOUR);
        entry.day.record(now, DAY);

        let hour_remaining = entry.hour.remaining(policy.requests_per_hour);
        let day_remaining = entry.day.remaining(policy.requests_per_day);
        let exceeded = entry.hour.count > policy.requests_per_hour
            || entry.day.count > policy.requests_per_day;

        // The binding window is the one with less headroom; its close is
        // when the caller can expect quota again.
        let (remaining, reset_time) = if day_remaining < hour_remaining {
            (day_remaining, entry.day.closes_at(DAY))
        } else {
            (hour_remaining, entry.hour.closes_at(HOUR))
        };

        RateLimitStatus {
            remaining,
            reset_time,
            exceeded,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(per_hour: u32, per_day: u32) -> RateLimit {
        RateLimit {
            requests_per_hour: per_hour,
            requests_per_day: per_day,
            max_servers: 5,
        }
    }

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000 + seconds).expect("valid timestamp")
    }

    #[test]
    fn nth_call_allowed_next_exceeded() {
        let limiter = RateLimiter::new();
        let key = Uuid::new_v4();
        let policy = policy(3, 100);

        for call in 1..=3 {
            let status = limiter.check_at(key, policy, at(call));
            assert!(!status.exceeded, "call {call} should be within quota");
        }
        let status = limiter.check_at(key, policy, at(4));
        assert!(status.exceeded);
        assert_eq!(status.remaining, 0);
    }

    #[test]
    fn increment_sticks_when_exceeded() {
        let limiter = RateLimiter::new();
        let key = Uuid::new_v4();
        let policy = policy(1, 100);

        assert!(!limiter.check_at(key, policy, at(0)).exceeded);
        assert!(limiter.check_at(key, policy, at(1)).exceeded);
        // Still exceeded on every subsequent call, not just the next one.
        assert!(limiter.check_at(key, policy, at(2)).exceeded);
    }

    #[test]
    fn window_resets_after_reset_time() {
        let limiter = RateLimiter::new();
        let key = Uuid::new_v4();
        let policy = policy(2, 100);

        let first = limiter.check_at(key, policy, at(0));
        assert_eq!(first.reset_time, at(3_600));
        limiter.check_at(key, policy, at(60));
        assert!(limiter.check_at(key, policy, at(120)).exceeded);

        // Window is anchored to first use: quota returns at second 3600,
        // not at the top of a calendar hour.
        let after_reset = limiter.check_at(key, policy, at(3_600));
        assert!(!after_reset.exceeded);
        assert_eq!(after_reset.remaining, 1);
        assert_eq!(after_reset.reset_time, at(7_200));
    }

    #[test]
    fn day_ceiling_binds_across_hour_resets() {
        let limiter = RateLimiter::new();
        let key = Uuid::new_v4();
        let policy = policy(100, 3);

        limiter.check_at(key, policy, at(0));
        limiter.check_at(key, policy, at(3_600));
        let third = limiter.check_at(key, policy, at(7_200));
        assert!(!third.exceeded);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.reset_time, at(86_400));

        let fourth = limiter.check_at(key, policy, at(10_800));
        assert!(fourth.exceeded);
        assert_eq!(fourth.reset_time, at(86_400));
    }

    #[test]
    fn keys_are_accounted_independently() {
        let limiter = RateLimiter::new();
        let policy = policy(1, 100);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(!limiter.check_at(first, policy, at(0)).exceeded);
        assert!(limiter.check_at(first, policy, at(1)).exceeded);
        assert!(!limiter.check_at(second, policy, at(2)).exceeded);
    }

    #[test]
    fn purge_drops_only_elapsed_entries() {
        let limiter = RateLimiter::new();
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let long_ago = OffsetDateTime::now_utc() - Duration::hours(48);

        limiter.check_at(stale, policy(10, 10), long_ago);
        limiter.check(fresh, policy(10, 10));
        limiter.purge_idle();

        assert!(!limiter.counters.contains_key(&stale));
        assert!(limiter.counters.contains_key(&fresh));
    }
}
