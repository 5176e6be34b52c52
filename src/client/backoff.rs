use std::fmt;
use std::time::Duration;

use crate::error::ApiError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

/// Exponential backoff: attempt `n` (numbered from 1) that hits a transient
/// error is followed by a wait of `min(2^n s, max_wait)`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub max_wait: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl BackoffPolicy {
    pub fn wait_for_attempt(&self, attempt: u32) -> Duration {
        // 2^9 already exceeds the 300s cap; clamp the exponent to avoid overflow.
        let exponent = attempt.clamp(1, 32);
        let seconds = 1u64 << exponent;
        Duration::from_secs(seconds).min(self.max_wait)
    }

    /// Sum of every wait the client could sit through before giving up.
    pub fn worst_case_total(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.wait_for_attempt(attempt))
            .sum()
    }
}

/// Emitted before each backoff sleep.
#[derive(Debug, Clone)]
pub struct BackoffEvent<'a> {
    pub label: &'a str,
    /// The attempt that just failed.
    pub attempt: u32,
    pub max_attempts: u32,
    pub wait: Duration,
    /// Including `wait`.
    pub total_waited: Duration,
    pub worst_case_total: Duration,
    pub cause: &'a ApiError,
}

impl fmt::Display for BackoffEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rate limited, waiting {} (waited {} of at most {}) - retry {}/{}",
            self.label,
            format_wait(self.wait),
            format_wait(self.total_waited),
            format_wait(self.worst_case_total),
            self.attempt + 1,
            self.max_attempts,
        )
    }
}

pub fn format_wait(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (mins, secs) = (secs / 60, secs % 60);
    if mins > 0 {
        format!("{mins}m{secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_five_waits_double_from_two_seconds() {
        let policy = BackoffPolicy::default();
        let waits: Vec<u64> = (1..=5).map(|a| policy.wait_for_attempt(a).as_secs()).collect();
        assert_eq!(waits, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn waits_are_capped_at_five_minutes() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.wait_for_attempt(8), Duration::from_secs(256));
        assert_eq!(policy.wait_for_attempt(9), Duration::from_secs(300));
        assert_eq!(policy.wait_for_attempt(20), Duration::from_secs(300));
        assert_eq!(policy.wait_for_attempt(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn worst_case_is_about_an_hour() {
        // 2+4+...+256 = 510, then eleven capped waits of 300.
        assert_eq!(BackoffPolicy::default().worst_case_total(), Duration::from_secs(3810));
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_wait(Duration::from_secs(32)), "32s");
        assert_eq!(format_wait(Duration::from_secs(256)), "4m16s");
    }
}
