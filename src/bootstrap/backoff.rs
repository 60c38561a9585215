//! Backoff scheduling
//! Computes the wait before the next startup attempt: a server-supplied
//! retry hint when present, otherwise capped exponential backoff with
//! bounded random jitter

use crate::config::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// Upper bound on the random jitter added to computed delays, in ms.
/// Keeps simultaneously restarting gateway instances from hammering the
/// subgraphs in lockstep.
pub const JITTER_MAX_MS: u64 = 300;

/// Literal marker that carries a server-supplied retry hint inside error
/// text, e.g. `retry-after: 5`. Rate-limited schema fetches embed the
/// subgraph's Retry-After header in this form.
const RETRY_HINT_MARKER: &str = "retry-after:";

/// Extract a retry hint (whole seconds) from an error message, if present.
pub fn parse_retry_hint(message: &str) -> Option<u64> {
    let lowered = message.to_lowercase();
    let start = lowered.find(RETRY_HINT_MARKER)? + RETRY_HINT_MARKER.len();
    let rest = lowered[start..].trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Compute the wait before attempt `attempt + 1`.
///
/// If the error message carries a retry hint, that hint converted to
/// milliseconds is used verbatim - it is authoritative information about
/// the minimum wait and must not be shortened or capped. Otherwise the
/// delay is `min(max_delay_ms, base_delay_ms * 2^(attempt-1))` plus up to
/// [`JITTER_MAX_MS`] of random jitter.
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub fn next_delay(attempt: u32, message: &str, policy: &RetryPolicy) -> Duration {
    if let Some(seconds) = parse_retry_hint(message) {
        // The hint comes from an external header; saturate rather than
        // trust it to fit
        return Duration::from_millis(seconds.saturating_mul(1_000));
    }

    let exponential = policy
        .base_delay_ms
        .saturating_mul(1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX));
    let capped = exponential.min(policy.max_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_MS);

    Duration::from_millis(capped.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 1_500,
            max_delay_ms: 20_000,
        }
    }

    #[test]
    fn test_delay_is_monotonic_up_to_cap_ignoring_jitter() {
        let policy = policy();
        let mut previous_floor = 0;
        for attempt in 1..=8u32 {
            let delay = next_delay(attempt, "connect ECONNREFUSED", &policy).as_millis() as u64;
            let expected_floor = policy
                .base_delay_ms
                .saturating_mul(1 << (attempt - 1))
                .min(policy.max_delay_ms);
            assert!(
                delay >= expected_floor && delay <= expected_floor + JITTER_MAX_MS,
                "attempt {} delay {} outside [{}, {}]",
                attempt,
                delay,
                expected_floor,
                expected_floor + JITTER_MAX_MS
            );
            // The jitter-free schedule itself never decreases
            assert!(expected_floor >= previous_floor);
            previous_floor = expected_floor;
        }
    }

    #[test]
    fn test_exponential_schedule_doubles_from_base() {
        let policy = policy();
        for (attempt, expected) in [(1u32, 1_500u64), (2, 3_000), (3, 6_000), (4, 12_000)] {
            let delay = next_delay(attempt, "503", &policy).as_millis() as u64;
            assert!(delay >= expected && delay <= expected + JITTER_MAX_MS);
        }
    }

    #[test]
    fn test_schedule_caps_at_max_delay() {
        let policy = policy();
        // 1500 * 2^9 is far past the cap
        let delay = next_delay(10, "503", &policy).as_millis() as u64;
        assert!(delay >= policy.max_delay_ms);
        assert!(delay <= policy.max_delay_ms + JITTER_MAX_MS);
    }

    #[test]
    fn test_huge_attempt_number_does_not_overflow() {
        let policy = policy();
        let delay = next_delay(u32::MAX, "503", &policy).as_millis() as u64;
        assert!(delay <= policy.max_delay_ms + JITTER_MAX_MS);
    }

    #[test]
    fn test_retry_hint_is_used_verbatim_regardless_of_attempt() {
        let policy = policy();
        let message = "schema fetch failed for subgraph 'users': 429 Too Many Requests, retry-after: 5";
        for attempt in [1, 2, 7] {
            assert_eq!(
                next_delay(attempt, message, &policy),
                Duration::from_millis(5_000)
            );
        }
    }

    #[test]
    fn test_retry_hint_is_not_capped() {
        let policy = policy();
        let message = "429, retry-after: 90";
        assert_eq!(
            next_delay(1, message, &policy),
            Duration::from_millis(90_000)
        );
    }

    #[test]
    fn test_oversized_retry_hint_saturates_instead_of_overflowing() {
        let policy = policy();
        // u64::MAX seconds parses; the ms conversion must not wrap
        let message = "429, retry-after: 18446744073709551615";
        assert_eq!(
            next_delay(1, message, &policy),
            Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_extreme_delay_cap_saturates_under_jitter() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: u64::MAX,
            max_delay_ms: u64::MAX,
        };
        let delay = next_delay(3, "503", &policy);
        assert_eq!(delay, Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_hint_parser_recognizes_one_literal_format() {
        assert_eq!(parse_retry_hint("retry-after: 12"), Some(12));
        assert_eq!(parse_retry_hint("Retry-After: 3 seconds"), Some(3));
        assert_eq!(parse_retry_hint("retry-after:7"), Some(7));
        assert_eq!(parse_retry_hint("please retry later"), None);
        assert_eq!(parse_retry_hint("retry-after: soon"), None);
        assert_eq!(parse_retry_hint(""), None);
    }
}
