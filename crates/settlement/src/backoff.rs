//! Equal-jitter retry backoff.

use std::time::Duration;

use rand::Rng;

/// Retries allowed before a transient failure is force-finalized.
pub const MAX_RETRIES: u32 = 10;

/// Base delay for the first retry.
const MIN_DELAY_MS: u64 = 2_000;

/// Cap on the exponential delay.
const MAX_DELAY_MS: u64 = 60_000;

/// Computes the equal-jitter delay for a 1-based retry attempt.
///
/// `capped = min(MIN_DELAY * 2^(attempt-1), MAX_DELAY)`; the returned delay
/// is `capped/2` plus a uniform random share of the other half, so retries
/// spread out without ever halving below the deterministic floor.
pub fn equal_jitter_delay(attempt: u32) -> Duration {
    delay_with_rng(attempt, &mut rand::thread_rng())
}

fn delay_with_rng(attempt: u32, rng: &mut impl Rng) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63);
    let capped = MIN_DELAY_MS
        .saturating_mul(1u64 << exponent)
        .min(MAX_DELAY_MS);
    let half = capped / 2;
    Duration::from_millis(half + rng.gen_range(0..=half))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn delay_stays_within_equal_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 1..=MAX_RETRIES {
            let capped = (MIN_DELAY_MS * 2u64.pow(attempt - 1)).min(MAX_DELAY_MS);
            for _ in 0..100 {
                let delay = delay_with_rng(attempt, &mut rng).as_millis() as u64;
                assert!(
                    (capped / 2..=capped).contains(&delay),
                    "attempt {attempt}: delay {delay} outside [{}, {capped}]",
                    capped / 2
                );
            }
        }
    }

    #[test]
    fn delay_caps_at_max() {
        let mut rng = StdRng::seed_from_u64(7);
        // attempt 6 onward: 2000 * 2^5 = 64000 > 60000
        for attempt in [6, 10, 50, u32::MAX] {
            let delay = delay_with_rng(attempt, &mut rng).as_millis() as u64;
            assert!((MAX_DELAY_MS / 2..=MAX_DELAY_MS).contains(&delay));
        }
    }

    #[test]
    fn first_attempt_starts_at_min_delay() {
        let mut rng = StdRng::seed_from_u64(1);
        let delay = delay_with_rng(1, &mut rng).as_millis() as u64;
        assert!((MIN_DELAY_MS / 2..=MIN_DELAY_MS).contains(&delay));
    }
}
