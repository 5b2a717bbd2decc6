// Fibonacci backoff for the retry consumer

use std::time::Duration;

/// Default backoff unit: `fibonacci(attempt)` seconds
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Iterative Fibonacci, `fibonacci(0) = 0`, `fibonacci(1) = 1`.
///
/// Saturates at `u64::MAX` instead of overflowing for large `n`.
pub fn fibonacci(n: u32) -> u64 {
    let (mut prev, mut curr) = (0u64, 1u64);
    for _ in 0..n {
        let next = prev.saturating_add(curr);
        prev = curr;
        curr = next;
    }
    prev
}

/// Wait before republishing a message whose retry cycle `attempt` just failed.
///
/// No upper cap; the product only saturates.
pub fn backoff_delay(attempt: u32, unit: Duration) -> Duration {
    let factor = u32::try_from(fibonacci(attempt)).unwrap_or(u32::MAX);
    unit.saturating_mul(factor)
}
