//! Rate Limiter (token bucket)
//!
//! Guards the mutating RPC methods against request floods.

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default burst size
pub const DEFAULT_BURST: u32 = 50;
/// Default sustained rate (requests per second)
pub const DEFAULT_RATE_PER_SEC: u32 = 20;

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

pub struct RateLimiter {
    capacity: f64,
    rate_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `burst` requests at once, refilled at `rate_per_sec`
    pub fn new(burst: u32, rate_per_sec: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            capacity,
            rate_per_sec: f64::from(rate_per_sec),
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Take one token; false when the bucket is empty
    pub async fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_BURST, DEFAULT_RATE_PER_SEC)
    }
}
