// Pipeline constants (no magic values)
use std::time::Duration;

/// Notifications fetched per delivery pass
pub const DEFAULT_BATCH_SIZE: u32 = 2;

/// Pause between scheduler passes (10s)
pub const DEFAULT_SCHEDULER_INTERVAL: Duration = Duration::from_secs(10);

/// Retry cycles allowed before a message is dead-lettered
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Sleep after a queue receive error before trying again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// How long shutdown waits for a background loop to exit (5s)
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
