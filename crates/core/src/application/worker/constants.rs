// Worker constants (No magic values)
use std::time::Duration;

/// Default number of worker slots
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Default calls per external capability (first try included)
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default retry backoff unit (1000ms = 1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Delay before respawning a faulted worker, multiplied by consecutive faults
pub const DEFAULT_RESTART_BACKOFF_MS: u64 = 250;

/// Upper bound for the respawn delay
pub const MAX_RESTART_BACKOFF: Duration = Duration::from_secs(5);

/// Placeholder image substituted when generation irrecoverably fails
pub const DEFAULT_FALLBACK_URL: &str = "https://placehold.co/1024x1024?text=Image+Unavailable";

/// Sleep duration when the queue has nothing to deliver (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a broker error before polling again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// How long the consumer waits for in-flight deliveries on shutdown
pub const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
