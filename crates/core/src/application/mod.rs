// Application Layer - Use Cases and Business Logic

pub mod consumer;
pub mod pool;
pub mod prompt;
pub mod recovery;
pub mod retry;
pub mod worker;

// Re-exports
pub use consumer::{ConsumeStats, QueueConsumer, Settlement};
pub use pool::{PoolConfig, PoolStats, WorkerPool};
pub use prompt::enrich_prompt;
pub use recovery::{RecoveryReport, RecoveryService};
pub use retry::{RetryPolicy, RetryExhausted};
pub use worker::{
    shutdown_channel, ExecutorConfig, ItemExecutor, ShutdownSender, ShutdownToken, WorkerDeps,
};
