// Panic isolation for worker safety
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed
    Success(T),
    /// Execution panicked
    Panicked(String),
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Drive a future to completion, turning a panic into `Panicked`
///
/// The worker loop runs under this guard so a panic inside item execution
/// ends the worker task cleanly and is reported to the pool as a fault.
pub async fn execute_guarded_async<F, T>(future: F) -> PanicGuardResult<T>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(value) => PanicGuardResult::Success(value),
        Err(payload) => {
            let panic_msg = panic_message(payload.as_ref());
            error!(panic_msg = %panic_msg, "Worker task panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_through() {
        match execute_guarded_async(async { 42 }).await {
            PanicGuardResult::Success(v) => assert_eq!(v, 42),
            PanicGuardResult::Panicked(msg) => panic!("unexpected panic: {}", msg),
        }
    }

    #[tokio::test]
    async fn test_panic_is_caught_with_message() {
        let result = execute_guarded_async(async {
            tokio::task::yield_now().await;
            panic!("generator exploded");
        })
        .await;

        match result {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "generator exploded"),
            PanicGuardResult::Success(()) => panic!("panic should have been caught"),
        }
    }

    #[tokio::test]
    async fn test_formatted_panic_message() {
        let result = execute_guarded_async(async {
            let slot = 3;
            panic!("slot {} failed", slot);
        })
        .await;

        match result {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "slot 3 failed"),
            PanicGuardResult::Success(()) => panic!("panic should have been caught"),
        }
    }
}
