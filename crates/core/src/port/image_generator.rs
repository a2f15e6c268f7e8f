// Image Generation Port
// Opaque, retryable capability: enriched prompt + size in, raw image bytes out

use crate::port::CapabilityError;
use async_trait::async_trait;

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image
    ///
    /// # Errors
    /// - `CapabilityError::Transient` on network/service failure (retried)
    /// - `CapabilityError::Rejected` when the prompt or size is refused
    async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, CapabilityError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted behavior for one call
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Succeed,
        Fail(String),
        Reject(String),
        /// Panic with message (for worker fault testing)
        Panic(String),
        /// Sleep, then succeed
        Delay(Duration),
    }

    /// Mock generator that plays a script, then falls back to a default
    pub struct MockImageGenerator {
        script: Arc<Mutex<VecDeque<MockBehavior>>>,
        fallback: MockBehavior,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockImageGenerator {
        pub fn new(fallback: MockBehavior) -> Self {
            Self {
                script: Arc::new(Mutex::new(VecDeque::new())),
                fallback,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Succeed)
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        /// Queue behaviors consumed in order before the fallback applies
        pub fn with_script(self, behaviors: impl IntoIterator<Item = MockBehavior>) -> Self {
            self.script.lock().unwrap().extend(behaviors);
            self
        }

        pub fn push(&self, behavior: MockBehavior) {
            self.script.lock().unwrap().push_back(behavior);
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Prompts received, in call order
        pub fn prompts(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageGenerator for MockImageGenerator {
        async fn generate(
            &self,
            prompt: &str,
            width: u32,
            height: u32,
        ) -> Result<Vec<u8>, CapabilityError> {
            self.calls.lock().unwrap().push(prompt.to_string());
            let behavior = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            match behavior {
                MockBehavior::Succeed => Ok(format!("png:{}x{}", width, height).into_bytes()),
                MockBehavior::Fail(msg) => Err(CapabilityError::Transient(msg)),
                MockBehavior::Reject(msg) => Err(CapabilityError::Rejected(msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for fault isolation testing
                }
                MockBehavior::Delay(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(format!("png:{}x{}", width, height).into_bytes())
                }
            }
        }
    }
}
