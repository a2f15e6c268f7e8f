// Image Storage Port
// Uploads generated bytes and returns a permanent reference URL

use crate::port::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where and how the storage backend should keep an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    /// Target collection/folder
    pub folder: String,
    /// Backend-specific transform spec (e.g. "q_auto,f_auto")
    pub transformation: Option<String>,
}

impl Default for UploadTarget {
    fn default() -> Self {
        Self {
            folder: "frameforge/images".to_string(),
            transformation: None,
        }
    }
}

#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Upload image bytes, returning the permanent URL
    async fn upload(&self, bytes: &[u8], target: &UploadTarget)
        -> Result<String, CapabilityError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Mock storage: returns `https://cdn.test/<folder>/<n>.png` unless a
    /// scripted failure is queued
    pub struct MockImageStorage {
        failures: Arc<Mutex<VecDeque<CapabilityError>>>,
        always_fail: Option<CapabilityError>,
        uploads: AtomicUsize,
        calls: AtomicUsize,
    }

    impl MockImageStorage {
        pub fn new_success() -> Self {
            Self {
                failures: Arc::new(Mutex::new(VecDeque::new())),
                always_fail: None,
                uploads: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self {
                always_fail: Some(CapabilityError::Transient(message.into())),
                ..Self::new_success()
            }
        }

        /// Fail the next `count` uploads with a transient error
        pub fn fail_next(self, count: usize, message: &str) -> Self {
            self.failures.lock().unwrap().extend(
                std::iter::repeat(CapabilityError::Transient(message.to_string())).take(count),
            );
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn upload_count(&self) -> usize {
            self.uploads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageStorage for MockImageStorage {
        async fn upload(
            &self,
            bytes: &[u8],
            target: &UploadTarget,
        ) -> Result<String, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if bytes.is_empty() {
                return Err(CapabilityError::Rejected("empty upload".to_string()));
            }
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            if let Some(err) = &self.always_fail {
                return Err(err.clone());
            }

            let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("https://cdn.test/{}/{}.png", target.folder, n))
        }
    }
}
