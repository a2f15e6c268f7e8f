// Image Item Repository Port (Interface)

use crate::domain::{ImageItem, ItemId};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Insert a terminal item record
    async fn insert(&self, item: &ImageItem) -> Result<()>;

    /// Find item by ID
    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ImageItem>>;

    /// All items of a job, oldest first
    async fn find_by_job(&self, job_key: &str) -> Result<Vec<ImageItem>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryItemRepository {
        items: Mutex<Vec<ImageItem>>,
        fail_writes: AtomicBool,
    }

    impl InMemoryItemRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent insert fail (persistence error testing)
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn all(&self) -> Vec<ImageItem> {
            self.items.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ItemRepository for InMemoryItemRepository {
        async fn insert(&self, item: &ImageItem) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Persistence("disk full".to_string()));
            }
            let mut items = self.items.lock().unwrap();
            if items.iter().any(|existing| existing.id == item.id) {
                return Err(AppError::Persistence(format!(
                    "Unique constraint violation: item {}",
                    item.id
                )));
            }
            items.push(item.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &ItemId) -> Result<Option<ImageItem>> {
            let items = self.items.lock().unwrap();
            Ok(items.iter().find(|item| &item.id == id).cloned())
        }

        async fn find_by_job(&self, job_key: &str) -> Result<Vec<ImageItem>> {
            let items = self.items.lock().unwrap();
            Ok(items
                .iter()
                .filter(|item| item.job_key == job_key)
                .cloned()
                .collect())
        }
    }
}
