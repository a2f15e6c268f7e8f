// Domain Layer - Pure business logic and entities

pub mod error;
pub mod image;
pub mod job;
pub mod outcome;
pub mod request;

// Re-exports
pub use error::DomainError;
pub use image::{ImageItem, ImageStyle, ItemId, ItemStatus, Resolution};
pub use job::{Job, JobKey, JobStatus};
pub use outcome::{OutcomeData, OutcomeKind, WorkerOutcome};
pub use request::{ItemRequest, ItemSpec, RequestMetadata};
