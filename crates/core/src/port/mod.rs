// Port Layer - Interfaces for external dependencies

pub mod capability;
pub mod id_provider; // For deterministic testing
pub mod image_generator;
pub mod image_storage;
pub mod item_repository;
pub mod job_repository;
pub mod message_broker;
pub mod time_provider;

// Re-exports
pub use capability::CapabilityError;
pub use id_provider::IdProvider;
pub use image_generator::ImageGenerator;
pub use image_storage::{ImageStorage, UploadTarget};
pub use item_repository::ItemRepository;
pub use job_repository::JobRepository;
pub use message_broker::{Delivery, DeliveryTag, MessageBroker};
pub use time_provider::TimeProvider;
