// Frameforge Infrastructure - SQLite Adapter
// Implements: JobRepository, ItemRepository, MessageBroker

mod connection;
mod error;
mod item_repository;
mod job_repository;
mod message_broker;
mod migration;

pub use connection::create_pool;
pub use item_repository::SqliteItemRepository;
pub use job_repository::SqliteJobRepository;
pub use message_broker::SqliteMessageBroker;
pub use migration::run_migrations;

pub(crate) use error::map_sqlx_error;
