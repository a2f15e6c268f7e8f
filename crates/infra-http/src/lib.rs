// Frameforge Infrastructure - HTTP Adapters
// Implements: ImageGenerator, ImageStorage

mod client;
pub mod generator;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use client::build_client;
pub use generator::HttpImageGenerator;
pub use storage::HttpImageStorage;
