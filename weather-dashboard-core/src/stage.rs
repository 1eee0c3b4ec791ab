//! The three pipeline stages, in the order they run.

pub mod fetch;
pub mod initialize;
pub mod persist;

pub use fetch::WeatherFetcher;
pub use initialize::{BucketStatus, StorageInitializer};
pub use persist::WeatherPersister;
