pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::QueueError;
pub use keys::QueueKeys;
pub use memory::MemoryQueueStore;
pub use redis_store::RedisQueueStore;
pub use store::QueueStore;
