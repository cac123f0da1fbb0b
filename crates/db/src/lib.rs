//! MongoDB client factory and admin backends.

pub mod memory;
pub mod mongo;

pub use memory::MemoryBackend;
pub use mongo::{connect, MongoBackend};
