//! Local adapters for single-server deployment and tests.

pub mod fs;
pub mod memory;
pub mod queue;

pub use fs::FsStorage;
pub use memory::MemoryStore;
pub use queue::ChannelQueue;
