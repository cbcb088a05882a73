//! Ports - Trait definitions the application layer depends on.

pub mod media;
pub mod queue;
pub mod repository;
pub mod storage;
