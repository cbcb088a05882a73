//! Adapters - Concrete implementations of ports.

pub mod b2;
pub mod ffmpeg;
pub mod local;
pub mod redis;
