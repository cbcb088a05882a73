//! Tourly - tour platform backend
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (shorts, hls, media, upload policy, jobs, leads, airports)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (b2, local, redis, ffmpeg)
//! - application/: Services that use ports (ingest, worker, playback)
//! - http/: axum inbound adapter
//! - config: Environment configuration
//!
//! # Features
//! - `libav`: probe media in-process with `ffmpeg-next` instead of the `ffprobe` binary

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod ports;
pub mod telemetry;

// Re-exports for convenience
pub use config::AppConfig;
pub use domain::hls;
pub use error::AppError;
