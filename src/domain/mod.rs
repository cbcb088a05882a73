//! Domain layer - Pure business logic.

pub mod airports;
pub mod hls;
pub mod jobs;
pub mod leads;
pub mod media;
pub mod shorts;
pub mod text;
pub mod upload;
