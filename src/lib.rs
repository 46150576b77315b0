//! Generator core for Cre8Canvas-style image requests
//!
//! Turns text prompts (and optionally a source image plus references) into
//! thumbnails, advertisements and posters through a generative image API,
//! absorbing per-image failures and backing off on upstream rate limits.

pub mod ai;
pub mod artifact;
pub mod error;
pub mod image;
pub mod models;
pub mod orchestrator;
pub mod prompts;

pub use artifact::Artifact;
pub use error::{Error, Result};
pub use orchestrator::{GenerationOrchestrator, RetryPolicy};
