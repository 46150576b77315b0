//! Image processing
//!
//! Decodes caller-supplied images, resizes them to the target canvas and
//! renders placeholder artifacts for failed generations.

pub mod placeholder;
pub mod processor;

pub use processor::ImageProcessor;
