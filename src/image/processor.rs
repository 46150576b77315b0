use super::placeholder;
use crate::artifact::Artifact;
use crate::models::Dimensions;
use crate::{Error, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Decode/resize/encode helpers. All pixel work runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    fn prepare_sync(encoded: &str, dimensions: Dimensions) -> Result<Vec<u8>> {
        let artifact = Artifact::from_encoded(encoded)?;
        let image = image::load_from_memory(&artifact.data)?;
        let resized = image.resize_exact(dimensions.width, dimensions.height, FilterType::Lanczos3);
        encode_png(&resized)
    }

    /// Decodes a base64 payload or data URL, resizes it exactly to
    /// `dimensions` and re-encodes it as PNG.
    pub async fn prepare(&self, encoded: &str, dimensions: Dimensions) -> Result<Vec<u8>> {
        let encoded = encoded.to_string();
        tokio::task::spawn_blocking(move || Self::prepare_sync(&encoded, dimensions))
            .await
            .map_err(|e| Error::Invariant(format!("Image processing task join error: {}", e)))?
    }

    /// Renders the diagnostic placeholder for a failed generation.
    pub async fn placeholder(&self, dimensions: Dimensions, message: &str) -> Result<Vec<u8>> {
        let message = message.to_string();
        tokio::task::spawn_blocking(move || {
            encode_png(&DynamicImage::ImageRgb8(placeholder::render(
                dimensions, &message,
            )))
        })
        .await
        .map_err(|e| Error::Invariant(format!("Placeholder task join error: {}", e)))?
    }
}

pub(crate) fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
