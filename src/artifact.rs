//! Artifact encoding
//!
//! Every image leaving the generator travels as a `data:<mime>;base64,<payload>`
//! string. Parsing splits on the first `;base64,`.

use crate::ai::mime::{detect_image_mime, extension_for_mime};
use crate::{Error, Result};
use base64::Engine as _;

const BASE64_MARKER: &str = ";base64,";

/// A generated or placeholder image together with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{}{}{}",
            self.mime_type,
            BASE64_MARKER,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }

    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| Error::Validation("Artifact is not a data URL".to_string()))?;
        let (mime_type, payload) = rest.split_once(BASE64_MARKER).ok_or_else(|| {
            Error::Validation("Artifact data URL is missing ';base64,'".to_string())
        })?;

        Ok(Self::new(mime_type, decode_base64(payload)?))
    }

    /// Accepts either a data URL or a bare base64 payload; the MIME type of a
    /// bare payload is sniffed from its magic bytes.
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        if encoded.starts_with("data:") {
            return Self::from_data_url(encoded);
        }
        let data = decode_base64(encoded)?;
        Ok(Self::new(detect_image_mime(&data), data))
    }

    /// File extension matching the MIME type, used when writing to disk.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::Validation(format!("Invalid base64 payload: {}", e)))
}
