//! Image generation capability
//!
//! The orchestrator only ever talks to an [`ImageGenerationService`]. Concrete
//! providers translate their wire format into [`ResponsePart`]s once, at the
//! deserialization boundary.

pub mod gemini;
pub mod mime;
pub mod mock;

pub use gemini::GeminiImageClient;
pub use mock::{MockImageGenerationClient, MockOutcome};

use crate::artifact::Artifact;
use crate::Result;
use async_trait::async_trait;

/// One element of the payload sent to the capability.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

impl RequestPart {
    pub fn png(data: Vec<u8>) -> Self {
        Self::Image {
            mime_type: "image/png".to_string(),
            data,
        }
    }
}

/// One element of a capability response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
    Empty,
}

/// First part carrying a non-empty image payload, if any.
pub fn first_image(parts: &[ResponsePart]) -> Option<Artifact> {
    parts.iter().find_map(|part| match part {
        ResponsePart::Image { mime_type, data } if !data.is_empty() => {
            Some(Artifact::new(mime_type.clone(), data.clone()))
        }
        _ => None,
    })
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    async fn generate_content(&self, parts: &[RequestPart]) -> Result<Vec<ResponsePart>>;
}
