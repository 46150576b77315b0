use super::{ImageGenerationService, RequestPart, ResponsePart};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted reply for one call to [`MockImageGenerationClient`].
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// A single PNG image part with the given bytes.
    Image(Vec<u8>),
    /// An explicit list of response parts.
    Parts(Vec<ResponsePart>),
    /// An upstream error carrying this message.
    Error(String),
}

/// Tiny valid 1x1 PNG returned when no outcome is scripted.
pub const DEFAULT_PNG: [u8; 69] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 pixel
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44,
    0x41, // IDAT chunk
    0x54, 0x08, 0x99, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0xE2, 0x25,
    0x00, 0xBC, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, // IEND chunk
    0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// In-memory capability: replays scripted outcomes in order, then falls back
/// to [`DEFAULT_PNG`]. Clones share state so tests can keep a probe.
#[derive(Clone, Default)]
pub struct MockImageGenerationClient {
    outcomes: Arc<Mutex<VecDeque<MockOutcome>>>,
    calls: Arc<Mutex<Vec<Vec<RequestPart>>>>,
}

impl MockImageGenerationClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    pub fn with_image_response(self, data: Vec<u8>) -> Self {
        self.with_outcome(MockOutcome::Image(data))
    }

    pub fn with_error(self, message: &str) -> Self {
        self.with_outcome(MockOutcome::Error(message.to_string()))
    }

    pub fn with_errors(self, message: &str, times: usize) -> Self {
        (0..times).fold(self, |mock, _| mock.with_error(message))
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Payloads received so far, in call order.
    pub fn get_calls(&self) -> Vec<Vec<RequestPart>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerationService for MockImageGenerationClient {
    async fn generate_content(&self, parts: &[RequestPart]) -> Result<Vec<ResponsePart>> {
        self.calls.lock().unwrap().push(parts.to_vec());

        let outcome = self.outcomes.lock().unwrap().pop_front();
        match outcome {
            Some(MockOutcome::Image(data)) => Ok(vec![ResponsePart::Image {
                mime_type: "image/png".to_string(),
                data,
            }]),
            Some(MockOutcome::Parts(parts)) => Ok(parts),
            Some(MockOutcome::Error(message)) => Err(Error::AiProvider(message)),
            None => Ok(vec![ResponsePart::Image {
                mime_type: "image/png".to_string(),
                data: DEFAULT_PNG.to_vec(),
            }]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> Vec<RequestPart> {
        vec![RequestPart::Text("test".to_string())]
    }

    #[tokio::test]
    async fn test_replays_outcomes_then_defaults() {
        let client = MockImageGenerationClient::new()
            .with_error("429 Too Many Requests")
            .with_image_response(vec![7]);

        assert!(client.generate_content(&prompt()).await.is_err());

        let second = client.generate_content(&prompt()).await.unwrap();
        assert_eq!(
            second,
            vec![ResponsePart::Image {
                mime_type: "image/png".to_string(),
                data: vec![7],
            }]
        );

        let third = client.generate_content(&prompt()).await.unwrap();
        assert!(matches!(
            &third[0],
            ResponsePart::Image { data, .. } if *data == DEFAULT_PNG.to_vec()
        ));
    }

    #[tokio::test]
    async fn test_records_calls_across_clones() {
        let client = MockImageGenerationClient::new();
        let probe = client.clone();

        client.generate_content(&prompt()).await.unwrap();
        client.generate_content(&prompt()).await.unwrap();

        assert_eq!(probe.get_call_count(), 2);
        assert_eq!(probe.get_calls()[0], prompt());
    }
}
