//! Generation orchestration: batching, pacing and rate-limit backoff around
//! an injected [`ImageGenerationService`].

use crate::ai::{first_image, GeminiImageClient, ImageGenerationService, RequestPart};
use crate::artifact::Artifact;
use crate::image::ImageProcessor;
use crate::models::{Config, Dimensions, GenerationResult, ImageToImageRequest, TextToImageRequest};
use crate::{prompts, Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

/// Reference images beyond this many are ignored.
pub const MAX_REFERENCE_IMAGES: usize = 3;

/// Upper bound on the artifact buffer reserved up front; `count` is
/// caller-controlled.
const MAX_PREALLOCATED_ARTIFACTS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Pause before every text-to-image item after the first.
    pub item_spacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(15),
            item_spacing: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Wait after the failed attempt with 0-based index `attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Waits between consecutive attempts: one fewer than `max_attempts`.
    pub fn backoff_schedule(&self) -> impl Iterator<Item = Duration> {
        let policy = *self;
        (0..policy.max_attempts.saturating_sub(1)).map(move |attempt| policy.backoff_delay(attempt))
    }

    fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: config.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            base_delay: config
                .base_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.base_delay),
            item_spacing: config
                .item_spacing_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.item_spacing),
        }
    }
}

pub struct GenerationOrchestrator {
    generator: Box<dyn ImageGenerationService>,
    processor: ImageProcessor,
    policy: RetryPolicy,
}

impl GenerationOrchestrator {
    pub fn new(generator: Box<dyn ImageGenerationService>) -> Self {
        Self {
            generator,
            processor: ImageProcessor::new(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds a Gemini-backed orchestrator from environment configuration.
    pub fn from_config(config: &Config) -> Self {
        let mut client =
            GeminiImageClient::new(config.gemini_api_key.clone(), config.image_model.clone());
        if let Some(base_url) = &config.gemini_base_url {
            client = client.with_base_url(base_url.clone());
        }
        info!("Image provider: Gemini (model: {})", client.model());

        Self::new(Box::new(client)).with_policy(RetryPolicy::from_config(config))
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Generates `request.count` images from text. Slots whose generation
    /// fails for reasons other than rate limiting hold a placeholder.
    pub async fn generate_from_text(
        &self,
        request: &TextToImageRequest,
    ) -> Result<GenerationResult> {
        request.validate()?;

        let dimensions = request.kind.dimensions();
        let prompt = prompts::enhance(&request.prompt, request.kind);

        let artifacts = self
            .with_rate_limit_retry("text-to-image", |attempt| {
                self.text_attempt(attempt, request.count, &prompt, dimensions)
            })
            .await?;

        Ok(GenerationResult {
            artifacts,
            prompt_used: prompt,
        })
    }

    /// Transforms the source image, optionally guided by up to three
    /// reference images. Returns exactly one artifact.
    pub async fn generate_from_image(
        &self,
        request: &ImageToImageRequest,
    ) -> Result<GenerationResult> {
        request.validate()?;

        let dimensions = request.kind.dimensions();
        let source = self
            .processor
            .prepare(&request.source_image, dimensions)
            .await
            .map_err(|e| Error::Validation(format!("Could not decode base image: {}", e)))?;

        let references = self
            .prepare_references(&request.reference_images, dimensions)
            .await;
        let has_references = !request.reference_images.is_empty();
        let prompt = prompts::image_prompt(&request.prompt, request.kind, has_references);

        let mut parts = vec![
            RequestPart::Text(prompt.clone()),
            RequestPart::png(source.clone()),
        ];
        parts.extend(references.into_iter().map(RequestPart::png));

        debug!(
            strength = request.strength,
            images = parts.len() - 1,
            "Prepared image-to-image payload"
        );

        let artifact = self
            .with_rate_limit_retry("image-to-image", |attempt| {
                self.image_attempt(attempt, &parts, &source)
            })
            .await?;

        Ok(GenerationResult {
            artifacts: vec![artifact],
            prompt_used: prompt,
        })
    }

    /// Runs `operation` until it succeeds, fails with a non-rate-limit error,
    /// or the attempt budget is spent. Attempts are numbered from 1.
    async fn with_rate_limit_retry<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = AtomicU32::new(0);
        let max_attempts = self.policy.max_attempts;

        let outcome = RetryIf::spawn(
            self.policy.backoff_schedule(),
            || operation(attempts.fetch_add(1, Ordering::SeqCst) + 1),
            |e: &Error| {
                if !e.is_rate_limited() {
                    return false;
                }
                let attempt = attempts.load(Ordering::SeqCst);
                if attempt < max_attempts {
                    warn!(
                        "[{}] Rate limit hit on attempt {}/{}: {}. Backing off {}s",
                        label,
                        attempt,
                        max_attempts,
                        e,
                        self.policy.backoff_delay(attempt - 1).as_secs()
                    );
                }
                true
            },
        )
        .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(e) if e.is_rate_limited() => {
                let attempts = attempts.load(Ordering::SeqCst);
                warn!("[{}] Rate limit persisted after {} attempts", label, attempts);
                Err(Error::RateLimitExceeded { attempts })
            }
            Err(e @ Error::Validation(_)) => Err(e),
            Err(e) => {
                warn!("[{}] Generation failed: {}", label, e);
                Err(Error::GenerationFailed(e.to_string()))
            }
        }
    }

    async fn text_attempt(
        &self,
        attempt: u32,
        count: u32,
        prompt: &str,
        dimensions: Dimensions,
    ) -> Result<Vec<Artifact>> {
        info!(
            "Attempt {}/{} - generating {} image(s)",
            attempt, self.policy.max_attempts, count
        );

        let parts = [RequestPart::Text(prompt.to_string())];
        let mut artifacts = Vec::with_capacity(count.min(MAX_PREALLOCATED_ARTIFACTS) as usize);

        for index in 0..count {
            if index > 0 {
                debug!("Waiting {:?} before next image", self.policy.item_spacing);
                tokio::time::sleep(self.policy.item_spacing).await;
            }

            match self.generate_one(&parts).await {
                Ok(artifact) => {
                    info!(
                        "Image {}/{} generated ({} bytes)",
                        index + 1,
                        count,
                        artifact.data.len()
                    );
                    artifacts.push(artifact);
                }
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => {
                    warn!(
                        "Image {}/{} failed, substituting placeholder: {}",
                        index + 1,
                        count,
                        e
                    );
                    let placeholder = self.processor.placeholder(dimensions, &e.to_string()).await?;
                    artifacts.push(Artifact::png(placeholder));
                }
            }
        }

        Ok(artifacts)
    }

    async fn generate_one(&self, parts: &[RequestPart]) -> Result<Artifact> {
        let response = self.generator.generate_content(parts).await?;
        first_image(&response)
            .ok_or_else(|| Error::AiProvider("No image in response".to_string()))
    }

    async fn image_attempt(
        &self,
        attempt: u32,
        parts: &[RequestPart],
        source: &[u8],
    ) -> Result<Artifact> {
        info!(
            "Attempt {}/{} - transforming with 1 prompt + {} image(s)",
            attempt,
            self.policy.max_attempts,
            parts.len() - 1
        );

        let response = self.generator.generate_content(parts).await?;
        match first_image(&response) {
            Some(artifact) => {
                info!("Image transformed ({} bytes)", artifact.data.len());
                Ok(artifact)
            }
            None => {
                warn!("No transformed image in response, returning resized source");
                Ok(Artifact::png(source.to_vec()))
            }
        }
    }

    /// Decodes and resizes at most [`MAX_REFERENCE_IMAGES`] references,
    /// skipping any that fail.
    async fn prepare_references(&self, encoded: &[String], dimensions: Dimensions) -> Vec<Vec<u8>> {
        if encoded.len() > MAX_REFERENCE_IMAGES {
            debug!(
                "Ignoring {} reference image(s) beyond the first {}",
                encoded.len() - MAX_REFERENCE_IMAGES,
                MAX_REFERENCE_IMAGES
            );
        }

        let mut prepared = Vec::new();
        for (index, reference) in encoded.iter().take(MAX_REFERENCE_IMAGES).enumerate() {
            match self.processor.prepare(reference, dimensions).await {
                Ok(png) => prepared.push(png),
                Err(e) => warn!("Skipping reference image {}: {}", index + 1, e),
            }
        }
        prepared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::DEFAULT_PNG;
    use crate::ai::{MockImageGenerationClient, MockOutcome, ResponsePart};
    use crate::models::GenerationKind;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tokio::time::Instant;

    const RATE_LIMITED: &str =
        "Gemini API error (status 429 Too Many Requests): RESOURCE_EXHAUSTED";

    fn orchestrator(mock: &MockImageGenerationClient) -> GenerationOrchestrator {
        GenerationOrchestrator::new(Box::new(mock.clone()))
    }

    fn test_image_data_url(color: [u8; 3]) -> String {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb(color));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        Artifact::png(bytes).to_data_url()
    }

    fn decoded_dimensions(artifact: &Artifact) -> (u32, u32) {
        let img = image::load_from_memory(&artifact.data).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_backoff_schedule() {
        let schedule: Vec<u64> = RetryPolicy::default()
            .backoff_schedule()
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(schedule, vec![15, 30, 60, 120]);
        assert_eq!(RetryPolicy::default().backoff_delay(4), Duration::from_secs(240));
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_batch_returns_count_artifacts_with_pacing() {
        let mock = MockImageGenerationClient::new();
        let request = TextToImageRequest::new("A red car", GenerationKind::Thumbnail, 3);

        let start = Instant::now();
        let result = orchestrator(&mock).generate_from_text(&request).await.unwrap();

        assert_eq!(result.artifacts.len(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(16));
        assert_eq!(result.prompt_used, prompts::enhance("A red car", GenerationKind::Thumbnail));
        for artifact in &result.artifacts {
            assert!(artifact.to_data_url().starts_with("data:image/png;base64,"));
        }
        assert_eq!(mock.get_call_count(), 3);
        assert_eq!(
            mock.get_calls()[0],
            vec![RequestPart::Text(result.prompt_used.clone())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_rate_limit_exhausts_five_attempts() {
        let mock = MockImageGenerationClient::new().with_errors(RATE_LIMITED, 5);
        let request = TextToImageRequest::new("A red car", GenerationKind::Poster, 1);

        let start = Instant::now();
        let err = orchestrator(&mock)
            .generate_from_text(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RateLimitExceeded { attempts: 5 }));
        assert_eq!(mock.get_call_count(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(15 + 30 + 60 + 120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_third_attempt_waits_twice() {
        let mock = MockImageGenerationClient::new()
            .with_error("quota exceeded")
            .with_error("Rate limit reached")
            .with_image_response(vec![4, 5, 6]);
        let request = TextToImageRequest::new("A red car", GenerationKind::Poster, 1);

        let start = Instant::now();
        let result = orchestrator(&mock).generate_from_text(&request).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(15 + 30));
        assert_eq!(mock.get_call_count(), 3);
        assert_eq!(result.artifacts, vec![Artifact::png(vec![4, 5, 6])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_mid_batch_restarts_from_first_item() {
        let mock = MockImageGenerationClient::new()
            .with_image_response(vec![1])
            .with_error(RATE_LIMITED);
        let request = TextToImageRequest::new("A red car", GenerationKind::Thumbnail, 3);

        let start = Instant::now();
        let result = orchestrator(&mock).generate_from_text(&request).await.unwrap();

        // attempt 1: item, 8s, rate limited; 15s backoff; attempt 2: three items
        assert_eq!(start.elapsed(), Duration::from_secs(8 + 15 + 16));
        assert_eq!(mock.get_call_count(), 5);
        assert!(result
            .artifacts
            .iter()
            .all(|artifact| artifact.data == DEFAULT_PNG.to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_failure_becomes_placeholder() {
        let mock = MockImageGenerationClient::new()
            .with_image_response(vec![1])
            .with_error("model overloaded")
            .with_outcome(MockOutcome::Parts(vec![
                ResponsePart::Text("I cannot draw that".to_string()),
                ResponsePart::Empty,
            ]));
        let request = TextToImageRequest::new("A red car", GenerationKind::Advertisement, 3);

        let result = orchestrator(&mock).generate_from_text(&request).await.unwrap();

        assert_eq!(result.artifacts.len(), 3);
        assert_eq!(result.artifacts[0], Artifact::png(vec![1]));
        assert_eq!(decoded_dimensions(&result.artifacts[1]), (1200, 628));
        assert_eq!(decoded_dimensions(&result.artifacts[2]), (1200, 628));
        assert_eq!(mock.get_call_count(), 3);
    }

    #[tokio::test]
    async fn test_text_validation_happens_before_generation() {
        let mock = MockImageGenerationClient::new();
        let request = TextToImageRequest::new("  ", GenerationKind::Thumbnail, 1);

        let err = orchestrator(&mock)
            .generate_from_text(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_image_returns_transformed_artifact() {
        let mock = MockImageGenerationClient::new().with_outcome(MockOutcome::Parts(vec![
            ResponsePart::Text("done".to_string()),
            ResponsePart::Image {
                mime_type: "image/jpeg".to_string(),
                data: vec![0xFF, 0xD8, 0xFF],
            },
        ]));
        let request = ImageToImageRequest::new(
            "make it blue",
            GenerationKind::Thumbnail,
            test_image_data_url([255, 0, 0]),
        );

        let result = orchestrator(&mock).generate_from_image(&request).await.unwrap();

        assert_eq!(result.artifacts, vec![Artifact::new("image/jpeg", vec![0xFF, 0xD8, 0xFF])]);
        assert!(result
            .prompt_used
            .ends_with("Based on the provided image, make it blue"));

        let calls = mock.get_calls();
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[0][0], RequestPart::Text(result.prompt_used.clone()));
    }

    #[tokio::test]
    async fn test_image_without_usable_part_returns_resized_source() {
        let mock = MockImageGenerationClient::new().with_outcome(MockOutcome::Parts(vec![
            ResponsePart::Text("no can do".to_string()),
        ]));
        let source = test_image_data_url([0, 128, 0]);
        let request =
            ImageToImageRequest::new("make it blue", GenerationKind::Advertisement, source.clone());

        let result = orchestrator(&mock).generate_from_image(&request).await.unwrap();

        let expected = ImageProcessor::new()
            .prepare(&source, GenerationKind::Advertisement.dimensions())
            .await
            .unwrap();
        assert_eq!(result.artifacts, vec![Artifact::png(expected)]);
    }

    #[tokio::test]
    async fn test_only_first_three_references_are_forwarded() {
        let mock = MockImageGenerationClient::new();
        let references = (0..5u8).map(|i| test_image_data_url([i, i, i])).collect();
        let request = ImageToImageRequest::new(
            "combine",
            GenerationKind::Thumbnail,
            test_image_data_url([255, 255, 255]),
        )
        .with_reference_images(references);

        let result = orchestrator(&mock).generate_from_image(&request).await.unwrap();

        let calls = mock.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 1 + 1 + MAX_REFERENCE_IMAGES);
        assert!(result.prompt_used.ends_with("Using the provided images, combine"));
    }

    #[tokio::test]
    async fn test_undecodable_reference_is_skipped() {
        let mock = MockImageGenerationClient::new();
        let request = ImageToImageRequest::new(
            "combine",
            GenerationKind::Thumbnail,
            test_image_data_url([255, 255, 255]),
        )
        .with_reference_images(vec![
            test_image_data_url([1, 2, 3]),
            "not-an-image".to_string(),
            test_image_data_url([3, 2, 1]),
        ]);

        orchestrator(&mock).generate_from_image(&request).await.unwrap();

        assert_eq!(mock.get_calls()[0].len(), 4);
    }

    #[tokio::test]
    async fn test_undecodable_source_is_a_validation_error() {
        let mock = MockImageGenerationClient::new();
        let request = ImageToImageRequest::new("edit", GenerationKind::Poster, "bm90IGFuIGltYWdl");

        let err = orchestrator(&mock)
            .generate_from_image(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_image_upstream_error_fails_without_retry() {
        let mock =
            MockImageGenerationClient::new().with_error("Gemini API error (status 500): internal");
        let request = ImageToImageRequest::new(
            "edit",
            GenerationKind::Poster,
            test_image_data_url([9, 9, 9]),
        );

        let err = orchestrator(&mock)
            .generate_from_image(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GenerationFailed(_)));
        assert_eq!(mock.get_call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_rate_limit_retries_then_succeeds() {
        let mock = MockImageGenerationClient::new()
            .with_error(RATE_LIMITED)
            .with_image_response(vec![8]);
        let request = ImageToImageRequest::new(
            "edit",
            GenerationKind::Poster,
            test_image_data_url([9, 9, 9]),
        );

        let start = Instant::now();
        let result = orchestrator(&mock).generate_from_image(&request).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(15));
        assert_eq!(result.artifacts, vec![Artifact::png(vec![8])]);
        assert_eq!(mock.get_call_count(), 2);
    }

    #[tokio::test]
    async fn test_huge_count_does_not_reserve_upfront() {
        let mock = MockImageGenerationClient::new().with_error(RATE_LIMITED);
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let request = TextToImageRequest::new("x", GenerationKind::Poster, u32::MAX);

        let err = orchestrator(&mock)
            .with_policy(policy)
            .generate_from_text(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RateLimitExceeded { attempts: 1 }));
        assert_eq!(mock.get_call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scaled_policy_is_honoured() {
        let mock = MockImageGenerationClient::new().with_errors(RATE_LIMITED, 2);
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            item_spacing: Duration::from_millis(1),
        };
        let request = TextToImageRequest::new("A red car", GenerationKind::Poster, 1);

        let start = Instant::now();
        let err = orchestrator(&mock)
            .with_policy(policy)
            .generate_from_text(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RateLimitExceeded { attempts: 2 }));
        assert_eq!(start.elapsed(), Duration::from_millis(10));
    }
}
