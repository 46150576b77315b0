//! Data models and structures
//!
//! Defines generation kinds, inbound requests, results, the response
//! envelope handed back to hosts, and environment configuration.

use crate::artifact::Artifact;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Thumbnail,
    Advertisement,
    Poster,
}

/// Target canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Fallback used when a kind name is not in the table.
    pub const DEFAULT: Dimensions = Dimensions {
        width: 1024,
        height: 1024,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Looks up dimensions by kind name, falling back to 1024x1024.
    pub fn for_kind_name(name: &str) -> Self {
        name.parse::<GenerationKind>()
            .map(|kind| kind.dimensions())
            .unwrap_or(Self::DEFAULT)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

/// Entry of the kind catalogue exposed to hosts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KindInfo {
    pub id: GenerationKind,
    pub name: String,
    pub dimensions: String,
    pub aspect: String,
}

impl GenerationKind {
    pub const ALL: [GenerationKind; 3] = [
        GenerationKind::Thumbnail,
        GenerationKind::Advertisement,
        GenerationKind::Poster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::Advertisement => "advertisement",
            Self::Poster => "poster",
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        match self {
            Self::Thumbnail => Dimensions::new(1280, 720),
            Self::Advertisement => Dimensions::new(1200, 628),
            Self::Poster => Dimensions::new(1080, 1920),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Thumbnail => "YouTube Thumbnail",
            Self::Advertisement => "Advertisement",
            Self::Poster => "Poster",
        }
    }

    fn aspect(&self) -> &'static str {
        match self {
            Self::Thumbnail => "16:9",
            Self::Advertisement => "Social media optimized",
            Self::Poster => "9:16 (vertical)",
        }
    }

    pub fn catalogue() -> Vec<KindInfo> {
        Self::ALL
            .iter()
            .map(|kind| KindInfo {
                id: *kind,
                name: kind.display_name().to_string(),
                dimensions: kind.dimensions().to_string(),
                aspect: kind.aspect().to_string(),
            })
            .collect()
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                Error::Validation(format!("Invalid type '{}'. Use: {:?}", s, valid))
            })
    }
}

fn default_count() -> u32 {
    1
}

fn default_strength() -> f32 {
    0.75
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextToImageRequest {
    pub prompt: String,
    #[serde(rename = "generation_type")]
    pub kind: GenerationKind,
    #[serde(rename = "num_images", default = "default_count")]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

impl TextToImageRequest {
    pub fn new(prompt: impl Into<String>, kind: GenerationKind, count: u32) -> Self {
        Self {
            prompt: prompt.into(),
            kind,
            count,
            negative_prompt: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::Validation("Prompt required".to_string()));
        }
        if self.count == 0 {
            return Err(Error::Validation(
                "At least one image must be requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageToImageRequest {
    pub prompt: String,
    #[serde(rename = "generation_type")]
    pub kind: GenerationKind,
    /// Base64 payload or `data:` URL.
    #[serde(rename = "base_image")]
    pub source_image: String,
    #[serde(default)]
    pub reference_images: Vec<String>,
    #[serde(default = "default_strength")]
    pub strength: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

impl ImageToImageRequest {
    pub fn new(
        prompt: impl Into<String>,
        kind: GenerationKind,
        source_image: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            kind,
            source_image: source_image.into(),
            reference_images: Vec::new(),
            strength: default_strength(),
            negative_prompt: None,
        }
    }

    pub fn with_reference_images(mut self, reference_images: Vec<String>) -> Self {
        self.reference_images = reference_images;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::Validation("Prompt required".to_string()));
        }
        if self.source_image.trim().is_empty() {
            return Err(Error::Validation("Base image required".to_string()));
        }
        Ok(())
    }
}

/// Artifacts in generation order plus the prompt actually sent upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub artifacts: Vec<Artifact>,
    pub prompt_used: String,
}

/// Serializable envelope returned to callers of the host layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub success: bool,
    pub images: Vec<String>,
    pub prompt_used: String,
    pub generation_type: GenerationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GenerationResponse {
    pub fn from_result(result: GenerationResult, kind: GenerationKind, message: String) -> Self {
        Self {
            success: true,
            images: result.artifacts.iter().map(Artifact::to_data_url).collect(),
            prompt_used: result.prompt_used,
            generation_type: kind,
            message: Some(message),
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub image_model: String,
    pub gemini_base_url: Option<String>,
    pub output_dir: PathBuf,
    pub max_attempts: Option<u32>,
    pub base_delay_secs: Option<u64>,
    pub item_spacing_secs: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| Error::Config("GEMINI_API_KEY not set".to_string()))?;

        Ok(Self {
            gemini_api_key,
            image_model: std::env::var("IMAGE_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-image".to_string()),
            gemini_base_url: std::env::var("GEMINI_BASE_URL").ok(),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            max_attempts: parse_optional_env("MAX_ATTEMPTS")?,
            base_delay_secs: parse_optional_env("BASE_DELAY_SECS")?,
            item_spacing_secs: parse_optional_env("ITEM_SPACING_SECS")?,
        })
    }
}

fn parse_optional_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has an invalid value: '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}
