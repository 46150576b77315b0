use anyhow::{Context, Result};
use base64::Engine as _;
use canvas_generator::models::{
    Config, GenerationKind, GenerationResponse, ImageToImageRequest, TextToImageRequest,
};
use canvas_generator::GenerationOrchestrator;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "canvas-generator")]
#[command(about = "Generate thumbnails, advertisements and posters")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate images from a text prompt.
    Text {
        #[arg(long, value_parser = parse_kind)]
        kind: GenerationKind,
        #[arg(long, default_value_t = 1)]
        count: u32,
        prompt: String,
    },
    /// Transform an image file, optionally guided by reference images.
    Image {
        #[arg(long, value_parser = parse_kind)]
        kind: GenerationKind,
        #[arg(long, value_name = "FILE")]
        source: PathBuf,
        #[arg(long = "reference", value_name = "FILE")]
        references: Vec<PathBuf>,
        #[arg(long, default_value_t = 0.75)]
        strength: f32,
        prompt: String,
    },
    /// Print the supported generation kinds.
    Kinds,
}

fn parse_kind(input: &str) -> std::result::Result<GenerationKind, String> {
    input.parse().map_err(|e: canvas_generator::Error| e.to_string())
}

fn read_as_base64(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn write_response(output_root: &Path, response: &GenerationResponse) -> Result<PathBuf> {
    let date = Local::now().format("%Y-%m-%d").to_string();
    let output_dir = output_root.join(format!("{}_{}", date, Uuid::new_v4()));
    fs::create_dir_all(&output_dir)?;

    for (index, image) in response.images.iter().enumerate() {
        let artifact = canvas_generator::Artifact::from_data_url(image)?;
        let path = output_dir.join(format!("image_{}.{}", index + 1, artifact.extension()));
        fs::write(&path, &artifact.data)?;
        info!("Saved {}", path.display());
    }

    fs::write(
        output_dir.join("response.json"),
        serde_json::to_string_pretty(response)?,
    )?;
    Ok(output_dir)
}

enum Job {
    Text(TextToImageRequest),
    Image(ImageToImageRequest),
}

async fn run(command: Command) -> Result<()> {
    let job = match command {
        Command::Kinds => {
            println!(
                "{}",
                serde_json::to_string_pretty(&GenerationKind::catalogue())?
            );
            return Ok(());
        }
        Command::Text {
            kind,
            count,
            prompt,
        } => Job::Text(TextToImageRequest::new(prompt, kind, count)),
        Command::Image {
            kind,
            source,
            references,
            strength,
            prompt,
        } => {
            let references = references
                .iter()
                .map(|path| read_as_base64(path))
                .collect::<Result<Vec<_>>>()?;
            Job::Image(
                ImageToImageRequest::new(prompt, kind, read_as_base64(&source)?)
                    .with_reference_images(references)
                    .with_strength(strength),
            )
        }
    };

    let config = Config::from_env()?;
    let orchestrator = GenerationOrchestrator::from_config(&config);

    let response = match job {
        Job::Text(request) => {
            let result = orchestrator.generate_from_text(&request).await?;
            let message = format!("Generated {} image(s)", result.artifacts.len());
            GenerationResponse::from_result(result, request.kind, message)
        }
        Job::Image(request) => {
            let result = orchestrator.generate_from_image(&request).await?;
            GenerationResponse::from_result(result, request.kind, "Image transformed".to_string())
        }
    };

    let output_dir = write_response(&config.output_dir, &response)?;
    info!("Results written to {}", output_dir.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canvas_generator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    match run(args.command).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Generation failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
