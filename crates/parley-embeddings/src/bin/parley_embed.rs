use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use parley_embeddings::{build_client, EmbeddingConfig, EmbeddingRequest, ProviderKind};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Turn text into an embedding vector using a hosted model.
#[derive(Parser, Debug)]
#[command(
    name = "parley-embed",
    about = "Embed text with a hosted embedding model",
    group(
        ArgGroup::new("input")
            .args(["text", "text_file", "health"])
            .required(true)
    )
)]
struct Args {
    /// Text to embed
    text: Vec<String>,

    /// Read the text from a file
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Only check that the provider is reachable
    #[arg(long)]
    health: bool,

    /// JSON configuration file; the environment is used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Provider to use (gemini, openai)
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Override the API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Environment variable holding the API key
    #[arg(long)]
    api_key_env: Option<String>,

    /// Expected (and requested) vector size
    #[arg(short, long)]
    dimensions: Option<usize>,

    /// Gemini task type, e.g. RETRIEVAL_DOCUMENT
    #[arg(long)]
    task_type: Option<String>,

    /// Transport timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the whole vector as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn load_config(&self) -> Result<EmbeddingConfig> {
        let mut config = match &self.config {
            Some(path) => EmbeddingConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => EmbeddingConfig::from_env().context("reading configuration from environment")?,
        };
        apply_overrides(&mut config, self);
        config.validate()?;
        Ok(config)
    }

    fn input(&self) -> Result<String> {
        match &self.text_file {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display())),
            None => Ok(self.text.join(" ")),
        }
    }
}

fn apply_overrides(config: &mut EmbeddingConfig, args: &Args) {
    if let Some(provider) = args.provider {
        if provider != config.provider {
            // Provider defaults no longer apply once the provider changes.
            *config = EmbeddingConfig {
                provider,
                timeout_secs: config.timeout_secs,
                ..Default::default()
            };
        }
    }
    if let Some(model) = &args.model {
        config.model = Some(model.clone());
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(var) = &args.api_key_env {
        config.api_key_env = Some(var.clone());
    }
    if let Some(dimensions) = args.dimensions {
        config.dimensions = Some(dimensions);
    }
    if let Some(task_type) = &args.task_type {
        config.task_type = Some(task_type.clone());
    }
    if let Some(timeout) = args.timeout_secs {
        config.timeout_secs = Some(timeout);
    }
}

fn summarize(values: &[f32]) -> String {
    let head: Vec<String> = values.iter().take(4).map(|v| format!("{:.6}", v)).collect();
    let ellipsis = if values.len() > 4 { ", ..." } else { "" };
    format!("[{}{}]", head.join(", "), ellipsis)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.load_config()?;
    let client = build_client(&config)?;

    if args.health {
        client.health_check().await?;
        tracing::info!(provider = client.name(), model = client.model(), "Provider healthy");
        println!("ok");
        return Ok(());
    }

    let text = args.input()?;
    let vector = client.embed(EmbeddingRequest::new(text)).await?;

    if args.json {
        println!("{}", serde_json::to_string(&vector)?);
    } else {
        println!(
            "{} {} dims={} {}",
            client.name(),
            client.model(),
            vector.dimensions(),
            summarize(vector.as_slice())
        );
    }

    Ok(())
}
