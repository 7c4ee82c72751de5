//! stance-classifier - LLM stance classification for comment tables
//!
//! Reads a CSV with a `comment` column, asks a local Gemma 3 model for each
//! comment's stance on the topic described by the prompt spec, and writes
//! the table back with an `LLM_stance` column appended.
//!
//! ```bash
//! stance-classifier --input data/comments.csv --output outputs/comments_stance.csv \
//!     --token-file ~/.hf_token
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use stance_classifier::models::Gemma3Size;
use stance_classifier::pipelines::generation::DEFAULT_MAX_TOTAL_TOKENS;
use stance_classifier::pipelines::stance::{StancePipelineBuilder, DEFAULT_SEED};
use stance_classifier::{CommentTable, PromptSpec};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Classify comment stance with a local LLM
#[derive(Parser)]
#[command(name = "stance-classifier")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input CSV with a `comment` column
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV path (input columns + LLM_stance)
    #[arg(short, long)]
    output: PathBuf,

    /// Gemma 3 model size
    #[arg(long, default_value = "12b")]
    model_size: Gemma3Size,

    /// Compute device
    #[arg(long, default_value = "auto", value_parser = ["auto", "cpu", "cuda"])]
    device: String,

    /// CUDA device index, used with --device cuda
    #[arg(long, default_value_t = 0)]
    cuda_device: usize,

    /// File containing a Hugging Face access token (falls back to HF_TOKEN)
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// JSON file overriding the built-in prompt (system_instruction + user_template)
    #[arg(long)]
    prompt_spec: Option<PathBuf>,

    /// Combined prompt + completion token budget per comment
    #[arg(long, default_value_t = DEFAULT_MAX_TOTAL_TOKENS)]
    max_total_tokens: usize,

    /// Sampling temperature (0.0 = greedy)
    #[arg(long, default_value_t = 0.0)]
    temperature: f64,

    /// Sampling seed
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Keep trailing punctuation on the extracted label token
    #[arg(long)]
    keep_punctuation: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn resolve_token(token_file: Option<&PathBuf>) -> Result<Option<String>> {
    if let Some(path) = token_file {
        let token = std::fs::read_to_string(path)
            .with_context(|| format!("reading token file '{}'", path.display()))?;
        let token = token.trim();
        if token.is_empty() {
            bail!("token file '{}' is empty", path.display());
        }
        return Ok(Some(token.to_string()));
    }

    Ok(std::env::var("HF_TOKEN").ok().filter(|t| !t.is_empty()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let table = CommentTable::from_path(&cli.input)
        .with_context(|| format!("ingesting comments from '{}'", cli.input.display()))?;
    info!(rows = table.len(), "comment table loaded");

    let prompt = match &cli.prompt_spec {
        Some(path) => PromptSpec::from_path(path)
            .with_context(|| format!("loading prompt spec '{}'", path.display()))?,
        None => PromptSpec::default(),
    };

    let token = resolve_token(cli.token_file.as_ref()).context("resolving credentials")?;
    if token.is_none() {
        warn!("no Hugging Face token supplied; gated model repos will be inaccessible");
    }

    let mut builder = StancePipelineBuilder::gemma3(cli.model_size)
        .prompt_spec(prompt)
        .temperature(cli.temperature)
        .seed(cli.seed)
        .max_total_tokens(cli.max_total_tokens);

    builder = match cli.device.as_str() {
        "cpu" => builder.cpu(),
        "cuda" => builder.cuda(cli.cuda_device),
        _ => builder.auto_device(),
    };
    if let Some(token) = token.as_deref() {
        builder = builder.hf_token(token);
    }
    if cli.keep_punctuation {
        builder = builder.keep_trailing_punctuation();
    }

    info!(model = %cli.model_size, "loading model");
    let pipeline = builder.build().context("loading model")?;
    info!("model loaded, starting classification");

    let outcome = pipeline.classify_all(table.records());

    table
        .write_with_labels(&cli.output, &outcome.label_strings())
        .with_context(|| format!("writing results to '{}'", cli.output.display()))?;

    info!(
        rows = table.len(),
        failed = outcome.failures.len(),
        output = %cli.output.display(),
        "run complete"
    );
    for failure in &outcome.failures {
        warn!(row = failure.row, "item failed: {}", failure.message);
    }

    Ok(())
}
