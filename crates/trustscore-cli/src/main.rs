#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use serde_json::Value as JsonValue;
use trustscore_runtime::{BatchRunner, EngineConfig, ProviderRegistry, ScoringEngine};

#[derive(Parser)]
#[command(name = "trustscore", version, about = "Self-reflection trust scoring for LLM answers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single question/answer pair
    Score {
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
        /// Model identifier (defaults to TRUSTSCORE_MODEL or gemini/gemini-pro)
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        no_cache: bool,
        /// Print the per-prompt report as JSON
        #[arg(long)]
        detailed: bool,
    },
    /// Score every pair in a JSON file of [{"question": .., "answer": ..}]
    Batch {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        model: Option<String>,
        /// Log progress after each pair
        #[arg(long)]
        progress: bool,
    },
    /// List built-in providers and whether each has a usable API key
    Providers,
}

#[derive(Deserialize)]
struct QaPair {
    question: String,
    answer: String,
}

#[derive(Serialize)]
struct BatchOutput<'a> {
    question: &'a str,
    answer: &'a str,
    score: f64,
}

#[derive(Debug, Serialize)]
struct ProviderListing {
    provider: &'static str,
    description: &'static str,
    default_config: JsonValue,
    ready: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            question,
            answer,
            model,
            temperature,
            no_cache,
            detailed,
        } => {
            let mut config = load_config(model)?;
            if let Some(temperature) = temperature {
                config.temperature = temperature;
            }
            if no_cache {
                config.cache_enabled = false;
            }

            let engine = build_engine(config)?;
            if detailed {
                let report = engine.score_detailed(&question, &answer).await;
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", engine.score(&question, &answer).await);
            }
        }
        Commands::Batch {
            input,
            model,
            progress,
        } => {
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let pairs: Vec<QaPair> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", input.display()))?;

            let engine = build_engine(load_config(model)?)?;
            let tuples: Vec<(&str, &str)> = pairs
                .iter()
                .map(|p| (p.question.as_str(), p.answer.as_str()))
                .collect();
            let scores = BatchRunner::new(&engine)
                .with_progress(progress)
                .evaluate_all(&tuples)
                .await;

            let output: Vec<BatchOutput<'_>> = pairs
                .iter()
                .zip(scores)
                .map(|(pair, score)| BatchOutput {
                    question: &pair.question,
                    answer: &pair.answer,
                    score: score.value(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Providers => {
            let registry = ProviderRegistry::with_defaults();
            let listing = list_providers(&registry, &serde_json::json!({})).await;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
    }

    Ok(())
}

fn load_config(model: Option<String>) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_env().context("Invalid environment configuration")?;
    if let Some(model) = model {
        config.model = model;
    }
    Ok(config)
}

fn build_engine(config: EngineConfig) -> Result<ScoringEngine> {
    let model = config.model.clone();
    ScoringEngine::builder()
        .config(config)
        .build()
        .with_context(|| format!("Failed to set up scoring for model '{}'", model))
}

/// Build each registered provider from `config` and ask whether it is ready.
async fn list_providers(registry: &ProviderRegistry, config: &JsonValue) -> Vec<ProviderListing> {
    let mut listing = Vec::new();
    for (provider, description) in registry.describe() {
        let ready = match registry.create(provider, config) {
            Ok(built) => built.health_check().await,
            Err(e) => {
                tracing::debug!(provider, error = %e, "Provider not available");
                false
            }
        };
        listing.push(ProviderListing {
            provider,
            description,
            default_config: registry.default_config(provider).unwrap_or(JsonValue::Null),
            ready,
        });
    }
    listing
}
