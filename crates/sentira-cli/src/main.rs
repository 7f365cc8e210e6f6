//! `senti` -- CLI binary for the sentira analysis engine.
//!
//! Provides the following subcommands:
//!
//! - `senti analyze` -- Score one or more texts against a set of backends.
//! - `senti backends` -- List known backends and their pacing.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sentira_backends::{builtin_remotes, ModelLoader, TransportRegistry};
use sentira_core::{AnalysisRequest, Orchestrator};
use sentira_types::{AnalysisConfig, BackendId, FeatureKind, PacingConfig};

/// sentira sentiment analysis CLI.
#[derive(Parser)]
#[command(name = "senti", about = "sentira sentiment analysis CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Score one or more texts.
    Analyze(AnalyzeArgs),

    /// List known backends and their pacing configuration.
    Backends,
}

/// Arguments for `senti analyze`.
#[derive(clap::Args)]
struct AnalyzeArgs {
    /// Texts to analyze.
    #[arg(required = true)]
    texts: Vec<String>,

    /// Backends to score with (comma-separated:
    /// lexicon, local-model, gpt4, gemini, grok).
    #[arg(short, long, value_delimiter = ',', default_value = "lexicon")]
    backends: Vec<String>,

    /// Optional features to compute (comma-separated: sarcasm, iq, bot).
    #[arg(short, long, value_delimiter = ',')]
    features: Vec<String>,

    /// Image reference to analyze alongside a single text.
    #[arg(long)]
    image: Option<String>,

    /// Per-text source labels, matched by position.
    #[arg(short, long, value_delimiter = ',')]
    labels: Vec<String>,

    /// Engine configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit the internal tagged records instead of the flat shape.
    #[arg(long)]
    tagged: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze(args) => analyze(args).await,
        Commands::Backends => {
            list_backends();
            Ok(())
        }
    }
}

/// Load the engine config from a TOML file, or use the defaults.
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AnalysisConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str::<AnalysisConfig>(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn parse_backends(names: &[String]) -> anyhow::Result<BTreeSet<BackendId>> {
    let mut set = BTreeSet::new();
    for name in names {
        set.insert(name.parse::<BackendId>()?);
    }
    anyhow::ensure!(!set.is_empty(), "at least one backend is required");
    Ok(set)
}

fn parse_features(names: &[String]) -> anyhow::Result<BTreeSet<FeatureKind>> {
    let mut set = BTreeSet::new();
    for name in names {
        let kind = match name.as_str() {
            "sarcasm" => FeatureKind::Sarcasm,
            "iq" => FeatureKind::Iq,
            "bot" => FeatureKind::Bot,
            other => anyhow::bail!("unknown feature: {other}"),
        };
        set.insert(kind);
    }
    Ok(set)
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = Arc::new(load_config(args.config.as_ref())?);
    let backends = parse_backends(&args.backends)?;
    let features = parse_features(&args.features)?;

    // No neural model ships with the CLI; the local-model backend falls
    // back to the lexicon unless a deployment wires a real loader.
    let loader = Arc::new(ModelLoader::disabled("no local model bundled with the CLI"));
    let transports = Arc::new(TransportRegistry::with_builtins(loader));
    let orchestrator = Orchestrator::new(config, transports);

    let mut request = AnalysisRequest::new(args.texts, backends).with_features(features);
    if let Some(image) = args.image {
        request = request.with_image_ref(image);
    }
    if !args.labels.is_empty() {
        request = request.with_labels(args.labels);
    }

    let records = orchestrator.analyze(request).await;
    let json = if args.tagged {
        serde_json::to_string_pretty(&records)?
    } else {
        let flat: Vec<_> = records.iter().map(|r| r.flatten()).collect();
        serde_json::to_string_pretty(&flat)?
    };
    println!("{json}");
    Ok(())
}

fn list_backends() {
    for id in BackendId::ALL {
        let pacing = PacingConfig::for_backend(id);
        let endpoint = builtin_remotes()
            .into_iter()
            .find(|remote| remote.id == id)
            .map(|remote| remote.base_url)
            .unwrap_or_else(|| "in-process".into());
        println!(
            "{:<12} {:<55} batch={} delay={:.1}s..{:.1}s",
            id.as_str(),
            endpoint,
            pacing.batch_size,
            pacing.min_delay.as_secs_f64(),
            pacing.max_delay.as_secs_f64(),
        );
    }
}
