//! refcat - bibliography reference resolver
//!
//! Reads extracted bibliography text, splits it into references, resolves each one
//! against the configured indexes and writes one CSV row per reference.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use refcat_common::config::ConfigResolver;
use refcat_resolve::capabilities::model_client::ModelClient;
use refcat_resolve::export::export_csv;
use refcat_resolve::segment::split_into_references;
use refcat_resolve::sources::openalex::OpenAlexClient;
use refcat_resolve::sources::semantic_scholar::SemanticScholarClient;
use refcat_resolve::{ReferenceResolver, ResolverComponents};

/// Command-line arguments for refcat
#[derive(Parser, Debug)]
#[command(name = "refcat")]
#[command(about = "Resolve bibliography references into canonical records")]
#[command(version)]
struct Args {
    /// Extracted bibliography text
    #[arg(short, long)]
    input: PathBuf,

    /// CSV output path
    #[arg(short, long, default_value = "references.csv")]
    out: PathBuf,

    /// Only resolve the first N references
    #[arg(long)]
    max_refs: Option<usize>,

    /// Configuration file (overrides REFCAT_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// References resolved concurrently
    #[arg(long, env = "REFCAT_CONCURRENCY")]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let mut config = resolver.load().context("Failed to load configuration")?;
    if let Some(concurrency) = args.concurrency {
        config.pipeline.concurrency = concurrency.max(1);
    }
    if args.max_refs.is_some() {
        config.pipeline.max_refs = args.max_refs;
    }

    refcat_common::logging::init_tracing(&config.logging.level)?;

    info!("Starting refcat {}", env!("CARGO_PKG_VERSION"));
    match resolver.locate() {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: compiled defaults"),
    }

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let mut references = split_into_references(&text);
    info!("Found {} references in {}", references.len(), args.input.display());
    if let Some(max) = config.pipeline.max_refs {
        if references.len() > max {
            info!("Limiting to the first {} references", max);
            references.truncate(max);
        }
    }
    if references.is_empty() {
        warn!("No references found; writing an empty table");
    }

    let model = Arc::new(ModelClient::new(&config.model).context("Failed to build model client")?);
    info!("Model: {} at {}", model.model(), config.model.base_url);
    let components = ResolverComponents {
        parser: model.clone(),
        classifier: model.clone(),
        comparator: model,
        primary: Arc::new(
            OpenAlexClient::new(&config.primary_index)
                .context("Failed to build primary index client")?,
        ),
        secondary: Arc::new(
            SemanticScholarClient::new(&config.secondary_index)
                .context("Failed to build secondary index client")?,
        ),
    };

    let report = ReferenceResolver::new(components, &config)
        .resolve_batch(&references)
        .await;

    export_csv(&args.out, &report.records, &config.pipeline)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    info!(
        "Run {} finished: {} matched, {} fallback-filled, {} unmatched, {} failed ({} -> {})",
        report.run_id,
        report.counts.matched,
        report.counts.fallback_filled,
        report.counts.unmatched,
        report.counts.failed,
        report.started_at.to_rfc3339(),
        report.finished_at.to_rfc3339()
    );
    info!("Wrote {} rows to {}", report.records.len(), args.out.display());

    Ok(())
}
