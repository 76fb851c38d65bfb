use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use medkg::config::Config;
use medkg::disambiguation::{AnyDisambiguator, HttpDisambiguator, NoDisambiguator};
use medkg::extraction;
use medkg::graph::GraphStore;
use medkg::resolve::Resolver;
use medkg::update::UpdateController;

#[derive(Parser, Debug)]
#[command(name = "medkg")]
#[command(about = "Merge extraction batches into the persistent knowledge graph")]
struct Args {
    /// Path to the extraction batch JSON file
    batch: PathBuf,

    /// Override the graph document path from config.toml
    #[arg(short, long)]
    graph_path: Option<PathBuf>,

    /// Process the batch but do not persist the resulting graph
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();

    let config = Config::load()?;
    let graph_path = args
        .graph_path
        .unwrap_or_else(|| config.graph_path().to_path_buf());
    log::info!("Graph document: {}", graph_path.display());
    log::info!("Batch file: {}", args.batch.display());

    // A corrupt base graph aborts here, before any mutation
    let store = GraphStore::load(&graph_path)?;

    let disambiguator = if config.disambiguation.enabled {
        let api_key = std::env::var(&config.disambiguation.api_key_env)
            .map_err(|_| anyhow::anyhow!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                config.disambiguation.api_key_env
            ))?;
        AnyDisambiguator::Http(HttpDisambiguator::new(
            config.disambiguation.endpoint.clone(),
            api_key,
            config.disambiguation.model.clone(),
            Duration::from_secs(config.disambiguation.timeout_secs),
        ))
    } else {
        log::info!("Disambiguation disabled; ambiguous mentions become new entities");
        AnyDisambiguator::Off(NoDisambiguator)
    };

    let batch = extraction::load_batch(&args.batch)?;
    log::info!("Loaded {} extraction records", batch.len());

    let resolver = Resolver::new(config.resolution.clone(), disambiguator);
    let mut controller = UpdateController::new(store, resolver);
    let report = controller.run(&batch).await?;

    for skipped in &report.skipped {
        log::warn!("Record {} skipped: {}", skipped.index, skipped.reason);
    }
    log::info!(
        "{} records applied, {} skipped; +{} nodes, +{} edges, {} edges corroborated, \
         {} duplicate observations",
        report.records_processed,
        report.records_skipped,
        report.nodes_created,
        report.edges_created,
        report.edges_updated,
        report.duplicate_evidence
    );

    let store = controller.into_store();
    if args.dry_run {
        log::info!(
            "Dry run: graph not persisted ({} nodes, {} edges in memory)",
            store.node_count(),
            store.edge_count()
        );
    } else {
        store.save()?;
    }

    Ok(())
}
