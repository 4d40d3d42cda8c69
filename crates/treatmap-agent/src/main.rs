//! treatmap: Drug–disease treatment evidence from PubTator3.
//! Entry point for the `treatmap` binary.

mod logging;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use treatmap_common::ConceptKind;
use treatmap_config::Config;
use treatmap_ingestion::PubTatorClient;
use treatmap_kg::{analytics::DEFAULT_TOP_N, DrugDiseaseGraph, GraphTables};
use treatmap_pipeline::{seeds, Pipeline, PipelineArtifact, RunContext, SeedProvider, StaticSeeds};

#[derive(Parser, Debug)]
#[command(name = "treatmap", version, about = "Drug–disease treatment evidence from PubTator3")]
struct Cli {
    /// Path to treatmap.toml (defaults to ./treatmap.toml)
    #[arg(long, global = true, env = "TREATMAP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the four-stage pipeline and write the run artifact.
    Run {
        /// Comma-separated seed terms, replacing the configured seed source
        #[arg(long, value_delimiter = ',')]
        seeds: Vec<String>,
        /// Seed concept: chemical (default) or disease
        #[arg(long, value_parser = parse_anchor)]
        anchor: Option<ConceptKind>,
        /// Parent directory of the run directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Also export the graph and analytics tables into the run directory
        #[arg(long)]
        graph: bool,
    },

    /// Build nodes.csv, edges.csv and graph.graphml next to a run artifact.
    Graph {
        /// Path to pipeline_<run_id>.json
        artifact: PathBuf,
    },

    /// Rank drugs and diseases by publications from a run's graph tables.
    Analyze {
        /// Run directory containing nodes.csv and edges.csv
        run_dir: PathBuf,
        /// Rows per ranking
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top: usize,
    },
}

fn parse_anchor(s: &str) -> Result<ConceptKind, String> {
    ConceptKind::parse(s).ok_or_else(|| format!("unknown concept '{s}' (expected chemical or disease)"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: could not read .env: {e}");
        }
    }

    let cli = Cli::parse();
    let anchor = match &cli.command {
        Commands::Run { anchor, .. } => *anchor,
        _ => None,
    };
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path, anchor).with_context(|| format!("loading {}", path.display()))?,
        None => Config::load(anchor).context("loading configuration")?,
    };

    match cli.command {
        Commands::Run { seeds, output_dir, graph, .. } => {
            if let Some(dir) = output_dir {
                config.pipeline.output_dir = dir.to_string_lossy().into_owned();
            }
            cmd_run(config, seeds, graph).await
        }
        Commands::Graph { artifact } => {
            logging::init(None)?;
            cmd_graph(&artifact)
        }
        Commands::Analyze { run_dir, top } => {
            logging::init(None)?;
            cmd_analyze(&run_dir, top)
        }
    }
}

async fn cmd_run(config: Config, seed_terms: Vec<String>, with_graph: bool) -> anyhow::Result<()> {
    let ctx = RunContext::create(&config.pipeline.output_dir)
        .with_context(|| format!("creating run directory under {}", config.pipeline.output_dir))?;
    logging::init(Some(&ctx.log_path()))?;

    info!("Treatmap {} starting run {}", env!("CARGO_PKG_VERSION"), ctx.run_id);
    info!(
        anchor = %config.pipeline.anchor,
        rps = config.pubtator.requests_per_second,
        retries = config.pubtator.retries,
        "Configuration loaded"
    );

    let provider: Box<dyn SeedProvider> = if seed_terms.is_empty() {
        seeds::from_config(&config)?
    } else {
        Box::new(StaticSeeds::new(seed_terms))
    };

    let client = PubTatorClient::from_config(&config.pubtator)?;
    let pipeline = Pipeline::new(client, config.pipeline.clone());
    let report = pipeline.run(provider.as_ref(), &ctx).await.context("pipeline run failed")?;
    info!("Saved log:  {}", ctx.log_path().display());

    if with_graph {
        export_graph(&report.artifact, &ctx.run_dir)?;
        GraphTables::load(&ctx.run_dir)?.write_report(&ctx.run_dir, DEFAULT_TOP_N)?;
    }
    Ok(())
}

fn cmd_graph(artifact_path: &Path) -> anyhow::Result<()> {
    let artifact = PipelineArtifact::read_json(artifact_path)
        .with_context(|| format!("reading artifact {}", artifact_path.display()))?;
    let dir = match artifact_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    export_graph(&artifact, &dir)
}

fn export_graph(artifact: &PipelineArtifact, dir: &Path) -> anyhow::Result<()> {
    let graph = DrugDiseaseGraph::from_artifact(artifact);
    if graph.edges().is_empty() {
        warn!(run_id = %artifact.run_id, "Artifact has no evidence; graph will be empty");
    }
    let out = graph.export(dir)?;
    info!("Saved nodes:   {}", out.nodes_csv.display());
    info!("Saved edges:   {}", out.edges_csv.display());
    info!("Saved GraphML: {}", out.graphml.display());
    Ok(())
}

fn cmd_analyze(run_dir: &Path, top: usize) -> anyhow::Result<()> {
    if top == 0 {
        bail!("--top must be at least 1");
    }
    let tables = GraphTables::load(run_dir)
        .with_context(|| format!("loading graph tables from {} (run `treatmap graph` first)", run_dir.display()))?;

    for (rank, row) in tables.top_diseases(top).iter().enumerate() {
        info!("disease #{:<2} {:<40} {}", rank + 1, row.label, row.total_articles);
    }
    for (rank, row) in tables.top_drugs(top).iter().enumerate() {
        info!("drug    #{:<2} {:<40} {}", rank + 1, row.label, row.total_articles);
    }

    let report = tables.write_report(run_dir, top)?;
    info!("Saved: {}", report.top_diseases.display());
    info!("Saved: {}", report.top_drugs.display());
    info!("Saved: {}", report.drug_breadth.display());
    Ok(())
}
