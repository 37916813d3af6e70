use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wikigraph::{
    AdjacencyIndex, ComputeBackend, CpuBackend, Explorer, GraphStore, PhysicsConfig, Settings,
    SimulationDriver, StaticLinks,
};

/// Force-directed layout of article link graphs.
#[derive(Parser)]
#[command(name = "wikigraph")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a graph from a seed article, lay it out, and print it as JSON
    Layout {
        /// Link map (.yaml/.yml/.json) of title -> linked titles
        #[arg(short, long)]
        links: PathBuf,

        /// Title of the first article
        #[arg(short, long)]
        seed: String,

        /// Stop expanding once the graph holds this many nodes
        #[arg(short, long, default_value = "50")]
        expand: usize,

        /// Simulation ticks to run
        #[arg(short, long, default_value = "300")]
        ticks: usize,

        /// Settings file (.yaml/.yml/.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Where the force kernel runs
        #[arg(short, long, value_enum, default_value = "cpu")]
        backend: BackendKind,
    },
    /// Expand a graph and print its adjacency table
    Inspect {
        /// Link map (.yaml/.yml/.json) of title -> linked titles
        #[arg(short, long)]
        links: PathBuf,

        /// Title of the first article
        #[arg(short, long)]
        seed: String,

        /// Stop expanding once the graph holds this many nodes
        #[arg(short, long, default_value = "50")]
        expand: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Cpu,
    Gpu,
}

#[derive(Serialize)]
struct LayoutNode<'a> {
    title: &'a str,
    x: f32,
    y: f32,
    mass: f32,
}

#[derive(Serialize)]
struct Layout<'a> {
    nodes: Vec<LayoutNode<'a>>,
    connections: Vec<[usize; 2]>,
}

impl<'a> Layout<'a> {
    fn from_store(store: &'a GraphStore) -> Self {
        Self {
            nodes: store
                .nodes()
                .iter()
                .map(|n| LayoutNode {
                    title: &n.title,
                    x: n.position[0],
                    y: n.position[1],
                    mass: n.mass,
                })
                .collect(),
            connections: store.connections().iter().map(|c| [c.a, c.b]).collect(),
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wikigraph=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn explore(
    links: &Path,
    seed: &str,
    max_nodes: usize,
    settings: &Settings,
) -> anyhow::Result<Explorer> {
    let links = StaticLinks::from_path(links)?;
    let mut explorer = Explorer::new(settings.explorer);
    let root = explorer.add_root(seed, [0.0, 0.0]);
    let expansions = explorer
        .expand_breadth_first(root, &links, max_nodes)
        .await?;
    info!(
        seed,
        expansions,
        nodes = explorer.store().node_count(),
        connections = explorer.store().connection_count(),
        "graph expanded"
    );
    Ok(explorer)
}

fn simulate<B: ComputeBackend>(
    backend: B,
    config: PhysicsConfig,
    store: &mut GraphStore,
    ticks: usize,
) -> anyhow::Result<()> {
    let mut driver = SimulationDriver::with_config(backend, config);
    for _ in 0..ticks {
        driver.tick(store, &mut ())?;
    }
    driver.finish(store, &mut ())?;

    let stats = driver.stats();
    info!(
        backend = driver.backend().name(),
        passes = stats.passes,
        readbacks = stats.readbacks,
        "simulation finished"
    );
    Ok(())
}

#[cfg(feature = "gpu")]
fn gpu_backend() -> anyhow::Result<wikigraph::gpu::GpuBackend> {
    Ok(wikigraph::gpu::GpuBackend::new()?)
}

async fn layout(
    links: &Path,
    seed: &str,
    expand: usize,
    ticks: usize,
    config: Option<&Path>,
    backend: BackendKind,
) -> anyhow::Result<()> {
    let settings = match config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let mut explorer = explore(links, seed, expand, &settings).await?;
    let store = explorer.store_mut();

    match backend {
        BackendKind::Cpu => simulate(CpuBackend::new(), settings.physics, store, ticks)?,
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => simulate(gpu_backend()?, settings.physics, store, ticks)?,
        #[cfg(not(feature = "gpu"))]
        BackendKind::Gpu => anyhow::bail!("wikigraph was built without the `gpu` feature"),
    }

    let json = serde_json::to_string_pretty(&Layout::from_store(explorer.store()))
        .context("serializing layout")?;
    println!("{json}");
    Ok(())
}

async fn inspect(links: &Path, seed: &str, expand: usize) -> anyhow::Result<()> {
    let explorer = explore(links, seed, expand, &Settings::default()).await?;
    let store = explorer.store();

    for node in store.nodes() {
        println!("{}\t{}\tmass={}", node.index, node.title, node.mass);
    }
    println!();
    print!(
        "{}",
        AdjacencyIndex::build(store.connections(), store.node_count())
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Layout {
            links,
            seed,
            expand,
            ticks,
            config,
            backend,
        } => layout(&links, &seed, expand, ticks, config.as_deref(), backend).await?,
        Commands::Inspect {
            links,
            seed,
            expand,
        } => inspect(&links, &seed, expand).await?,
    }

    Ok(())
}
