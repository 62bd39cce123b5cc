//! `molgen`: pack molecule records and inspect the loaders.
//!
//! ```text
//! molgen pack records.json data/train.safetensors
//! molgen iterate data --config loader.toml --batches 2
//! molgen prior data/train.safetensors --num 8
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use molgen_data::chem::read_records;
use molgen_data::config::LoaderConfig;
use molgen_data::data::{EvaluationLoader, GenLoader, GraphBatch, InMemoryDataset};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "molgen")]
#[command(about = "Molecular graph data tools")]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSON array of molecule records into a safetensors dataset
    Pack {
        input: PathBuf,
        output: PathBuf,
    },
    /// Build the training loader over a data directory and print the first batches
    Iterate {
        datadir: PathBuf,
        /// TOML loader configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, default_value_t = 3)]
        batches: usize,
    },
    /// Sample prior-only graphs with node counts following a dataset
    Prior {
        dataset: PathBuf,
        #[arg(short, long, default_value_t = 8)]
        num: usize,
        #[arg(long, default_value_t = molgen_data::data::DEFAULT_EVAL_BATCH_SIZE)]
        batch_size: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match cli.command {
        Commands::Pack { input, output } => pack(input, output),
        Commands::Iterate {
            datadir,
            config,
            batches,
        } => iterate(datadir, config, batches),
        Commands::Prior {
            dataset,
            num,
            batch_size,
            seed,
        } => prior(dataset, num, batch_size, seed),
    }
}

fn pack(input: PathBuf, output: PathBuf) -> Result<()> {
    let records = read_records(&input)
        .with_context(|| format!("failed to read records from {}", input.display()))?;
    let dataset = InMemoryDataset::from_records(&records)?;
    dataset
        .save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "packed {} molecules ({} atoms) into {}",
        records.len(),
        dataset.total_nodes(),
        output.display()
    );
    Ok(())
}

fn iterate(datadir: PathBuf, config: Option<PathBuf>, batches: usize) -> Result<()> {
    let config = match config {
        Some(path) => LoaderConfig::from_file(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => LoaderConfig::default(),
    }
    .with_env_overrides();

    let path = datadir.join(format!("{}.safetensors", config.split.as_str()));
    let dataset = InMemoryDataset::load(&path)
        .with_context(|| format!("failed to load dataset {}", path.display()))?;
    let histogram = dataset.node_histogram()?;
    let loader = GenLoader::new(dataset, &histogram, config)?;

    println!(
        "{} batches per epoch, max_n_nodes = {}",
        loader.len(),
        loader.max_n_nodes()
    );
    for (i, batch) in loader.iter().take(batches).enumerate() {
        print_batch(i, &batch?);
    }
    Ok(())
}

fn prior(dataset: PathBuf, num: usize, batch_size: usize, seed: Option<u64>) -> Result<()> {
    let dataset = InMemoryDataset::load(&dataset)
        .with_context(|| format!("failed to load dataset {}", dataset.display()))?;
    let histogram = dataset.node_histogram()?;
    let loader = EvaluationLoader::new(num, &histogram, batch_size, seed)?;

    for (i, batch) in loader.iter().enumerate() {
        print_batch(i, &batch?);
    }
    Ok(())
}

fn print_batch(i: usize, batch: &GraphBatch) {
    let sizes: Vec<usize> = (0..batch.num_graphs())
        .filter_map(|g| batch.graph_nodes(g).map(|r| r.len()))
        .collect();
    println!(
        "batch {i}: {} graphs, {} nodes, {} edges, sizes {:?}",
        batch.num_graphs(),
        batch.num_nodes(),
        batch.num_edges(),
        sizes
    );
}
