const VERSION: &str = env!("CARGO_PKG_VERSION");

use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use omicsnet::community::CommunityPartition;
use omicsnet::dispatch::{bootstrap_correlate_parallel, CorrelateConfig};
use omicsnet::graph::{CorrGraph, GraphConfig};
use omicsnet::matrix::PairMatrix;
use omicsnet::network::build_intersection_network;
use omicsnet::progress::{format_time_used, DescriptiveProgress};
use omicsnet::table::{read_metadata_csv, OmicsTable};

/// Logger writing timestamped lines to a run log file
pub struct Logger {
    writer: BufWriter<File>,
}

impl Logger {
    pub fn new(file: File) -> Self {
        Self {
            writer: BufWriter::new(file),
        }
    }

    pub fn log(&mut self, message: &str) -> std::io::Result<()> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.writer, "[{}] {}", timestamp, message)?;
        self.writer.flush()?;
        Ok(())
    }
}

fn open_logger(path: &Option<String>) -> Result<Option<Logger>, Box<dyn Error>> {
    match path {
        Some(p) => Ok(Some(Logger::new(File::create(p)?))),
        None => Ok(None),
    }
}

fn log_line(logger: &mut Option<Logger>, message: &str) -> std::io::Result<()> {
    if let Some(logger) = logger {
        logger.log(message)?;
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "omicsnet", version = VERSION, about = "Bootstrap Spearman correlation networks for multi-omics time courses")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap Spearman correlation over all entity pairs of one omics table
    Correlate(CorrelateArgs),
    /// Build the intersection network and communities from correlation matrices
    Network(NetworkArgs),
}

#[derive(Args)]
struct CorrelateArgs {
    /// Wide CSV: rows entities, first column entity id, header sample names
    #[arg(short = 'i', long = "input")]
    pub input: String,
    /// Sample metadata CSV (one row per sample column)
    #[arg(short = 'm', long = "metadata")]
    pub metadata: Option<String>,
    /// Metadata column matching the input sample names
    #[arg(long = "metadata-index", default_value = "sample")]
    pub metadata_index: String,
    /// Column metadata level that groups replicates
    #[arg(short = 'r', long = "replicate-level")]
    pub replicate_level: String,
    /// Number of parallel workers
    #[arg(short = 't', long = "threads", default_value_t = 4)]
    pub threads: usize,
    /// Bootstrap iterations per pair
    #[arg(short = 'n', long = "iterations", default_value_t = 10)]
    pub iterations: usize,
    /// Tasks per dispatch chunk
    #[arg(short = 'c', long = "chunk-size", default_value_t = 10)]
    pub chunk_size: usize,
    /// RNG seed for reproducible runs
    #[arg(long = "seed")]
    pub seed: Option<u64>,
    /// Output CSV for the correlation matrix
    #[arg(long = "corr-out")]
    pub corr_out: String,
    /// Output CSV for the combined p-value matrix
    #[arg(long = "pval-out")]
    pub pval_out: String,
    /// Log file path (optional)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

#[derive(Args)]
struct NetworkArgs {
    /// Correlation matrix CSVs, one per omics layer (comma-separated)
    #[arg(long = "corr")]
    pub corr: String,
    /// P-value matrix CSVs, one per omics layer (comma-separated)
    #[arg(long = "pval")]
    pub pval: String,
    /// P-value cutoff, one shared or one per layer (comma-separated)
    #[arg(short = 'p', long = "pvalue-cutoff", default_value = "0.05")]
    pub pvalue_cutoff: String,
    /// Absolute correlation cutoff, one shared or one per layer
    #[arg(short = 'C', long = "corr-cutoff", default_value = "0.6")]
    pub corr_cutoff: String,
    /// RNG seed for reproducible community detection
    #[arg(long = "seed")]
    pub seed: Option<u64>,
    /// Output CSV for the pruned intersection edge list
    #[arg(long = "edges-out")]
    pub edges_out: String,
    /// Output CSV for the community assignment
    #[arg(long = "communities-out")]
    pub communities_out: String,
    /// Log file path (optional)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Correlate(args) => run_correlate(args),
        Commands::Network(args) => run_network(args),
    }
}

fn run_correlate(args: CorrelateArgs) -> Result<(), Box<dyn Error>> {
    let mut logger = open_logger(&args.log)?;
    log_line(&mut logger, &format!("omicsnet v{} correlate", VERSION))?;
    log_line(&mut logger, &format!("Input: {}", args.input))?;
    log_line(&mut logger, &format!("Replicate level: {}", args.replicate_level))?;
    log_line(&mut logger, &format!("Iterations: {}", args.iterations))?;
    log_line(&mut logger, &format!("Threads: {}", args.threads))?;

    let load_start = Instant::now();
    println!("[Correlate] Loading omics table");
    let mut table = OmicsTable::from_csv(&args.input)?;
    if let Some(metadata_path) = &args.metadata {
        let (header, rows) = read_metadata_csv(metadata_path)?;
        table = table.attach_metadata(&header, &rows, &args.metadata_index)?;
    }
    log_line(
        &mut logger,
        &format!(
            "Loaded {} entities x {} samples",
            table.n_entities(),
            table.n_columns()
        ),
    )?;
    println!("{}", format_time_used(load_start.elapsed()));

    let config = CorrelateConfig {
        replicate_level: args.replicate_level.clone(),
        n_workers: args.threads,
        n_iterations: args.iterations,
        chunk_size: args.chunk_size,
        seed: args.seed,
    };

    let corr_start = Instant::now();
    println!("[Correlate] Bootstrapping pair correlations");
    let mut progress = DescriptiveProgress::new("[Correlate] pairs");
    let (correlations, pvalues) = bootstrap_correlate_parallel(&table, &config, &mut progress)?;
    log_line(
        &mut logger,
        &format!("Computed {} x {} matrices", correlations.len(), pvalues.len()),
    )?;
    println!("{}", format_time_used(corr_start.elapsed()));

    correlations.to_csv(&args.corr_out)?;
    pvalues.to_csv(&args.pval_out)?;
    log_line(&mut logger, &format!("Correlations written to {}", args.corr_out))?;
    log_line(&mut logger, &format!("P-values written to {}", args.pval_out))?;
    println!("[Correlate] Done");
    Ok(())
}

fn run_network(args: NetworkArgs) -> Result<(), Box<dyn Error>> {
    let mut logger = open_logger(&args.log)?;
    log_line(&mut logger, &format!("omicsnet v{} network", VERSION))?;

    let corr_paths: Vec<&str> = args.corr.split(',').filter(|s| !s.is_empty()).collect();
    let pval_paths: Vec<&str> = args.pval.split(',').filter(|s| !s.is_empty()).collect();

    let load_start = Instant::now();
    println!("[Network] Loading {} layer(s)", corr_paths.len());
    let mut correlations = Vec::with_capacity(corr_paths.len());
    for path in &corr_paths {
        correlations.push(PairMatrix::from_csv(path)?);
    }
    let mut pvalues = Vec::with_capacity(pval_paths.len());
    for path in &pval_paths {
        pvalues.push(PairMatrix::from_csv(path)?);
    }
    println!("{}", format_time_used(load_start.elapsed()));

    let pvalue_cutoffs = parse_cutoffs(&args.pvalue_cutoff)?;
    let corr_cutoffs = parse_cutoffs(&args.corr_cutoff)?;
    let configs = pair_cutoffs(&pvalue_cutoffs, &corr_cutoffs, corr_paths.len())?;
    log_line(
        &mut logger,
        &format!("Layers: {}, cutoff configs: {}", corr_paths.len(), configs.len()),
    )?;

    let build_start = Instant::now();
    println!("[Network] Building intersection and communities");
    let (graph, partition) =
        build_intersection_network(&correlations, &pvalues, &configs, args.seed)?;
    log_line(
        &mut logger,
        &format!(
            "Intersection: {} nodes, {} edges, {} communities",
            graph.node_count(),
            graph.edge_count(),
            partition.community_count()
        ),
    )?;
    println!("{}", format_time_used(build_start.elapsed()));

    write_edge_list(&graph, &args.edges_out)?;
    write_communities(&partition, &args.communities_out)?;
    log_line(&mut logger, &format!("Edges written to {}", args.edges_out))?;
    log_line(
        &mut logger,
        &format!("Communities written to {}", args.communities_out),
    )?;
    println!("[Network] Done");
    Ok(())
}

fn parse_cutoffs(raw: &str) -> Result<Vec<f64>, Box<dyn Error>> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid cutoff value '{s}'").into())
        })
        .collect()
}

/// Zip p-value and correlation cutoffs into per-layer configs; each list may
/// hold one shared value or one value per layer.
fn pair_cutoffs(
    pvalue_cutoffs: &[f64],
    corr_cutoffs: &[f64],
    n_layers: usize,
) -> Result<Vec<GraphConfig>, Box<dyn Error>> {
    let expand = |values: &[f64], name: &str| -> Result<Vec<f64>, Box<dyn Error>> {
        match values.len() {
            1 => Ok(vec![values[0]; n_layers]),
            n if n == n_layers => Ok(values.to_vec()),
            n => Err(format!("{name} has {n} values for {n_layers} layer(s)").into()),
        }
    };
    let pvals = expand(pvalue_cutoffs, "pvalue-cutoff")?;
    let corrs = expand(corr_cutoffs, "corr-cutoff")?;
    Ok(pvals
        .into_iter()
        .zip(corrs)
        .map(|(pvalue_cutoff, corr_cutoff)| GraphConfig {
            pvalue_cutoff,
            corr_cutoff,
        })
        .collect())
}

fn write_edge_list(graph: &CorrGraph, path: &str) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "entity_a,entity_b,weight")?;
    for (a, b, w) in graph.edges() {
        writeln!(writer, "{},{},{}", a, b, w)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_communities(partition: &CommunityPartition, path: &str) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "entity,community")?;
    for (id, members) in partition.members.iter().enumerate() {
        for entity in members {
            writeln!(writer, "{},{}", entity, id)?;
        }
    }
    writer.flush()?;
    Ok(())
}
