use clap::Parser;
use std::path::PathBuf;

use phylosig::pipeline::{self, PoolConfig};
use phylosig::{list, utils};

#[derive(Parser)]
#[command(name = "phylosig")]
#[command(about = "Pairwise proteome signature correlation for seeding phylogenetic analysis", long_about = None)]
#[command(version)]
struct Cli {
    /// Genome list file: a count followed by that many genome names
    #[arg(value_name = "LIST", default_value = "list.txt")]
    list: PathBuf,

    /// Directory containing the {name}.faa proteome files
    #[arg(short = 'd', long, value_name = "DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Output file for the correlation matrix
    #[arg(short = 'o', long, value_name = "FILE", default_value = "correlation_matrix.txt")]
    output: PathBuf,

    /// Loader threads (file parsing)
    #[arg(long, value_name = "INT", default_value = "2")]
    loaders: usize,

    /// Transformer threads (signature construction)
    #[arg(long, value_name = "INT", default_value = "2")]
    transformers: usize,

    /// Comparator threads (pair correlation)
    #[arg(long, value_name = "INT")]
    comparators: Option<usize>,

    /// Rayon threads for the transform sweep (default: all available cores)
    #[arg(short = 't', long, value_name = "INT")]
    threads: Option<usize>,

    /// Load every genome up front and compare with the rayon pool instead
    /// of the staged pipeline (faster on small inputs, more memory)
    #[arg(long)]
    batch: bool,

    /// Verbose level: 1=error, 2=warning, 3=message, 4+=debugging
    #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
    verbosity: i32,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let mut num_threads = cli.threads.unwrap_or_else(num_cpus::get);
    if num_threads < 1 {
        log::warn!("Invalid thread count {}, using 1 thread", num_threads);
        num_threads = 1;
    }
    let max_threads = num_cpus::get() * 2;
    if num_threads > max_threads {
        log::warn!(
            "Thread count {} exceeds recommended maximum {}, capping at {}",
            num_threads,
            max_threads,
            max_threads
        );
        num_threads = max_threads;
    }
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        log::warn!(
            "Failed to configure thread pool: {} (may already be initialized)",
            e
        );
    }

    let pools = PoolConfig {
        loaders: cli.loaders.max(1),
        transformers: cli.transformers.max(1),
        comparators: cli.comparators.unwrap_or_else(|| num_threads.min(8)).max(1),
    };

    let start_real = utils::realtime();
    let start_cpu = utils::cputime();

    let paths = match list::read_list(&cli.list, &cli.data_dir) {
        Ok(paths) => paths,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };
    log::info!("{} genomes listed in {}", paths.len(), cli.list.display());

    let result = if cli.batch {
        pipeline::run_batch(&paths)
    } else {
        log::info!(
            "pipeline pools: {} loaders, {} transformers, {} comparators",
            pools.loaders,
            pools.transformers,
            pools.comparators
        );
        pipeline::run(paths, &pools)
    };

    let matrix = match result {
        Ok(matrix) => matrix,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = matrix.save(&cli.output) {
        log::error!("{e}");
        std::process::exit(1);
    }

    log::info!(
        "done: {} pairwise correlations in {:.2} sec real, {:.2} sec CPU",
        matrix.n() * matrix.n().saturating_sub(1) / 2,
        utils::realtime() - start_real,
        utils::cputime() - start_cpu
    );
}
