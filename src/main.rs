use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fts::bench::{load_queries, BenchConfig, BenchRunner, Corpus, Report};
use fts::driver::{Driver, DriverOptions, DriverRegistry, MmapDriver};
use fts::index::Segment;
use fts::server::{self, IndexClient};
use fts::utils::progress::document_bar;
use fts::utils::AppConfig;
use fts::{output, Profile};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fts")]
#[command(about = "Succinct full-text search with swappable storage profiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to <config_dir>/fts/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a corpus into a new segment
    Index {
        /// JSONL file, text file (one document per line) or directory
        data: PathBuf,

        /// Storage profile: speed, balanced or compact
        #[arg(short, long)]
        profile: Option<Profile>,

        /// Segment directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Index at most this many documents
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Search the segments of a directory, or a running server
    Search {
        /// Query terms
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Segment directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Query the index server instead of local segments
        #[arg(long)]
        remote: bool,
    },
    /// Show segment or server statistics
    Stats {
        /// Segment directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Query the index server instead of local segments
        #[arg(long)]
        remote: bool,
    },
    /// Run the index server in the foreground
    Serve {
        /// Storage profile of the served index
        #[arg(short, long)]
        profile: Option<Profile>,

        /// Socket path
        #[arg(long)]
        socket: Option<PathBuf>,

        /// Stop a running server instead of starting one
        #[arg(long)]
        stop: bool,
    },
    /// Benchmark drivers
    Bench(BenchArgs),
}

#[derive(clap::Args)]
struct BenchArgs {
    /// Single driver to run
    #[arg(long, conflicts_with_all = ["drivers", "all"])]
    driver: Option<String>,

    /// Comma-separated drivers to run
    #[arg(long, value_delimiter = ',')]
    drivers: Vec<String>,

    /// Run every registered driver
    #[arg(long)]
    all: bool,

    /// List registered drivers and exit
    #[arg(long)]
    list: bool,

    /// Corpus: JSONL, text file or directory (synthetic when omitted)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Documents in the synthetic corpus
    #[arg(long, default_value_t = 10_000)]
    docs: usize,

    /// Query file, one query per line (derived from the corpus when omitted)
    #[arg(long)]
    queries: Option<PathBuf>,

    /// Latency samples per query
    #[arg(long)]
    iterations: Option<usize>,

    /// Comma-separated concurrency levels
    #[arg(long, value_delimiter = ',')]
    concurrency: Vec<usize>,

    /// Seconds per throughput run
    #[arg(long)]
    duration: Option<u64>,

    /// Profile for the ffi and mmap drivers
    #[arg(short, long)]
    profile: Option<Profile>,

    /// Report file (.md, .json or .csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Merge earlier JSON reports into this run's report
    #[arg(long, value_delimiter = ',')]
    combine: Vec<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let color = !cli.no_color;

    match cli.command {
        Commands::Index {
            data,
            profile,
            dir,
            limit,
        } => {
            let profile = profile.unwrap_or(config.default_profile);
            let dir = resolve_dir(&config, dir)?;
            index_corpus(&data, profile, &dir, limit)?;
        }
        Commands::Search {
            query,
            limit,
            dir,
            remote,
        } => {
            let query = query.join(" ");
            let limit = limit.unwrap_or(config.search_limit);
            let hits = if remote {
                let mut client = connect(&config)?;
                let hits = client.search(&query, limit.min(u32::MAX as usize) as u32)?;
                client.close()?;
                hits
            } else {
                let driver = MmapDriver::open(&resolve_dir(&config, dir)?, config.default_profile)?;
                driver.search(&query, limit)?
            };
            output::print_results(&hits, None, color)?;
        }
        Commands::Stats { dir, remote } => {
            if remote {
                let mut client = connect(&config)?;
                let stats = client.stats()?;
                client.close()?;
                output::print_driver_stats("server", &stats, color)?;
            } else {
                show_segment_stats(&resolve_dir(&config, dir)?, color)?;
            }
        }
        Commands::Serve {
            profile,
            socket,
            stop,
        } => {
            let socket = socket.unwrap_or_else(|| config.effective_socket_path());
            if stop {
                if server::daemon::stop_daemon(&socket)? {
                    println!("Server stopped");
                } else {
                    println!("Server is not running");
                }
                return Ok(());
            }
            if server::is_server_running() {
                bail!("an index server is already running; stop it with 'fts serve --stop'");
            }
            let profile = profile.unwrap_or(config.default_profile);
            println!("Serving {} index on {} (Ctrl+C to stop)", profile, socket.display());
            server::daemon::run_foreground(profile, socket, config.io_timeout())?;
        }
        Commands::Bench(args) => run_bench(args, &config)?,
    }

    Ok(())
}

fn resolve_dir(config: &AppConfig, dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => config.effective_segment_dir(),
    }
}

fn connect(config: &AppConfig) -> Result<IndexClient> {
    let socket = config.effective_socket_path();
    IndexClient::connect(&socket, config.io_timeout())
        .with_context(|| format!("no index server listening on {}", socket.display()))
}

fn index_corpus(data: &Path, profile: Profile, dir: &Path, limit: Option<usize>) -> Result<()> {
    let corpus = Corpus::load(data, limit)?;
    let driver = MmapDriver::open(dir, profile)?;

    let bar = document_bar(corpus.len() as u64, false);
    for batch in corpus.docs.chunks(1_000) {
        driver.add_documents(batch)?;
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();
    driver.build()?;

    let path = driver
        .segment_paths()
        .pop()
        .context("build produced no segment")?;
    info!(path = %path.display(), docs = corpus.len(), "index written");
    println!("Indexed {} documents into {}", corpus.len(), path.display());
    Ok(())
}

fn show_segment_stats(dir: &Path, color: bool) -> Result<()> {
    let driver = MmapDriver::open(dir, Profile::default())?;
    let paths = driver.segment_paths();
    if paths.is_empty() {
        println!("No segments in {}", dir.display());
        return Ok(());
    }
    for path in paths {
        let segment = Segment::open(&path)?;
        println!("{}", path.display());
        output::print_index_stats(&segment.stats(), color)?;
    }
    output::print_driver_stats("mmap", &driver.stats()?, color)?;
    Ok(())
}

fn run_bench(args: BenchArgs, config: &AppConfig) -> Result<()> {
    let registry = DriverRegistry::with_defaults();
    if args.list {
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let drivers: Vec<String> = if args.all {
        registry.names().into_iter().map(String::from).collect()
    } else if let Some(driver) = args.driver {
        vec![driver]
    } else if !args.drivers.is_empty() {
        args.drivers
    } else {
        bail!("select drivers with --driver, --drivers or --all (see --list)");
    };

    let bench_config = BenchConfig {
        drivers,
        iterations: args.iterations.unwrap_or(config.bench_iterations),
        concurrency: if args.concurrency.is_empty() {
            config.bench_concurrency.clone()
        } else {
            args.concurrency
        },
        duration: Duration::from_secs(args.duration.unwrap_or(config.bench_duration_secs)),
        limit: config.search_limit,
        ..BenchConfig::default()
    };

    // Each run writes its mmap segments to a fresh directory
    let mut options = DriverOptions::from_config(config)?;
    if let Some(profile) = args.profile {
        options.profile = profile;
    }
    options.segment_dir = std::env::temp_dir().join(format!(
        "fts-bench-{}-{}",
        std::process::id(),
        fts::bench::report::unix_now()
    ));

    let runner = BenchRunner::new(&registry, options.clone(), bench_config);
    runner.validate()?;

    let corpus = match &args.data {
        Some(path) => Corpus::load(path, None)?,
        None => Corpus::synthetic(args.docs, 64, 42),
    };
    let queries = match &args.queries {
        Some(path) => load_queries(path)?,
        None => corpus.derive_queries(50),
    };
    info!(corpus = %corpus.name, docs = corpus.len(), queries = queries.len(), "starting benchmark");

    let report = runner.run(&corpus, &queries);
    let _ = std::fs::remove_dir_all(&options.segment_dir);
    let mut report = report?;

    if !args.combine.is_empty() {
        let mut reports = args
            .combine
            .iter()
            .map(|p| Report::load(p))
            .collect::<Result<Vec<_>>>()?;
        reports.push(report);
        report = Report::combine(reports).context("no reports to combine")?;
    }

    match &args.output {
        Some(path) => {
            report.write_to(path)?;
            println!("Report written to {}", path.display());
        }
        None => print!("{}", report.to_markdown()),
    }

    let failures = report.failures();
    if !failures.is_empty() {
        let names: Vec<_> = failures.iter().map(|r| r.name.as_str()).collect();
        bail!("benchmark failed for: {}", names.join(", "));
    }
    Ok(())
}
