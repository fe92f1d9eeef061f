use anyhow::{bail, Context, Result};
use bimap::config::{self, ExtractorConfig, Locale};
use bimap::coordinator;
use bimap::export;
use bimap::extract::{Corpus, ReportSelection};
use bimap::index::IndexSet;
use bimap::snapshot;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "bimap")]
#[command(about = "Rebuild the report/metric/table graph from BI documentation exports")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract reports into an entity graph
    Extract(ExtractArgs),
    /// List the reports found in the document index
    ListReports(CorpusArgs),
}

#[derive(Args)]
struct CorpusArgs {
    /// Directory containing the HTML export
    #[arg(short, long)]
    base_path: PathBuf,

    /// Export language (en-us or pt-br)
    #[arg(long, default_value = "en-us")]
    locale: String,

    /// Directory for the index snapshot
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Ignore and rebuild the index snapshot
    #[arg(long)]
    no_cache: bool,
}

#[derive(Args)]
struct ExtractArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Extract only reports with this name
    #[arg(long, conflicts_with_all = ["report_id", "filter"])]
    report: Option<String>,

    /// Extract only the report with this id
    #[arg(long, conflicts_with = "filter")]
    report_id: Option<String>,

    /// Extract reports whose name contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Worker threads (defaults to available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Max cached objects per namespace
    #[arg(long, default_value_t = config::DEFAULT_CACHE_CAPACITY)]
    cache_capacity: usize,

    /// Time budget per report in seconds (0 disables it)
    #[arg(long, default_value_t = config::DEFAULT_REPORT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Write the full run outcome as JSON
    #[arg(long)]
    output_json: Option<PathBuf>,

    /// Write nodes.csv and edges.csv to this directory
    #[arg(long)]
    output_csv: Option<PathBuf>,
}

fn parse_locale(code: &str) -> Result<&'static Locale> {
    match Locale::from_code(code) {
        Some(locale) => Ok(locale),
        None => bail!("Unknown locale: {} (expected en-us or pt-br)", code),
    }
}

/// Opens the corpus, going through the index snapshot when a cache dir is given.
fn open_corpus(args: &CorpusArgs, config: ExtractorConfig) -> Result<Corpus> {
    let Some(cache_dir) = &args.cache_dir else {
        return Corpus::open(config).context("Failed to load indexes");
    };
    let path = snapshot::snapshot_path(cache_dir);

    if !args.no_cache {
        if let Some(indexes) = snapshot::try_load(&path, &config.base_path, config.locale)? {
            info!("Loaded indexes from snapshot");
            return Ok(Corpus::from_parts(config, indexes));
        }
    }

    info!("Building indexes (snapshot missing, stale or disabled)");
    let indexes = IndexSet::load(&config.base_path, config.locale, config.max_file_bytes)
        .context("Failed to load indexes")?;
    if let Err(e) = snapshot::save(&indexes, &path, &config.base_path, config.locale) {
        warn!(error = %e, "Failed to save index snapshot");
    }
    Ok(Corpus::from_parts(config, indexes))
}

fn base_config(args: &CorpusArgs) -> Result<ExtractorConfig> {
    if !args.base_path.is_dir() {
        bail!("Export directory not found: {}", args.base_path.display());
    }
    let mut config = ExtractorConfig::new(&args.base_path);
    config.locale = parse_locale(&args.locale)?;
    Ok(config)
}

fn selection(args: &ExtractArgs) -> ReportSelection {
    if let Some(id) = &args.report_id {
        ReportSelection::Id(id.to_ascii_uppercase())
    } else if let Some(name) = &args.report {
        ReportSelection::Name(name.clone())
    } else if let Some(filter) = &args.filter {
        ReportSelection::Filter(filter.clone())
    } else {
        ReportSelection::All
    }
}

fn run_extract(args: ExtractArgs, show_progress: bool) -> Result<()> {
    let mut extractor_config = base_config(&args.corpus)?;
    extractor_config.cache_capacity = args.cache_capacity;
    extractor_config.workers = args.workers.unwrap_or_else(config::default_workers).max(1);
    extractor_config.report_timeout =
        (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs));
    let workers = extractor_config.workers;

    let start_indexing = Instant::now();
    let corpus = Arc::new(open_corpus(&args.corpus, extractor_config)?);
    let indexing_duration = start_indexing.elapsed();
    info!(
        duration_secs = indexing_duration.as_secs_f64(),
        "Indexing complete"
    );

    let reports = corpus.select_reports(&selection(&args));
    if reports.is_empty() {
        bail!("No report matches the selection");
    }

    let start_extracting = Instant::now();
    let outcome = coordinator::run(Arc::clone(&corpus), reports, workers, show_progress)?;
    let extraction_duration = start_extracting.elapsed();

    if let Some(path) = &args.output_json {
        export::write_json(&outcome, path)?;
    }
    if let Some(dir) = &args.output_csv {
        export::write_csv(&outcome.reports, dir)?;
    }

    let stats = &outcome.stats;
    println!();
    println!("=== Summary ===");
    println!(
        "Indexing time:      {:.2}s",
        indexing_duration.as_secs_f64()
    );
    println!(
        "Extraction time:    {:.2}s",
        extraction_duration.as_secs_f64()
    );
    println!();
    println!("Reports extracted:  {}", stats.reports_extracted);
    println!("Reports failed:     {}", stats.reports_failed);
    println!("Dataset links:      {}", stats.dataset_links);
    println!("Attribute links:    {}", stats.attribute_links);
    println!("Metric links:       {}", stats.metric_links);
    println!("Unique datasets:    {}", stats.unique_datasets);
    println!("Unique attributes:  {}", stats.unique_attributes);
    println!("Unique metrics:     {}", stats.unique_metrics);
    println!("Unique facts:       {}", stats.unique_facts);
    println!("Unique tables:      {}", stats.unique_tables);
    println!("Reuse factor:       {:.2}", stats.reuse_factor);
    println!("Cycles dropped:     {}", stats.cycles_dropped);
    println!("Warnings:           {}", stats.warnings);
    println!("Files decoded:      {}", stats.files_decoded);
    println!(
        "Cache hits/misses:  {}/{}",
        stats.cache_hits, stats.cache_misses
    );

    for failure in &outcome.failures {
        eprintln!(
            "Failed: {} [{}]: {}",
            failure.report_name, failure.report_id, failure.error
        );
    }

    Ok(())
}

fn run_list_reports(args: CorpusArgs) -> Result<()> {
    let config = base_config(&args)?;
    let corpus = open_corpus(&args, config)?;
    for report in corpus.reports() {
        println!("{}\t{}\t{}", report.id, report.name, report.location);
    }
    for kind in corpus.indexes.missing() {
        warn!(kind = %kind, "Index file missing");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let result = match cli.command {
        Commands::Extract(args) => run_extract(args, cli.verbose < 2),
        Commands::ListReports(args) => run_list_reports(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
