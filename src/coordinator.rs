use crate::config::PROGRESS_INTERVAL;
use crate::error::{ExtractWarning, ReportFailure, WarningKind};
use crate::extract::{Corpus, Extractor};
use crate::index::IndexEntry;
use crate::models::Report;
use crate::stats::{ExtractionStats, StatsSnapshot};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Everything a run produced.
#[derive(Debug, Default, Serialize)]
pub struct RunOutcome {
    pub reports: Vec<Report>,
    pub warnings: Vec<ExtractWarning>,
    pub failures: Vec<ReportFailure>,
    pub stats: StatsSnapshot,
}

#[derive(Default)]
struct PartitionResult {
    reports: Vec<Report>,
    warnings: Vec<ExtractWarning>,
    failures: Vec<ReportFailure>,
}

/// Splits `items` into at most `parts` contiguous chunks of near-equal size.
pub fn partition<T: Clone>(items: &[T], parts: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let parts = parts.clamp(1, items.len());
    let chunk = items.len().div_ceil(parts);
    items.chunks(chunk).map(<[T]>::to_vec).collect()
}

/// Keeps the first cycle warning per chain. Each partition has its own cache,
/// so a cycle reachable from several partitions is reported by each of them.
fn dedup_cycle_warnings(warnings: Vec<ExtractWarning>) -> Vec<ExtractWarning> {
    let mut seen = FxHashSet::default();
    warnings
        .into_iter()
        .filter(|w| w.kind != WarningKind::CircularReference || seen.insert(w.message.clone()))
        .collect()
}

fn make_progress_bar(total: u64, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} reports ({elapsed})")
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn run_partition(
    corpus: Arc<Corpus>,
    stats: Arc<ExtractionStats>,
    reports: Vec<IndexEntry>,
    pb: &ProgressBar,
) -> PartitionResult {
    let mut extractor = Extractor::with_stats(corpus, Arc::clone(&stats));
    let mut result = PartitionResult::default();

    for (n, entry) in reports.iter().enumerate() {
        match extractor.extract_report(entry) {
            Ok(report) => {
                stats.record_report(&report);
                result.reports.push(report);
            }
            Err(e) => {
                error!(report = %entry.id, error = %e, "Report extraction failed");
                stats.inc_failed();
                result.failures.push(ReportFailure {
                    report_id: entry.id.clone(),
                    report_name: entry.name.clone(),
                    error: e.to_string(),
                });
            }
        }
        pb.inc(1);
        if (n as u64 + 1) % PROGRESS_INTERVAL == 0 {
            pb.tick();
        }
    }

    stats.add_cache(extractor.cache().totals());
    result.warnings = extractor.take_warnings();
    result
}

/// Extracts `reports` on `workers` threads, one extractor (and cache) per
/// partition. Report order within the outcome follows partition order.
pub fn run(
    corpus: Arc<Corpus>,
    reports: Vec<IndexEntry>,
    workers: usize,
    show_progress: bool,
) -> Result<RunOutcome> {
    let stats = Arc::new(ExtractionStats::new());
    let partitions = partition(&reports, workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("bimap-worker-{i}"))
        .build()
        .context("Failed to build worker pool")?;

    info!(
        reports = reports.len(),
        partitions = partitions.len(),
        workers,
        "Starting extraction"
    );

    let pb = make_progress_bar(reports.len() as u64, show_progress);
    let results: Vec<PartitionResult> = pool.install(|| {
        partitions
            .into_par_iter()
            .map(|part| run_partition(Arc::clone(&corpus), Arc::clone(&stats), part, &pb))
            .collect()
    });
    pb.finish_and_clear();

    let mut outcome = RunOutcome::default();
    let mut warnings = Vec::new();
    for result in results {
        outcome.reports.extend(result.reports);
        warnings.extend(result.warnings);
        outcome.failures.extend(result.failures);
    }
    outcome.warnings = dedup_cycle_warnings(warnings);
    outcome.stats = stats.snapshot();
    outcome.stats.warnings = outcome.warnings.len() as u64;

    info!(
        extracted = outcome.reports.len(),
        failed = outcome.failures.len(),
        warnings = outcome.warnings.len(),
        "Extraction finished"
    );

    Ok(outcome)
}
