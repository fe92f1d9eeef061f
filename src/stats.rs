use crate::cache::NamespaceCounters;
use crate::models::{Metric, Report};
use dashmap::DashSet;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collected during an extraction run, shared by all workers.
#[derive(Default)]
pub struct ExtractionStats {
    pub reports_extracted: AtomicU64,
    pub reports_failed: AtomicU64,
    pub dataset_links: AtomicU64,
    pub attribute_links: AtomicU64,
    pub metric_links: AtomicU64,
    pub composition_links: AtomicU64,
    pub cycles_dropped: AtomicU64,
    pub warnings_recorded: AtomicU64,
    pub files_decoded: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    seen_datasets: DashSet<String>,
    seen_attributes: DashSet<String>,
    seen_metrics: DashSet<String>,
    seen_facts: DashSet<String>,
    seen_tables: DashSet<String>,
    seen_cycles: DashSet<(String, String)>,
}

impl ExtractionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_reports(&self) {
        self.reports_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.reports_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts the edge dropped at the end of `chain` (`... -> from -> to`),
    /// once per run no matter how many workers hit it. Returns true the first
    /// time.
    pub fn record_cycle(&self, chain: &[String]) -> bool {
        let [.., from, to] = chain else {
            return false;
        };
        let first = self.seen_cycles.insert((from.clone(), to.clone()));
        if first {
            self.cycles_dropped.fetch_add(1, Ordering::Relaxed);
        }
        first
    }

    pub fn inc_warnings(&self) {
        self.warnings_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_files(&self) {
        self.files_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_cache(&self, counters: NamespaceCounters) {
        self.cache_hits.fetch_add(counters.hits, Ordering::Relaxed);
        self.cache_misses
            .fetch_add(counters.misses, Ordering::Relaxed);
    }

    /// Counts the relationships of one finished report and marks its objects as seen.
    pub fn record_report(&self, report: &Report) {
        self.inc_reports();
        self.dataset_links
            .fetch_add(report.datasets.len() as u64, Ordering::Relaxed);

        for dataset in &report.datasets {
            self.seen_datasets.insert(dataset.id.clone());
            self.attribute_links
                .fetch_add(dataset.attributes.len() as u64, Ordering::Relaxed);
            self.metric_links
                .fetch_add(dataset.metrics.len() as u64, Ordering::Relaxed);

            for attribute in &dataset.attributes {
                self.seen_attributes.insert(attribute.id.clone());
                for form in &attribute.forms {
                    for source in &form.sources {
                        self.seen_tables.insert(source.table.id.clone());
                    }
                }
            }
            for metric in &dataset.metrics {
                self.record_metric(metric);
            }
        }
    }

    fn record_metric(&self, metric: &Metric) {
        // a metric already seen has had its subtree walked
        if !self.seen_metrics.insert(metric.id.clone()) {
            return;
        }
        if let Some(fact) = metric.fact() {
            self.seen_facts.insert(fact.id.clone());
            for source in &fact.sources {
                self.seen_tables.insert(source.table.id.clone());
            }
        }
        let components = metric.components();
        self.composition_links
            .fetch_add(components.len() as u64, Ordering::Relaxed);
        for child in components {
            self.record_metric(child);
        }
    }

    pub fn reports(&self) -> u64 {
        self.reports_extracted.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.reports_failed.load(Ordering::Relaxed)
    }

    pub fn dataset_links(&self) -> u64 {
        self.dataset_links.load(Ordering::Relaxed)
    }

    pub fn attribute_links(&self) -> u64 {
        self.attribute_links.load(Ordering::Relaxed)
    }

    pub fn metric_links(&self) -> u64 {
        self.metric_links.load(Ordering::Relaxed)
    }

    pub fn composition_links(&self) -> u64 {
        self.composition_links.load(Ordering::Relaxed)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles_dropped.load(Ordering::Relaxed)
    }

    pub fn warnings(&self) -> u64 {
        self.warnings_recorded.load(Ordering::Relaxed)
    }

    pub fn files(&self) -> u64 {
        self.files_decoded.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn unique_datasets(&self) -> u64 {
        self.seen_datasets.len() as u64
    }

    pub fn unique_attributes(&self) -> u64 {
        self.seen_attributes.len() as u64
    }

    pub fn unique_metrics(&self) -> u64 {
        self.seen_metrics.len() as u64
    }

    pub fn unique_facts(&self) -> u64 {
        self.seen_facts.len() as u64
    }

    pub fn unique_tables(&self) -> u64 {
        self.seen_tables.len() as u64
    }

    /// Relationship references per unique dataset/attribute/metric.
    pub fn reuse_factor(&self) -> f64 {
        let unique = self.unique_datasets() + self.unique_attributes() + self.unique_metrics();
        if unique == 0 {
            return 0.0;
        }
        let links = self.dataset_links() + self.attribute_links() + self.metric_links();
        links as f64 / unique as f64
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reports_extracted: self.reports(),
            reports_failed: self.failed(),
            dataset_links: self.dataset_links(),
            attribute_links: self.attribute_links(),
            metric_links: self.metric_links(),
            composition_links: self.composition_links(),
            unique_datasets: self.unique_datasets(),
            unique_attributes: self.unique_attributes(),
            unique_metrics: self.unique_metrics(),
            unique_facts: self.unique_facts(),
            unique_tables: self.unique_tables(),
            reuse_factor: self.reuse_factor(),
            cycles_dropped: self.cycles(),
            warnings: self.warnings(),
            files_decoded: self.files(),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
        }
    }
}

/// Plain copy of the counters for reporting and JSON export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub reports_extracted: u64,
    pub reports_failed: u64,
    pub dataset_links: u64,
    pub attribute_links: u64,
    pub metric_links: u64,
    pub composition_links: u64,
    pub unique_datasets: u64,
    pub unique_attributes: u64,
    pub unique_metrics: u64,
    pub unique_facts: u64,
    pub unique_tables: u64,
    pub reuse_factor: f64,
    pub cycles_dropped: u64,
    pub warnings: u64,
    pub files_decoded: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}
