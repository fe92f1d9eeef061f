use crate::cache::ObjectCache;
use crate::config::ExtractorConfig;
use crate::error::{ExtractError, ExtractWarning, WarningKind};
use crate::html;
use crate::index::{IndexEntry, IndexKind, IndexSet};
use crate::models::{
    Attribute, Dataset, DatasetKind, EmbeddedMetric, Fact, Form, Function, Metric, MetricBody,
    Report, Table, TableColumn,
};
use crate::parser::{self, MetricKind, ObjectRef, RawExpression};
use crate::resolver::LinkResolver;
use crate::stats::ExtractionStats;
use crate::text::{normalize, read_document};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Dataset indexes in the order a reference is tried against them.
const DATASET_KINDS: [(IndexKind, DatasetKind); 3] = [
    (IndexKind::Cube, DatasetKind::Cube),
    (IndexKind::Report, DatasetKind::Report),
    (IndexKind::Shortcut, DatasetKind::Shortcut),
];

/// A parsed export: configuration plus every index table. Shared read-only
/// between workers.
#[derive(Debug)]
pub struct Corpus {
    pub config: ExtractorConfig,
    pub indexes: IndexSet,
}

/// Which reports a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSelection {
    All,
    Id(String),
    /// Exact name (all duplicates), else normalized, else the best fuzzy match
    Name(String),
    /// Normalized substring of the report name
    Filter(String),
}

impl Corpus {
    /// Parses the index files. Fails only when the document index is missing.
    pub fn open(config: ExtractorConfig) -> Result<Self, ExtractError> {
        let indexes = IndexSet::load(&config.base_path, config.locale, config.max_file_bytes)?;
        Ok(Self { config, indexes })
    }

    pub fn from_parts(config: ExtractorConfig, indexes: IndexSet) -> Self {
        Self { config, indexes }
    }

    pub fn resolver(&self, kind: IndexKind) -> Option<LinkResolver<'_>> {
        self.indexes
            .get(kind)
            .map(|table| LinkResolver::new(table, self.config.fuzzy_threshold))
    }

    pub fn reports(&self) -> &[IndexEntry] {
        self.indexes
            .get(IndexKind::Document)
            .map(|t| t.entries())
            .unwrap_or_default()
    }

    pub fn select_reports(&self, selection: &ReportSelection) -> Vec<IndexEntry> {
        let all = self.reports();
        match selection {
            ReportSelection::All => all.to_vec(),
            ReportSelection::Id(id) => self
                .resolver(IndexKind::Document)
                .and_then(|r| r.find_by_id(id))
                .into_iter()
                .cloned()
                .collect(),
            ReportSelection::Name(name) => {
                let exact: Vec<IndexEntry> = all.iter().filter(|e| e.name == *name).cloned().collect();
                if !exact.is_empty() {
                    return exact;
                }
                let Some(resolver) = self.resolver(IndexKind::Document) else {
                    return Vec::new();
                };
                let normalized = resolver.find_all_by_exact_name(name);
                if !normalized.is_empty() {
                    return normalized.into_iter().cloned().collect();
                }
                resolver.find_similar(name).into_iter().cloned().collect()
            }
            ReportSelection::Filter(needle) => {
                let needle = normalize(needle);
                all.iter()
                    .filter(|e| normalize(&e.name).contains(&needle))
                    .cloned()
                    .collect()
            }
        }
    }
}

/// Metric ids in progress on the current recursion path.
///
/// Each child expansion gets its own copy, so a metric shared by two sibling
/// components is not mistaken for a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitedPath {
    chain: Vec<String>,
}

impl VisitedPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.chain.iter().any(|v| v == id)
    }

    /// A copy of this path extended with `id`.
    pub fn with(&self, id: &str) -> Self {
        let mut chain = self.chain.clone();
        chain.push(id.to_string());
        Self { chain }
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }
}

enum Lookup {
    Found(IndexEntry),
    NotFound,
    IndexMissing,
}

/// Walks Report -> Dataset -> Attribute/Metric -> Fact/Table for one worker.
///
/// Owns its cache and warning list; nothing here is shared with other
/// extractors except the read-only corpus and the atomic stats.
pub struct Extractor {
    corpus: Arc<Corpus>,
    cache: ObjectCache,
    stats: Arc<ExtractionStats>,
    warnings: Vec<ExtractWarning>,
    current_report: Option<String>,
    deadline: Option<Instant>,
}

impl Extractor {
    pub fn new(corpus: Arc<Corpus>) -> Self {
        Self::with_stats(corpus, Arc::new(ExtractionStats::new()))
    }

    pub fn with_stats(corpus: Arc<Corpus>, stats: Arc<ExtractionStats>) -> Self {
        let cache = ObjectCache::new(corpus.config.cache_capacity);
        Self {
            corpus,
            cache,
            stats,
            warnings: Vec::new(),
            current_report: None,
            deadline: None,
        }
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    pub fn warnings(&self) -> &[ExtractWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<ExtractWarning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn stats(&self) -> &Arc<ExtractionStats> {
        &self.stats
    }

    fn record(&mut self, warning: ExtractWarning) {
        warn!(kind = %warning.kind, report = ?warning.report_id, "{}", warning.message);
        self.stats.inc_warnings();
        self.warnings.push(warning);
    }

    fn record_error(&mut self, err: &ExtractError) {
        let warning = ExtractWarning::from_error(err, self.current_report.as_deref());
        self.record(warning);
    }

    /// Turns recoverable failures into warnings; only a timeout escapes.
    fn recover<T>(&mut self, result: Result<T, ExtractError>) -> Result<Option<T>, ExtractError> {
        match result {
            Ok(v) => Ok(Some(v)),
            Err(e @ ExtractError::Timeout { .. }) => Err(e),
            Err(e) => {
                self.record_error(&e);
                Ok(None)
            }
        }
    }

    fn check_deadline(&self) -> Result<(), ExtractError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ExtractError::Timeout {
                report_id: self.current_report.clone().unwrap_or_default(),
            }),
            _ => Ok(()),
        }
    }

    fn lookup(&self, kind: IndexKind, reference: &ObjectRef) -> Lookup {
        let Some(resolver) = self.corpus.resolver(kind) else {
            return Lookup::IndexMissing;
        };
        match resolver.find_link(reference.id.as_deref(), Some(&reference.name)) {
            Some(entry) => Lookup::Found(entry.clone()),
            None => Lookup::NotFound,
        }
    }

    /// Resolves a reference, recording a warning when nothing matches.
    fn resolve(&mut self, kind: IndexKind, reference: &ObjectRef) -> Option<IndexEntry> {
        match self.lookup(kind, reference) {
            Lookup::Found(entry) => Some(entry),
            Lookup::NotFound => {
                self.record_error(&ExtractError::LinkResolution {
                    kind: kind.to_string(),
                    reference: describe(reference),
                });
                None
            }
            Lookup::IndexMissing => {
                self.record_error(&ExtractError::LinkResolution {
                    kind: kind.to_string(),
                    reference: format!("{} (no {} index)", describe(reference), kind),
                });
                None
            }
        }
    }

    /// Reads a detail file through the files namespace.
    fn load(&mut self, location: &str) -> Result<Arc<str>, ExtractError> {
        self.check_deadline()?;
        let path = self.corpus.config.base_path.join(location);
        if let Some(doc) = self.cache.files.get(&path) {
            return Ok(doc);
        }
        let (text, encoding) = read_document(&path, self.corpus.config.max_file_bytes)?;
        trace!(path = ?path, %encoding, "Decoded detail file");
        self.stats.inc_files();
        let doc: Arc<str> = Arc::from(text);
        self.cache.files.insert(path, Arc::clone(&doc));
        Ok(doc)
    }

    /// Loads the object's section of its detail file; `Ok(None)` when the file
    /// or section is unavailable (warning recorded).
    fn load_section(&mut self, entry: &IndexEntry) -> Result<Option<String>, ExtractError> {
        let loaded = self.load(&entry.location);
        let Some(doc) = self.recover(loaded)? else {
            return Ok(None);
        };
        match html::object_section(&doc, Some(&entry.id), &entry.name) {
            Some(section) => Ok(Some(section.to_string())),
            None => {
                self.record_error(&ExtractError::parsing(
                    entry.location.clone(),
                    format!("no section for {} ({})", entry.name, entry.id),
                ));
                Ok(None)
            }
        }
    }

    /// Extracts one report with all datasets in source order.
    ///
    /// Errors only when the report's own file cannot be read or the time
    /// budget runs out; everything below is recovered into warnings.
    pub fn extract_report(&mut self, entry: &IndexEntry) -> Result<Report, ExtractError> {
        self.current_report = Some(entry.id.clone());
        self.deadline = self
            .corpus
            .config
            .report_timeout
            .map(|budget| Instant::now() + budget);

        if let Some(report) = self.cache.reports.get(&entry.id) {
            return Ok(report);
        }

        info!(report = %entry.id, name = %entry.name, "Extracting report");
        let doc = self.load(&entry.location)?;
        let locale = self.corpus.config.locale;

        let refs = match html::object_section(&doc, Some(&entry.id), &entry.name) {
            Some(section) => parser::report_datasets(section, locale),
            None => {
                self.record_error(&ExtractError::parsing(
                    entry.location.clone(),
                    format!("no section for report {}", entry.name),
                ));
                Vec::new()
            }
        };
        debug!(report = %entry.id, datasets = refs.len(), "Dataset references found");

        let mut datasets = Vec::with_capacity(refs.len());
        for reference in &refs {
            datasets.push(self.extract_dataset(reference)?);
        }

        let report = Report {
            id: entry.id.clone(),
            name: entry.name.clone(),
            location: entry.location.clone(),
            datasets,
        };
        self.cache.reports.insert(entry.id.clone(), report.clone());
        Ok(report)
    }

    /// Searches the cube, report and shortcut indexes in three passes: id,
    /// exact name, then fuzzy name. Each pass covers every index before the
    /// next one starts.
    fn find_dataset(&self, reference: &ObjectRef) -> Option<(IndexEntry, DatasetKind)> {
        let resolvers: Vec<(LinkResolver<'_>, DatasetKind)> = DATASET_KINDS
            .iter()
            .filter_map(|&(index, kind)| self.corpus.resolver(index).map(|r| (r, kind)))
            .collect();
        let name = reference.name.as_str();

        reference
            .id
            .as_deref()
            .and_then(|id| {
                resolvers
                    .iter()
                    .find_map(|(r, kind)| r.find_by_id(id).map(|e| (e.clone(), *kind)))
            })
            .or_else(|| {
                resolvers
                    .iter()
                    .find_map(|(r, kind)| r.find_by_exact_name(name).map(|e| (e.clone(), *kind)))
            })
            .or_else(|| {
                resolvers
                    .iter()
                    .find_map(|(r, kind)| r.find_similar(name).map(|e| (e.clone(), *kind)))
            })
    }

    /// Resolves a dataset and its template. Unresolvable references are kept
    /// with `kind = None`.
    pub fn extract_dataset(&mut self, reference: &ObjectRef) -> Result<Dataset, ExtractError> {
        let report_id = self.current_report.clone();

        let Some((entry, mut kind)) = self.find_dataset(reference) else {
            self.record_error(&ExtractError::LinkResolution {
                kind: "dataset".into(),
                reference: describe(reference),
            });
            let id = reference
                .id
                .clone()
                .unwrap_or_else(|| format!("UNRESOLVED:{}", normalize(&reference.name)));
            return Ok(Dataset {
                id,
                name: reference.name.clone(),
                kind: None,
                location: None,
                chart_type: None,
                report_id,
                attributes: Vec::new(),
                metrics: Vec::new(),
                embedded_metrics: Vec::new(),
            });
        };

        if let Some(mut cached) = self.cache.datasets.get(&entry.id) {
            cached.report_id = report_id;
            return Ok(cached);
        }

        let mut dataset = Dataset {
            id: entry.id.clone(),
            name: entry.name.clone(),
            kind: Some(kind),
            location: Some(entry.location.clone()),
            chart_type: None,
            report_id: None,
            attributes: Vec::new(),
            metrics: Vec::new(),
            embedded_metrics: Vec::new(),
        };

        if kind != DatasetKind::Shortcut {
            if let Some(section) = self.load_section(&entry)? {
                let locale = self.corpus.config.locale;
                if parser::is_report_view(&section) {
                    kind = DatasetKind::Report;
                    dataset.kind = Some(kind);
                }
                if kind == DatasetKind::Report {
                    dataset.chart_type = parser::chart_type(&section, locale);
                }

                let template = parser::template_objects(&section, locale);
                debug!(
                    dataset = %entry.id,
                    rows = template.rows.len(),
                    columns = template.columns.len(),
                    "Template parsed"
                );

                for row in &template.rows {
                    if let Some(attribute) = self.extract_attribute(&entry.id, row)? {
                        dataset.attributes.push(attribute);
                    }
                }
                for column in &template.columns {
                    self.bind_metric(&mut dataset, column)?;
                }
            }
        }

        self.cache.datasets.insert(entry.id.clone(), dataset.clone());
        dataset.report_id = report_id;
        Ok(dataset)
    }

    /// Adds one column binding to the dataset: a resolved metric, or an
    /// embedded metric when the metric index does not list it.
    fn bind_metric(&mut self, dataset: &mut Dataset, column: &ObjectRef) -> Result<(), ExtractError> {
        match self.lookup(IndexKind::Metric, column) {
            Lookup::Found(entry) => {
                if let Some(metric) = self.metric_from_entry(&entry, &VisitedPath::new())? {
                    dataset.metrics.push(metric);
                }
            }
            Lookup::NotFound => {
                let warning = ExtractWarning {
                    kind: WarningKind::EmbeddedMetric,
                    report_id: self.current_report.clone(),
                    message: format!(
                        "metric {} on dataset {} is not in the metric index, kept as embedded",
                        describe(column),
                        dataset.id
                    ),
                };
                self.record(warning);
                dataset.embedded_metrics.push(EmbeddedMetric {
                    id: column.id.clone(),
                    name: column.name.clone(),
                });
            }
            Lookup::IndexMissing => {
                self.resolve(IndexKind::Metric, column);
            }
        }
        Ok(())
    }

    /// Cached per `(dataset, bound name)`; forms are shared per attribute id.
    pub fn extract_attribute(
        &mut self,
        dataset_id: &str,
        reference: &ObjectRef,
    ) -> Result<Option<Attribute>, ExtractError> {
        let key = (dataset_id.to_string(), reference.name.clone());
        if let Some(attribute) = self.cache.attributes.get(&key) {
            return Ok(Some(attribute));
        }

        let Some(entry) = self.resolve(IndexKind::Attribute, reference) else {
            return Ok(None);
        };

        let forms = match self.cache.forms.get(&entry.id) {
            Some(forms) => forms,
            None => {
                let forms = self.attribute_forms(&entry)?;
                self.cache.forms.insert(entry.id.clone(), forms.clone());
                forms
            }
        };

        let attribute = Attribute {
            id: entry.id.clone(),
            name: entry.name.clone(),
            name_on_dataset: reference.name.clone(),
            location: entry.location.clone(),
            forms,
        };
        self.cache.attributes.insert(key, attribute.clone());
        Ok(Some(attribute))
    }

    fn attribute_forms(&mut self, entry: &IndexEntry) -> Result<Vec<Form>, ExtractError> {
        let Some(section) = self.load_section(entry)? else {
            return Ok(Vec::new());
        };
        let raw = parser::attribute_forms(&section, self.corpus.config.locale);
        let mut forms = Vec::with_capacity(raw.len());
        for form in raw {
            let sources = self.resolve_expressions(&form.expressions);
            forms.push(Form {
                attribute_id: entry.id.clone(),
                name: form.name,
                sources,
            });
        }
        Ok(forms)
    }

    fn resolve_expressions(&mut self, expressions: &[RawExpression]) -> Vec<TableColumn> {
        let mut columns = Vec::new();
        for expression in expressions {
            for table_ref in &expression.tables {
                if let Some(table) = self.resolve_table(table_ref) {
                    columns.push(TableColumn {
                        table,
                        column_name: expression.column_name.clone(),
                    });
                }
            }
        }
        columns
    }

    pub fn resolve_table(&mut self, reference: &ObjectRef) -> Option<Table> {
        let entry = self.resolve(IndexKind::LogicalTable, reference)?;
        Some(self.cache.tables.get_or_compute(entry.id.clone(), || Table {
            id: entry.id.clone(),
            name: entry.name.clone(),
            location: entry.location.clone(),
        }))
    }

    /// Functions have no global id; an unindexed function keeps the name and
    /// file it was referenced with.
    fn resolve_function(&mut self, reference: &ObjectRef) -> Option<Function> {
        let function = match self.lookup(IndexKind::Function, reference) {
            Lookup::Found(entry) => Function {
                name: entry.name,
                location: entry.location,
            },
            Lookup::NotFound | Lookup::IndexMissing if !reference.name.is_empty() => {
                debug!(function = %reference.name, "Function not indexed, using reference");
                Function {
                    name: reference.name.clone(),
                    location: reference.file.clone(),
                }
            }
            _ => return None,
        };
        let key = (function.name.clone(), function.location.clone());
        Some(self.cache.functions.get_or_compute(key, || function))
    }

    fn resolve_fact(&mut self, reference: &ObjectRef) -> Result<Option<Fact>, ExtractError> {
        let Some(entry) = self.resolve(IndexKind::Fact, reference) else {
            return Ok(None);
        };
        if let Some(fact) = self.cache.facts.get(&entry.id) {
            return Ok(Some(fact));
        }

        let sources = match self.load_section(&entry)? {
            Some(section) => {
                let expressions = parser::fact_expressions(&section, self.corpus.config.locale);
                self.resolve_expressions(&expressions)
            }
            None => Vec::new(),
        };

        let fact = Fact {
            id: entry.id.clone(),
            name: entry.name.clone(),
            location: entry.location.clone(),
            sources,
        };
        self.cache.facts.insert(entry.id.clone(), fact.clone());
        Ok(Some(fact))
    }

    /// Resolves a metric reference against the metric index and expands it.
    pub fn extract_metric(
        &mut self,
        reference: &ObjectRef,
        visited: &VisitedPath,
    ) -> Result<Option<Metric>, ExtractError> {
        match self.resolve(IndexKind::Metric, reference) {
            Some(entry) => self.metric_from_entry(&entry, visited),
            None => Ok(None),
        }
    }

    fn metric_from_entry(
        &mut self,
        entry: &IndexEntry,
        visited: &VisitedPath,
    ) -> Result<Option<Metric>, ExtractError> {
        if let Some(metric) = self.cache.metrics.get(&entry.id) {
            return Ok(Some(metric));
        }

        if visited.contains(&entry.id) {
            let mut chain = visited.chain().to_vec();
            chain.push(entry.id.clone());
            self.stats.record_cycle(&chain);
            self.record_error(&ExtractError::CircularReference { chain });
            return Ok(None);
        }

        self.check_deadline()?;
        let path = visited.with(&entry.id);
        trace!(metric = %entry.id, depth = path.chain().len(), "Expanding metric");

        let definition = match self.load_section(entry)? {
            Some(section) => parser::metric_definition(&section, self.corpus.config.locale),
            None => Default::default(),
        };

        let body = match definition.effective_kind() {
            MetricKind::Simple => {
                let function = match &definition.function {
                    Some(r) => self.resolve_function(r),
                    None => None,
                };
                let fact = match &definition.fact {
                    Some(r) => self.resolve_fact(r)?,
                    None => None,
                };
                MetricBody::Simple { function, fact }
            }
            MetricKind::Composite => {
                let mut components = Vec::with_capacity(definition.children.len());
                for child in &definition.children {
                    if let Some(metric) = self.extract_metric(child, &path)? {
                        components.push(metric);
                    }
                }
                MetricBody::Composite { components }
            }
        };

        let metric = Metric {
            id: entry.id.clone(),
            name: entry.name.clone(),
            location: entry.location.clone(),
            formula: definition.formula,
            body,
        };
        self.cache.metrics.insert(entry.id.clone(), metric.clone());
        Ok(Some(metric))
    }
}

fn describe(reference: &ObjectRef) -> String {
    match &reference.id {
        Some(id) => format!("{} [{}]", reference.name, id),
        None => reference.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexTable;

    fn entry(id: &str, name: &str) -> IndexEntry {
        IndexEntry {
            id: id.into(),
            name: name.into(),
            location: format!("{}.html", id),
        }
    }

    fn corpus(documents: Vec<IndexEntry>) -> Corpus {
        let mut indexes = IndexSet::default();
        indexes.insert(IndexKind::Document, documents.into_iter().collect::<IndexTable>());
        Corpus::from_parts(ExtractorConfig::new("/nonexistent"), indexes)
    }

    #[test]
    fn visited_path_copies_on_branch() {
        let root = VisitedPath::new().with("A");
        let left = root.with("B");
        let right = root.with("C");
        assert!(left.contains("A") && left.contains("B"));
        assert!(!right.contains("B"));
        assert_eq!(root.chain(), ["A".to_string()]);
    }

    #[test]
    fn select_by_filter_and_id() {
        let c = corpus(vec![
            entry("01", "Vendas Mensais"),
            entry("02", "Estoque"),
            entry("03", "Vendas Anuais"),
        ]);
        let ids: Vec<_> = c
            .select_reports(&ReportSelection::Filter("VENDAS".into()))
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["01", "03"]);
        assert_eq!(c.select_reports(&ReportSelection::Id("02".into())).len(), 1);
        assert!(c.select_reports(&ReportSelection::Id("FF".into())).is_empty());
        assert_eq!(c.select_reports(&ReportSelection::All).len(), 3);
    }

    #[test]
    fn select_by_name_prefers_exact() {
        let c = corpus(vec![entry("01", "Sales"), entry("02", "Sales Detail")]);
        let by_name = c.select_reports(&ReportSelection::Name("Sales".into()));
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "01");
        let fuzzy = c.select_reports(&ReportSelection::Name("sales detal".into()));
        assert_eq!(fuzzy[0].id, "02");
    }

    #[test]
    fn select_by_name_returns_every_normalized_match() {
        let c = corpus(vec![
            entry("01", "Sales"),
            entry("02", "SALES"),
            entry("03", "Sales Detail"),
        ]);
        let ids: Vec<_> = c
            .select_reports(&ReportSelection::Name("sales".into()))
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["01", "02"]);
    }

    fn dataset_corpus() -> Arc<Corpus> {
        let mut indexes = IndexSet::default();
        indexes.insert(IndexKind::Document, IndexTable::default());
        indexes.insert(
            IndexKind::Cube,
            vec![entry("D1", "Sales Cube")].into_iter().collect::<IndexTable>(),
        );
        indexes.insert(
            IndexKind::Report,
            vec![entry("BB1", "Sales")].into_iter().collect::<IndexTable>(),
        );
        Arc::new(Corpus::from_parts(ExtractorConfig::new("/nonexistent"), indexes))
    }

    #[test]
    fn dataset_id_in_later_index_beats_fuzzy_name_in_earlier_one() {
        let mut ex = Extractor::new(dataset_corpus());
        let reference = ObjectRef {
            id: Some("BB1".into()),
            name: "Sales".into(),
            file: "BB1.html".into(),
        };
        let ds = ex.extract_dataset(&reference).unwrap();
        assert_eq!(ds.id, "BB1");
        assert_eq!(ds.kind, Some(DatasetKind::Report));
    }

    #[test]
    fn dataset_exact_name_beats_fuzzy_name_across_indexes() {
        let mut ex = Extractor::new(dataset_corpus());
        let ds = ex.extract_dataset(&ObjectRef::named("sales")).unwrap();
        assert_eq!(ds.id, "BB1");
        assert_eq!(ds.kind, Some(DatasetKind::Report));

        let fuzzy = ex.extract_dataset(&ObjectRef::named("Sales Cub")).unwrap();
        assert_eq!(fuzzy.id, "D1");
        assert_eq!(fuzzy.kind, Some(DatasetKind::Cube));
    }

    #[test]
    fn unresolved_dataset_is_kept() {
        let c = Arc::new(corpus(vec![]));
        let mut ex = Extractor::new(c);
        let ds = ex.extract_dataset(&ObjectRef::named("Ghost Cube")).unwrap();
        assert_eq!(ds.kind, None);
        assert_eq!(ds.id, "UNRESOLVED:ghost cube");
        assert_eq!(ex.warnings().len(), 1);
        assert_eq!(ex.warnings()[0].kind, WarningKind::LinkResolution);
    }

    #[test]
    fn missing_report_file_fails_the_report() {
        let c = Arc::new(corpus(vec![entry("01", "Sales")]));
        let mut ex = Extractor::new(Arc::clone(&c));
        let err = ex.extract_report(&c.reports()[0]).unwrap_err();
        assert!(matches!(err, ExtractError::MissingFile { .. }));
    }

    #[test]
    fn expired_deadline_times_out() {
        let mut config = ExtractorConfig::new("/nonexistent");
        config.report_timeout = Some(std::time::Duration::ZERO);
        let mut indexes = IndexSet::default();
        indexes.insert(
            IndexKind::Document,
            vec![entry("01", "Sales")].into_iter().collect::<IndexTable>(),
        );
        let c = Arc::new(Corpus::from_parts(config, indexes));
        let mut ex = Extractor::new(Arc::clone(&c));
        let err = ex.extract_report(&c.reports()[0]).unwrap_err();
        assert!(matches!(err, ExtractError::Timeout { .. }));
    }
}
