use std::path::PathBuf;
use std::time::Duration;

/// Maximum entries kept per cache namespace before LRU eviction kicks in
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Minimum similarity score for a fuzzy name match to be accepted
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.80;

/// Bonus added to a containment score when the candidate starts with the query
pub const PREFIX_BONUS: f64 = 0.5;

/// Detail/index files larger than this are rejected instead of decoded
pub const MAX_FILE_BYTES: u64 = 64 * 1024 * 1024;

/// Default per-report time budget
pub const DEFAULT_REPORT_TIMEOUT_SECS: u64 = 300;

/// Bump when the serialized `IndexSet` layout changes
pub const SNAPSHOT_VERSION: u32 = 1;

/// Progress update interval (tick every N reports)
pub const PROGRESS_INTERVAL: u64 = 10;

/// Names and markers of one language variant of the documentation export.
#[derive(Debug)]
pub struct Locale {
    pub code: &'static str,
    pub files: IndexFiles,
    pub headers: SectionHeaders,
    pub labels: TableLabels,
}

#[derive(Debug)]
pub struct IndexFiles {
    pub document: &'static str,
    pub report: &'static str,
    pub cube: &'static str,
    pub shortcut: &'static str,
    pub metric: &'static str,
    pub fact: &'static str,
    pub function: &'static str,
    pub attribute: &'static str,
    pub table: &'static str,
}

#[derive(Debug)]
pub struct SectionHeaders {
    pub document_definition: &'static str,
    pub template_objects: &'static str,
    pub definition: &'static str,
    pub expressions: &'static str,
    pub form_details: &'static str,
    pub chart_options: &'static str,
}

#[derive(Debug)]
pub struct TableLabels {
    pub expression: &'static str,
    pub source_tables: &'static str,
    pub report_objects: &'static str,
    pub rows: &'static str,
    pub columns: &'static str,
    pub metric_type: &'static str,
    pub formula: &'static str,
    pub chart_type: &'static str,
    pub datasets: &'static str,
}

pub static EN_US: Locale = Locale {
    code: "en-us",
    files: IndexFiles {
        document: "Document.html",
        report: "Report.html",
        cube: "IntelligentCube.html",
        shortcut: "Shortcut.html",
        metric: "Metric.html",
        fact: "Fact.html",
        function: "Function.html",
        attribute: "Attribute.html",
        table: "LogicalTable.html",
    },
    headers: SectionHeaders {
        document_definition: "DOCUMENT DEFINITION",
        template_objects: "TEMPLATE OBJECTS",
        definition: "DEFINITION",
        expressions: "EXPRESSIONS",
        form_details: "ATTRIBUTE FORM DETAILS",
        chart_options: "CHART OPTIONS",
    },
    labels: TableLabels {
        expression: "EXPRESSION",
        source_tables: "SOURCE TABLES",
        report_objects: "REPORT OBJECTS",
        rows: "ROWS",
        columns: "COLUMNS",
        metric_type: "Metric Type",
        formula: "Formula",
        chart_type: "Chart Type",
        datasets: "Datasets:",
    },
};

pub static PT_BR: Locale = Locale {
    code: "pt-br",
    files: IndexFiles {
        document: "Documento.html",
        report: "Relatório.html",
        cube: "CuboInteligente.html",
        shortcut: "Atalho.html",
        metric: "Métrica.html",
        fact: "Fato.html",
        function: "Função.html",
        attribute: "Atributo.html",
        table: "TabelaLógica.html",
    },
    headers: SectionHeaders {
        document_definition: "DOCUMENT DEFINITION",
        template_objects: "OBJETOS DE TEMPLATE",
        definition: "DEFINIÇÃO",
        expressions: "EXPRESSÕES",
        form_details: "DETALHES DOS FORMULÁRIOS DE ATRIBUTO",
        chart_options: "OPÇÕES DO GRÁFICO",
    },
    labels: TableLabels {
        expression: "EXPRESSÃO",
        source_tables: "TABELAS FONTE",
        report_objects: "OBJETOS DO RELATÓRIO",
        rows: "LINHAS",
        columns: "COLUNAS",
        metric_type: "Tipo de métrica",
        formula: "Fórmula",
        chart_type: "Tipo de gráfico",
        datasets: "Datasets:",
    },
};

impl Locale {
    pub fn from_code(code: &str) -> Option<&'static Locale> {
        match code.to_ascii_lowercase().as_str() {
            "en-us" | "en" => Some(&EN_US),
            "pt-br" | "pt" => Some(&PT_BR),
            _ => None,
        }
    }
}

/// Runtime settings for one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub base_path: PathBuf,
    pub locale: &'static Locale,
    pub cache_capacity: usize,
    pub workers: usize,
    pub report_timeout: Option<Duration>,
    pub fuzzy_threshold: f64,
    pub max_file_bytes: u64,
}

impl ExtractorConfig {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            locale: &EN_US,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            workers: default_workers(),
            report_timeout: Some(Duration::from_secs(DEFAULT_REPORT_TIMEOUT_SECS)),
            fuzzy_threshold: FUZZY_MATCH_THRESHOLD,
            max_file_bytes: MAX_FILE_BYTES,
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_lookup_is_case_insensitive() {
        assert_eq!(Locale::from_code("EN-US").map(|l| l.code), Some("en-us"));
        assert_eq!(Locale::from_code("pt").map(|l| l.code), Some("pt-br"));
        assert!(Locale::from_code("fr-fr").is_none());
    }

    #[test]
    fn config_defaults() {
        let config = ExtractorConfig::new("/corpus");
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.locale.files.document, "Document.html");
        assert!(config.workers >= 1);
    }
}
