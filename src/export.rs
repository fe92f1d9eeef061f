use crate::coordinator::RunOutcome;
use crate::models::{Attribute, Dataset, Fact, Metric, Report, TableColumn};
use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const CSV_BUFFER_SIZE: usize = 128 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub start: String,
    pub end: String,
    pub rel: &'static str,
    pub column_name: Option<String>,
}

/// The entity graph flattened into deduplicated nodes and edges.
#[derive(Debug, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    seen_nodes: FxHashSet<String>,
    seen_edges: FxHashSet<Edge>,
}

impl Graph {
    pub fn from_reports(reports: &[Report]) -> Self {
        let mut graph = Self::default();
        for report in reports {
            graph.add_report(report);
        }
        graph
    }

    /// Returns true the first time an id is added.
    fn node(&mut self, id: &str, name: &str, label: &'static str) -> bool {
        if !self.seen_nodes.insert(id.to_string()) {
            return false;
        }
        self.nodes.push(Node {
            id: id.to_string(),
            name: name.to_string(),
            label,
        });
        true
    }

    fn edge(&mut self, start: &str, end: &str, rel: &'static str, column_name: Option<&str>) {
        let edge = Edge {
            start: start.to_string(),
            end: end.to_string(),
            rel,
            column_name: column_name.map(str::to_string),
        };
        if self.seen_edges.insert(edge.clone()) {
            self.edges.push(edge);
        }
    }

    fn add_report(&mut self, report: &Report) {
        self.node(&report.id, &report.name, "Report");
        for dataset in &report.datasets {
            self.edge(&report.id, &dataset.id, "HAS_DATASET", None);
            self.add_dataset(dataset);
        }
    }

    fn add_dataset(&mut self, dataset: &Dataset) {
        if !self.node(&dataset.id, &dataset.name, "Dataset") {
            return;
        }
        for attribute in &dataset.attributes {
            self.edge(&dataset.id, &attribute.id, "HAS_ATTRIBUTE", None);
            self.add_attribute(attribute);
        }
        for metric in &dataset.metrics {
            self.edge(&dataset.id, &metric.id, "HAS_METRIC", None);
            self.add_metric(metric);
        }
        for embedded in &dataset.embedded_metrics {
            let id = embedded
                .id
                .clone()
                .unwrap_or_else(|| format!("EMBEDDED:{}:{}", dataset.id, embedded.name));
            self.node(&id, &embedded.name, "EmbeddedMetric");
            self.edge(&dataset.id, &id, "HAS_METRIC", None);
        }
    }

    fn add_attribute(&mut self, attribute: &Attribute) {
        if !self.node(&attribute.id, &attribute.name, "Attribute") {
            return;
        }
        for form in &attribute.forms {
            let key = form.key();
            self.node(&key, &form.name, "Form");
            self.edge(&attribute.id, &key, "HAS_FORM", None);
            self.add_sources(&key, &form.sources);
        }
    }

    fn add_metric(&mut self, metric: &Metric) {
        if !self.node(&metric.id, &metric.name, "Metric") {
            return;
        }
        if let Some(function) = metric.function() {
            let key = function.key();
            self.node(&key, &function.name, "Function");
            self.edge(&metric.id, &key, "USES_FUNCTION", None);
        }
        if let Some(fact) = metric.fact() {
            self.edge(&metric.id, &fact.id, "USES_FACT", None);
            self.add_fact(fact);
        }
        for child in metric.components() {
            self.edge(&metric.id, &child.id, "COMPOSED_OF", None);
            self.add_metric(child);
        }
    }

    fn add_fact(&mut self, fact: &Fact) {
        if self.node(&fact.id, &fact.name, "Fact") {
            self.add_sources(&fact.id, &fact.sources);
        }
    }

    fn add_sources(&mut self, start: &str, sources: &[TableColumn]) {
        for source in sources {
            self.node(&source.table.id, &source.table.name, "Table");
            self.edge(
                start,
                &source.table.id,
                "READS_FROM",
                source.column_name.as_deref(),
            );
        }
    }
}

/// Writes `nodes.csv` and `edges.csv` in neo4j-admin import format.
pub fn write_csv(reports: &[Report], output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
    let graph = Graph::from_reports(reports);

    let nodes_path = output_dir.join("nodes.csv");
    let mut nodes = csv::WriterBuilder::new()
        .buffer_capacity(CSV_BUFFER_SIZE)
        .from_path(&nodes_path)
        .with_context(|| format!("Failed to create {:?}", nodes_path))?;
    nodes.write_record(["id:ID", "name", ":LABEL"])?;
    for node in &graph.nodes {
        nodes.write_record([node.id.as_str(), node.name.as_str(), node.label])?;
    }
    nodes.flush()?;

    let edges_path = output_dir.join("edges.csv");
    let mut edges = csv::WriterBuilder::new()
        .buffer_capacity(CSV_BUFFER_SIZE)
        .from_path(&edges_path)
        .with_context(|| format!("Failed to create {:?}", edges_path))?;
    edges.write_record([":START_ID", ":END_ID", ":TYPE", "column_name"])?;
    for edge in &graph.edges {
        edges.write_record([
            edge.start.as_str(),
            edge.end.as_str(),
            edge.rel,
            edge.column_name.as_deref().unwrap_or(""),
        ])?;
    }
    edges.flush()?;

    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        dir = ?output_dir,
        "CSV export written"
    );
    Ok(())
}

pub fn write_json(outcome: &RunOutcome, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, outcome).context("Failed to serialize run outcome")?;
    writer.flush().context("Failed to flush JSON export")?;
    info!(path = ?path, reports = outcome.reports.len(), "JSON export written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatasetKind, EmbeddedMetric, Form, Function, MetricBody, Table};
    use tempfile::TempDir;

    fn table(id: &str) -> Table {
        Table {
            id: id.into(),
            name: format!("TBL_{id}"),
            location: "t.html".into(),
        }
    }

    fn simple_metric(id: &str, fact_id: &str) -> Metric {
        Metric {
            id: id.into(),
            name: id.into(),
            location: "m.html".into(),
            formula: None,
            body: MetricBody::Simple {
                function: Some(Function {
                    name: "Sum".into(),
                    location: "f.html".into(),
                }),
                fact: Some(Fact {
                    id: fact_id.into(),
                    name: fact_id.into(),
                    location: "fa.html".into(),
                    sources: vec![TableColumn {
                        table: table("T1"),
                        column_name: Some("AMT".into()),
                    }],
                }),
            },
        }
    }

    fn sample_reports() -> Vec<Report> {
        let dataset = Dataset {
            id: "D1".into(),
            name: "Cube".into(),
            kind: Some(DatasetKind::Cube),
            location: Some("d.html".into()),
            chart_type: None,
            report_id: None,
            attributes: vec![Attribute {
                id: "A1".into(),
                name: "Region".into(),
                name_on_dataset: "Region".into(),
                location: "a.html".into(),
                forms: vec![Form {
                    attribute_id: "A1".into(),
                    name: "ID".into(),
                    sources: vec![TableColumn {
                        table: table("T1"),
                        column_name: Some("REGION_ID".into()),
                    }],
                }],
            }],
            metrics: vec![simple_metric("M1", "F1"), simple_metric("M2", "F1")],
            embedded_metrics: vec![EmbeddedMetric {
                id: None,
                name: "Derived".into(),
            }],
        };
        vec![
            Report {
                id: "R1".into(),
                name: "One".into(),
                location: "r.html".into(),
                datasets: vec![dataset.clone()],
            },
            Report {
                id: "R2".into(),
                name: "Two".into(),
                location: "r.html".into(),
                datasets: vec![dataset],
            },
        ]
    }

    #[test]
    fn graph_dedups_shared_objects() {
        let graph = Graph::from_reports(&sample_reports());
        let count = |label: &str| graph.nodes.iter().filter(|n| n.label == label).count();
        assert_eq!(count("Report"), 2);
        assert_eq!(count("Dataset"), 1);
        assert_eq!(count("Metric"), 2);
        assert_eq!(count("Fact"), 1);
        assert_eq!(count("Table"), 1);
        assert_eq!(count("Function"), 1);
        assert_eq!(count("EmbeddedMetric"), 1);

        let has = |rel: &str| graph.edges.iter().filter(|e| e.rel == rel).count();
        assert_eq!(has("HAS_DATASET"), 2);
        assert_eq!(has("HAS_METRIC"), 3);
        assert_eq!(has("USES_FACT"), 2);
        // form and fact both read T1, with different columns
        assert_eq!(has("READS_FROM"), 2);
    }

    #[test]
    fn csv_files_have_neo4j_headers() {
        let dir = TempDir::new().unwrap();
        write_csv(&sample_reports(), dir.path()).unwrap();

        let nodes = fs::read_to_string(dir.path().join("nodes.csv")).unwrap();
        assert!(nodes.starts_with("id:ID,name,:LABEL\n"));
        assert!(nodes.contains("A1:ID,ID,Form"));

        let edges = fs::read_to_string(dir.path().join("edges.csv")).unwrap();
        assert!(edges.starts_with(":START_ID,:END_ID,:TYPE,column_name\n"));
        assert!(edges.contains("F1,T1,READS_FROM,AMT"));
        assert!(edges.contains("R1,D1,HAS_DATASET,\n"));
    }

    #[test]
    fn json_export_contains_reports_and_stats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("run.json");
        let outcome = RunOutcome {
            reports: sample_reports(),
            ..Default::default()
        };
        write_json(&outcome, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["reports"].as_array().unwrap().len(), 2);
        assert_eq!(value["reports"][0]["datasets"][0]["metrics"][0]["kind"], "simple");
        assert!(value["stats"]["reports_extracted"].is_number());
    }
}
