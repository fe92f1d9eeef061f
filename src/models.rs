use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub name: String,
    pub location: String,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Cube,
    Report,
    Shortcut,
}

/// A dataset as bound to one report. `kind` is `None` when no dataset index
/// knows the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub kind: Option<DatasetKind>,
    pub location: Option<String>,
    pub chart_type: Option<String>,
    pub report_id: Option<String>,
    pub attributes: Vec<Attribute>,
    pub metrics: Vec<Metric>,
    /// Metric bindings that no metric index lists
    pub embedded_metrics: Vec<EmbeddedMetric>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedMetric {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    /// Canonical name from the attribute index
    pub name: String,
    /// Name as displayed on the dataset template
    pub name_on_dataset: String,
    pub location: String,
    pub forms: Vec<Form>,
}

/// Identified by `(attribute_id, name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub attribute_id: String,
    pub name: String,
    pub sources: Vec<TableColumn>,
}

impl Form {
    /// Stable synthetic id for graph exports.
    pub fn key(&self) -> String {
        format!("{}:{}", self.attribute_id, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    pub name: String,
    pub location: String,
    pub formula: Option<String>,
    #[serde(flatten)]
    pub body: MetricBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricBody {
    Simple {
        function: Option<Function>,
        fact: Option<Fact>,
    },
    Composite {
        components: Vec<Metric>,
    },
}

impl Metric {
    pub fn is_composite(&self) -> bool {
        matches!(self.body, MetricBody::Composite { .. })
    }

    pub fn components(&self) -> &[Metric] {
        match &self.body {
            MetricBody::Composite { components } => components,
            MetricBody::Simple { .. } => &[],
        }
    }

    pub fn function(&self) -> Option<&Function> {
        match &self.body {
            MetricBody::Simple { function, .. } => function.as_ref(),
            MetricBody::Composite { .. } => None,
        }
    }

    pub fn fact(&self) -> Option<&Fact> {
        match &self.body {
            MetricBody::Simple { fact, .. } => fact.as_ref(),
            MetricBody::Composite { .. } => None,
        }
    }
}

/// Identified by `(name, location)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub location: String,
}

impl Function {
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.location)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub name: String,
    pub location: String,
    pub sources: Vec<TableColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub name: String,
    pub location: String,
}

/// A table reached through an expression; the column belongs to the edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableColumn {
    pub table: Table,
    pub column_name: Option<String>,
}
