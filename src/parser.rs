//! Section parsers for detail documents.
//!
//! Each function takes the HTML of one object section and returns the raw
//! references found there, in source order. Nothing here touches an index or
//! the filesystem; resolution happens in [`crate::extract`].

use crate::config::Locale;
use crate::html::{self, Link, Token};
use crate::text::normalize;
use rustc_hash::FxHashSet;

/// A reference to another object as written in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub id: Option<String>,
    pub name: String,
    /// File part of the href, empty for name-only references
    pub file: String,
}

impl From<Link> for ObjectRef {
    fn from(link: Link) -> Self {
        Self {
            id: link.id,
            name: link.text,
            file: link.file,
        }
    }
}

impl ObjectRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            file: String::new(),
        }
    }
}

/// Row and column bindings of a dataset template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub rows: Vec<ObjectRef>,
    pub columns: Vec<ObjectRef>,
}

/// One row of an expression table: the expression text and the tables it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExpression {
    pub column_name: Option<String>,
    pub tables: Vec<ObjectRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawForm {
    pub name: String,
    pub expressions: Vec<RawExpression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Simple,
    Composite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricDefinition {
    pub kind: Option<MetricKind>,
    pub formula: Option<String>,
    pub function: Option<ObjectRef>,
    pub fact: Option<ObjectRef>,
    pub children: Vec<ObjectRef>,
}

impl MetricDefinition {
    /// Declared kind, or composite iff the formula references other metrics.
    pub fn effective_kind(&self) -> MetricKind {
        match self.kind {
            Some(kind) => kind,
            None if !self.children.is_empty() => MetricKind::Composite,
            None => MetricKind::Simple,
        }
    }
}

/// Body of the named section, or the whole object when the header is absent.
fn section_or_all<'a>(object: &'a str, title: &str) -> &'a str {
    html::section(object, title).unwrap_or(object)
}

fn dedup_refs(refs: Vec<ObjectRef>) -> Vec<ObjectRef> {
    let mut seen = FxHashSet::default();
    refs.into_iter()
        .filter(|r| {
            let key = match &r.id {
                Some(id) => id.clone(),
                None => format!("name:{}", normalize(&r.name)),
            };
            seen.insert(key)
        })
        .collect()
}

/// Dataset references of a report, from its document definition.
pub fn report_datasets(object: &str, locale: &Locale) -> Vec<ObjectRef> {
    let definition = section_or_all(object, locale.headers.document_definition);

    let linked: Vec<ObjectRef> = html::id_links(definition)
        .into_iter()
        .map(ObjectRef::from)
        .collect();
    if !linked.is_empty() {
        return linked;
    }

    let label = normalize(locale.labels.datasets);
    html::label_rows(definition)
        .into_iter()
        .find(|(l, _)| normalize(l) == label)
        .map(|(_, value)| {
            html::strip_tags(value)
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ObjectRef::named)
                .collect()
        })
        .unwrap_or_default()
}

/// Attribute (row) and metric (column) bindings of a dataset.
///
/// Report-format datasets mark the cells with `[ROWS]` / `[COLUMNS]`
/// comments; cubes use a template-objects table.
pub fn template_objects(object: &str, locale: &Locale) -> Template {
    let rows = html::marker_cell(object, "ROWS");
    let columns = html::marker_cell(object, "COLUMNS");
    if rows.is_some() || columns.is_some() {
        return Template {
            rows: dedup_refs(cell_refs(rows)),
            columns: dedup_refs(cell_refs(columns)),
        };
    }

    let Some(body) = html::section(object, locale.headers.template_objects) else {
        return Template::default();
    };

    for table in html::leaf_tables(body) {
        let rows = html::rows(table);
        // header row: REPORT OBJECTS | ROWS | COLUMNS
        let header = rows.iter().enumerate().find_map(|(pos, r)| {
            html::column_index(r, locale.labels.report_objects)?;
            let row_col = html::column_index(r, locale.labels.rows)?;
            let col_col = html::column_index(r, locale.labels.columns)?;
            Some((pos, row_col, col_col))
        });
        let Some((header_pos, row_col, col_col)) = header else {
            continue;
        };
        let Some(data) = rows.get(header_pos + 1) else {
            return Template::default();
        };
        return Template {
            rows: dedup_refs(cell_refs(data.get(row_col).copied())),
            columns: dedup_refs(cell_refs(data.get(col_col).copied())),
        };
    }

    Template::default()
}

fn cell_refs(cell: Option<&str>) -> Vec<ObjectRef> {
    cell.map(|c| html::links(c).into_iter().map(ObjectRef::from).collect())
        .unwrap_or_default()
}

/// Whether a dataset section carries the report-view icon.
pub fn is_report_view(object: &str) -> bool {
    html::tokens(object).iter().any(|t| match t {
        Token::Image(src) => src.to_ascii_lowercase().contains("viewreport"),
        Token::Link(_) => false,
    })
}

pub fn chart_type(object: &str, locale: &Locale) -> Option<String> {
    let body = html::section(object, locale.headers.chart_options)?;
    let label = normalize(locale.labels.chart_type);
    html::label_rows(body)
        .into_iter()
        .find(|(l, _)| normalize(l).contains(&label))
        .map(|(_, value)| html::strip_tags(value))
        .filter(|v| !v.is_empty())
}

/// Rows of the first table that has both an expression and a source-tables column.
pub fn expression_rows(body: &str, locale: &Locale) -> Option<Vec<RawExpression>> {
    html::leaf_tables(body).into_iter().find_map(|table| {
        let rows = html::rows(table);
        let (header_pos, expr_col, src_col) = rows.iter().enumerate().find_map(|(i, r)| {
            let expr = html::column_index(r, locale.labels.expression)?;
            let src = html::column_index(r, locale.labels.source_tables)?;
            Some((i, expr, src))
        })?;
        let expressions = rows[header_pos + 1..]
            .iter()
            .filter_map(|cells| {
                let expression = html::strip_tags(cells.get(expr_col)?);
                let tables: Vec<ObjectRef> = cells
                    .get(src_col)
                    .map(|c| html::id_links(c).into_iter().map(ObjectRef::from).collect())
                    .unwrap_or_default();
                if expression.is_empty() && tables.is_empty() {
                    return None;
                }
                Some(RawExpression {
                    column_name: (!expression.is_empty()).then_some(expression),
                    tables,
                })
            })
            .collect();
        Some(expressions)
    })
}

/// Forms of an attribute. Each form starts at an anchor whose name contains `_`.
pub fn attribute_forms(object: &str, locale: &Locale) -> Vec<RawForm> {
    let body = section_or_all(object, locale.headers.form_details);

    let starts: Vec<usize> = html::anchor_names(body)
        .into_iter()
        .filter(|(_, name)| name.contains('_'))
        .map(|(pos, _)| pos)
        .collect();

    let segments: Vec<&str> = if starts.is_empty() {
        vec![body]
    } else {
        starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts.get(i + 1).copied().unwrap_or(body.len());
                &body[start..end]
            })
            .collect()
    };

    segments
        .into_iter()
        .filter_map(|segment| {
            let expressions = expression_rows(segment, locale)?;
            let name = form_name(segment)?;
            Some(RawForm { name, expressions })
        })
        .collect()
}

fn form_name(segment: &str) -> Option<String> {
    let first = html::leaf_tables(segment).into_iter().next()?;
    html::bold_text(first).or_else(|| {
        html::rows(first)
            .first()
            .and_then(|cells| cells.first())
            .map(|c| html::strip_tags(c))
            .filter(|t| !t.is_empty())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IconKind {
    Metric,
    Function,
    Fact,
}

fn icon_kind(src: &str) -> Option<IconKind> {
    let src = normalize(src);
    if src.contains("metric") {
        Some(IconKind::Metric)
    } else if src.contains("function") || src.contains("funcao") {
        Some(IconKind::Function)
    } else if src.contains("fact") || src.contains("fato") {
        Some(IconKind::Fact)
    } else {
        None
    }
}

pub fn metric_definition(object: &str, locale: &Locale) -> MetricDefinition {
    let body = section_or_all(object, locale.headers.definition);
    let labels = html::label_rows(body);
    let type_label = normalize(locale.labels.metric_type);
    let formula_label = normalize(locale.labels.formula);

    let kind = labels
        .iter()
        .find(|(l, _)| normalize(l) == type_label)
        .map(|(_, value)| {
            let value = normalize(&html::strip_tags(value));
            if value.starts_with("compos") || value.contains("compound") {
                MetricKind::Composite
            } else {
                MetricKind::Simple
            }
        });

    let mut definition = MetricDefinition {
        kind,
        ..Default::default()
    };

    let Some((_, cell)) = labels.iter().find(|(l, _)| normalize(l) == formula_label) else {
        return definition;
    };
    let formula = html::strip_tags(cell);
    definition.formula = (!formula.is_empty()).then_some(formula);

    let tokens = html::tokens(cell);

    if !tokens.iter().any(|t| matches!(t, Token::Image(_))) {
        let mut links = tokens.into_iter().filter_map(|t| match t {
            Token::Link(l) => Some(ObjectRef::from(l)),
            Token::Image(_) => None,
        });
        if kind == Some(MetricKind::Composite) {
            definition.children = dedup_refs(links.collect());
        } else {
            definition.function = links.next();
            definition.fact = links.next();
        }
        return definition;
    }

    let mut pending = None;
    let mut children = Vec::new();
    for token in tokens {
        match token {
            Token::Image(src) => pending = icon_kind(&src),
            Token::Link(link) => {
                match pending.take() {
                    Some(IconKind::Metric) => children.push(ObjectRef::from(link)),
                    Some(IconKind::Function) if definition.function.is_none() => {
                        definition.function = Some(link.into())
                    }
                    Some(IconKind::Fact) if definition.fact.is_none() => {
                        definition.fact = Some(link.into())
                    }
                    _ => {}
                }
            }
        }
    }
    definition.children = dedup_refs(children);
    definition
}

/// Source tables of a fact. Duplicate tables keep their first expression.
pub fn fact_expressions(object: &str, locale: &Locale) -> Vec<RawExpression> {
    let body = section_or_all(object, locale.headers.expressions);
    let mut seen = FxHashSet::default();
    expression_rows(body, locale)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|mut expr| {
            expr.tables
                .retain(|t| seen.insert(t.id.clone().unwrap_or_else(|| normalize(&t.name))));
            (!expr.tables.is_empty()).then_some(expr)
        })
        .collect()
}
