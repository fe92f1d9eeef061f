use crate::config::Locale;
use crate::error::ExtractError;
use crate::html;
use crate::text::{normalize, read_document};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// The entity type an index file lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexKind {
    Document,
    Report,
    Cube,
    Shortcut,
    Metric,
    Fact,
    Function,
    Attribute,
    LogicalTable,
}

impl IndexKind {
    pub const ALL: [IndexKind; 9] = [
        IndexKind::Document,
        IndexKind::Report,
        IndexKind::Cube,
        IndexKind::Shortcut,
        IndexKind::Metric,
        IndexKind::Fact,
        IndexKind::Function,
        IndexKind::Attribute,
        IndexKind::LogicalTable,
    ];

    pub fn file_name(self, locale: &Locale) -> &'static str {
        let files = &locale.files;
        match self {
            IndexKind::Document => files.document,
            IndexKind::Report => files.report,
            IndexKind::Cube => files.cube,
            IndexKind::Shortcut => files.shortcut,
            IndexKind::Metric => files.metric,
            IndexKind::Fact => files.fact,
            IndexKind::Function => files.function,
            IndexKind::Attribute => files.attribute,
            IndexKind::LogicalTable => files.table,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexKind::Document => "document",
            IndexKind::Report => "report",
            IndexKind::Cube => "cube",
            IndexKind::Shortcut => "shortcut",
            IndexKind::Metric => "metric",
            IndexKind::Fact => "fact",
            IndexKind::Function => "function",
            IndexKind::Attribute => "attribute",
            IndexKind::LogicalTable => "table",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub name: String,
    /// Detail file holding the object's sections
    pub location: String,
}

/// Every object of one type: id lookup, normalized-name lookup and source order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexTable {
    entries: Vec<IndexEntry>,
    by_id: FxHashMap<String, usize>,
    by_normalized_name: FxHashMap<String, usize>,
    malformed: usize,
    name_collisions: usize,
}

impl IndexTable {
    pub fn parse_file(path: &Path, max_bytes: u64) -> Result<Self, ExtractError> {
        let (text, encoding) = read_document(path, max_bytes)?;
        debug!(path = ?path, %encoding, "Decoded index file");
        Ok(Self::parse_html(&text))
    }

    pub fn parse_html(html: &str) -> Self {
        let mut table = Self::default();

        for link in html::links(html) {
            if html::has_malformed_id(&link.href) {
                warn!(href = %link.href, "Skipping index anchor with malformed id");
                table.malformed += 1;
                continue;
            }
            let Some(id) = link.id else { continue };
            if link.text.is_empty() {
                warn!(id = %id, "Skipping index anchor without a name");
                table.malformed += 1;
                continue;
            }
            table.push(IndexEntry {
                id,
                name: link.text,
                location: link.file,
            });
        }

        table
    }

    /// Adds an entry; the first occurrence of an id or normalized name wins.
    pub fn push(&mut self, entry: IndexEntry) {
        if self.by_id.contains_key(&entry.id) {
            debug!(id = %entry.id, "Duplicate id in index, keeping first");
            return;
        }
        let pos = self.entries.len();
        self.by_id.insert(entry.id.clone(), pos);
        let key = normalize(&entry.name);
        if self.by_normalized_name.contains_key(&key) {
            self.name_collisions += 1;
        } else {
            self.by_normalized_name.insert(key, pos);
        }
        self.entries.push(entry);
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.by_id.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn get_normalized(&self, normalized_name: &str) -> Option<&IndexEntry> {
        self.by_normalized_name
            .get(normalized_name)
            .map(|&pos| &self.entries[pos])
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn malformed(&self) -> usize {
        self.malformed
    }

    pub fn name_collisions(&self) -> usize {
        self.name_collisions
    }
}

impl FromIterator<IndexEntry> for IndexTable {
    fn from_iter<I: IntoIterator<Item = IndexEntry>>(iter: I) -> Self {
        let mut table = Self::default();
        for entry in iter {
            table.push(entry);
        }
        table
    }
}

/// All index tables of one export. Kinds whose file is absent are recorded in
/// `missing` and resolve nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSet {
    tables: FxHashMap<IndexKind, IndexTable>,
    missing: Vec<IndexKind>,
}

impl IndexSet {
    /// Parses every index file under `base`. Only a missing document index is an error.
    pub fn load(base: &Path, locale: &Locale, max_bytes: u64) -> Result<Self, ExtractError> {
        let mut set = Self::default();

        for kind in IndexKind::ALL {
            let path = base.join(kind.file_name(locale));
            match IndexTable::parse_file(&path, max_bytes) {
                Ok(table) => {
                    info!(
                        kind = %kind,
                        entries = table.len(),
                        malformed = table.malformed(),
                        collisions = table.name_collisions(),
                        "Index parsed"
                    );
                    set.tables.insert(kind, table);
                }
                Err(e) if kind == IndexKind::Document => return Err(e),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Index unavailable, {} references will stay unresolved", kind);
                    set.missing.push(kind);
                }
            }
        }

        Ok(set)
    }

    pub fn insert(&mut self, kind: IndexKind, table: IndexTable) {
        self.missing.retain(|k| *k != kind);
        self.tables.insert(kind, table);
    }

    pub fn get(&self, kind: IndexKind) -> Option<&IndexTable> {
        self.tables.get(&kind)
    }

    pub fn missing(&self) -> &[IndexKind] {
        &self.missing
    }

    pub fn total_entries(&self) -> usize {
        self.tables.values().map(IndexTable::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EN_US;
    use std::fs;
    use tempfile::TempDir;

    fn make_index(entries: Vec<(&str, &str)>) -> IndexTable {
        entries
            .into_iter()
            .map(|(id, name)| IndexEntry {
                id: id.to_string(),
                name: name.to_string(),
                location: format!("{}.html", id),
            })
            .collect()
    }

    #[test]
    fn parse_anchors() {
        let html = r#"<html><body>
            <a href="Metric_1.html#[$$$$A1$$$$]">Revenue</a>
            <a href="Metric_2.html#[$$$$b2$$$$]"><b>Net  Profit</b></a>
            <a href="index.html">Home</a>
        </body></html>"#;
        let table = IndexTable::parse_html(html);
        assert_eq!(table.len(), 2);
        let entry = table.get("B2").unwrap();
        assert_eq!(entry.name, "Net Profit");
        assert_eq!(entry.location, "Metric_2.html");
        assert_eq!(table.get_normalized("net profit").unwrap().id, "B2");
        assert_eq!(table.malformed(), 0);
    }

    #[test]
    fn malformed_anchors_are_counted_not_fatal() {
        let html = r#"
            <a href="M.html#[$$$$ZZZ$$$$]">Bad Id</a>
            <a href="M.html#[$$$$C3$$$$]"></a>
            <a href="M.html#[$$$$D4$$$$]">Good</a>"#;
        let table = IndexTable::parse_html(html);
        assert_eq!(table.len(), 1);
        assert_eq!(table.malformed(), 2);
        assert!(table.get("D4").is_some());
    }

    #[test]
    fn name_collision_keeps_first() {
        let table = make_index(vec![("01", "Revenue"), ("02", "REVENUE")]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get_normalized("revenue").unwrap().id, "01");
        assert_eq!(table.name_collisions(), 1);
    }

    #[test]
    fn duplicate_id_keeps_first() {
        let table = make_index(vec![("01", "Revenue"), ("01", "Other")]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("01").unwrap().name, "Revenue");
    }

    #[test]
    fn empty_document() {
        let table = IndexTable::parse_html("");
        assert!(table.is_empty());
    }

    #[test]
    fn load_requires_document_index() {
        let dir = TempDir::new().unwrap();
        let err = IndexSet::load(dir.path(), &EN_US, 1 << 20).unwrap_err();
        assert!(matches!(err, ExtractError::MissingFile { .. }));
    }

    #[test]
    fn load_tolerates_missing_secondary_indexes() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Document.html"),
            r#"<a href="Doc.html#[$$$$AB$$$$]">Sales</a>"#,
        )
        .unwrap();
        let set = IndexSet::load(dir.path(), &EN_US, 1 << 20).unwrap();
        assert_eq!(set.get(IndexKind::Document).unwrap().len(), 1);
        assert!(set.get(IndexKind::Metric).is_none());
        assert_eq!(set.missing().len(), IndexKind::ALL.len() - 1);
    }
}
