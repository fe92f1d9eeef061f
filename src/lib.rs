//! Bimap: entity-graph extraction from cross-linked BI documentation exports
//!
//! A BI tool's HTML documentation export is a directory of index files (one per
//! object type, listing every object with a `[$$$$<HEX-ID>$$$$]` anchor) and
//! detail files holding each object's definition sections. This crate rebuilds
//! the graph hidden in those pages:
//!
//! Report -> Dataset -> Attribute -> Form -> Table, and
//! Dataset -> Metric -> (Function, Fact -> Table) or Metric -> Metric for
//! composite metrics.
//!
//! # Pipeline
//!
//! 1. **Indexing** -- Parse every index file into id and normalized-name lookups
//!    (optionally reloaded from a bincode snapshot)
//! 2. **Extraction** -- Walk each selected report top-down, resolving references
//!    against the indexes and memoizing every resolved object per worker
//! 3. **Export** -- Write the resulting graph as JSON or Neo4j-ready CSV
//!
//! # Design
//!
//! - **Encoding-agnostic parsing** -- Files are decoded once (UTF-8, then
//!   ISO-8859-1, then CP1252) and names are compared after normalization
//! - **Id first, name second** -- References resolve by id; names are a fallback
//!   with exact then fuzzy matching
//! - **Memoization** -- Namespaced LRU cache per extractor; each unique object is
//!   resolved once no matter how many parents reference it
//! - **Cycle safety** -- Composite metrics carry a copy-on-branch visited path;
//!   a cyclic edge is dropped with a warning instead of failing the report
//! - **Failure isolation** -- Problems become warnings; only an unreadable report
//!   file or an exceeded time budget fails a report, and only a missing document
//!   index fails the run
//! - **Parallel reports** -- rayon workers each own an extractor; statistics are
//!   shared through atomics and DashSet first-seen tracking
//!
//! # Key Modules
//!
//! - [`text`] -- Name normalization and multi-encoding decoding
//! - [`html`] -- Regex scanning of anchors, sections and leaf tables
//! - [`index`] -- Index file parsing (`IndexTable`, `IndexSet`)
//! - [`resolver`] -- Id/name/fuzzy link resolution
//! - [`cache`] -- Namespaced LRU object cache
//! - [`parser`] -- Per-object section parsers
//! - [`extract`] -- Recursive extractor with cycle detection
//! - [`coordinator`] -- Parallel fan-out over reports
//! - [`models`] -- Entity snapshots
//! - [`error`] -- Error taxonomy and structured warnings
//! - [`stats`] -- Run counters and reuse tracking
//! - [`snapshot`] -- Index persistence
//! - [`export`] -- JSON and CSV writers
//! - [`config`] -- Constants, locales and run configuration
//!
//! # Example Usage
//!
//! ```bash
//! # Extract every report and write a Neo4j import set
//! bimap extract --base-path export/ --output-csv graph/ --workers 8
//!
//! # One report, Portuguese export, JSON output
//! bimap extract --base-path exportacao/ --locale pt-br --report "Vendas Mensais" --output-json vendas.json
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod extract;
pub mod html;
pub mod index;
pub mod models;
pub mod parser;
pub mod resolver;
pub mod snapshot;
pub mod stats;
pub mod text;
