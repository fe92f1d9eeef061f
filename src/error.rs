use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("required file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("could not decode {} with any supported encoding", path.display())]
    Decoding { path: PathBuf },

    #[error("failed to parse {context}: {message}")]
    Parsing { context: String, message: String },

    #[error("circular reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("unresolved {kind} reference: {reference}")]
    LinkResolution { kind: String, reference: String },

    #[error("report {report_id} exceeded its time budget")]
    Timeout { report_id: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub fn parsing(context: impl Into<String>, message: impl Into<String>) -> Self {
        ExtractError::Parsing {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MissingFile,
    Decoding,
    Parsing,
    CircularReference,
    LinkResolution,
    EmbeddedMetric,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarningKind::MissingFile => "missing_file",
            WarningKind::Decoding => "decoding",
            WarningKind::Parsing => "parsing",
            WarningKind::CircularReference => "circular_reference",
            WarningKind::LinkResolution => "link_resolution",
            WarningKind::EmbeddedMetric => "embedded_metric",
        };
        f.write_str(s)
    }
}

/// A recovered problem: something was left null, dropped or kept partially.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractWarning {
    pub kind: WarningKind,
    pub report_id: Option<String>,
    pub message: String,
}

impl ExtractWarning {
    pub fn from_error(err: &ExtractError, report_id: Option<&str>) -> Self {
        let kind = match err {
            ExtractError::MissingFile { .. } => WarningKind::MissingFile,
            ExtractError::Decoding { .. } => WarningKind::Decoding,
            ExtractError::CircularReference { .. } => WarningKind::CircularReference,
            ExtractError::LinkResolution { .. } => WarningKind::LinkResolution,
            ExtractError::Parsing { .. } | ExtractError::Timeout { .. } | ExtractError::Io { .. } => {
                WarningKind::Parsing
            }
        };
        Self {
            kind,
            report_id: report_id.map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// A report that could not be extracted at all.
#[derive(Debug, Clone, Serialize)]
pub struct ReportFailure {
    pub report_id: String,
    pub report_name: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_reference_message_shows_chain() {
        let err = ExtractError::CircularReference {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "circular reference: A -> B -> A");
    }

    #[test]
    fn warning_kind_follows_error_variant() {
        let err = ExtractError::LinkResolution {
            kind: "fact".into(),
            reference: "Revenue".into(),
        };
        let warning = ExtractWarning::from_error(&err, Some("R1"));
        assert_eq!(warning.kind, WarningKind::LinkResolution);
        assert_eq!(warning.report_id.as_deref(), Some("R1"));
        assert!(warning.message.contains("Revenue"));
    }
}
