use crate::error::ExtractError;
use encoding_rs::WINDOWS_1252;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Reduces a display string to a comparison-safe form.
///
/// Compatibility-decomposes, drops combining marks, lower-cases and collapses
/// runs of whitespace into single spaces.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses whitespace without touching case or accents.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Encoding {
    Utf8,
    /// Also covers documents labelled `latin-1`, which is the same byte mapping.
    Iso8859_1,
    Windows1252,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Iso8859_1 => "iso-8859-1",
            Encoding::Windows1252 => "cp1252",
        };
        f.write_str(s)
    }
}

/// Tried in order; the first clean decode wins.
pub const ENCODING_PRIORITY: [Encoding; 3] =
    [Encoding::Utf8, Encoding::Iso8859_1, Encoding::Windows1252];

fn try_decode(bytes: &[u8], encoding: Encoding) -> Option<Cow<'_, str>> {
    match encoding {
        Encoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            std::str::from_utf8(bytes).ok().map(Cow::Borrowed)
        }
        Encoding::Iso8859_1 => Some(encoding_rs::mem::decode_latin1(bytes)).filter(|t| is_clean(t)),
        Encoding::Windows1252 => WINDOWS_1252
            .decode_without_bom_handling_and_without_replacement(bytes)
            .filter(|t| is_clean(t)),
    }
}

/// A single-byte decode is rejected when it yields replacement characters or
/// C1 control characters, which never appear in real exported text.
fn is_clean(text: &str) -> bool {
    !text
        .chars()
        .any(|c| c == char::REPLACEMENT_CHARACTER || ('\u{80}'..='\u{9f}').contains(&c))
}

pub fn decode_bytes(bytes: &[u8]) -> Option<(String, Encoding)> {
    ENCODING_PRIORITY
        .iter()
        .find_map(|&enc| try_decode(bytes, enc).map(|text| (text.into_owned(), enc)))
}

/// Decodes a raw document, reporting `Decoding` when every candidate fails.
pub fn decode(bytes: &[u8], path: &Path) -> Result<(String, Encoding), ExtractError> {
    decode_bytes(bytes).ok_or_else(|| ExtractError::Decoding {
        path: path.to_path_buf(),
    })
}

/// Reads and decodes one export file, refusing anything above `max_bytes`.
pub fn read_document(path: &Path, max_bytes: u64) -> Result<(String, Encoding), ExtractError> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ExtractError::MissingFile {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(ExtractError::io(path, e)),
    };
    if metadata.len() > max_bytes {
        return Err(ExtractError::parsing(
            path.display().to_string(),
            format!("file is {} bytes, limit is {}", metadata.len(), max_bytes),
        ));
    }
    let bytes = fs::read(path).map_err(|e| ExtractError::io(path, e))?;
    decode(&bytes, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_document_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_document(&dir.path().join("nope.html"), 1024).unwrap_err();
        assert!(matches!(err, ExtractError::MissingFile { .. }));
    }

    #[test]
    fn read_document_rejects_oversized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.html");
        fs::write(&path, vec![b'a'; 64]).unwrap();
        let err = read_document(&path, 16).unwrap_err();
        assert!(matches!(err, ExtractError::Parsing { .. }));
        assert!(read_document(&path, 64).is_ok());
    }

    #[test]
    fn normalize_strips_accents_and_case() {
        assert_eq!(normalize("Métrica de Receita"), "metrica de receita");
        assert_eq!(normalize("FUNÇÃO"), "funcao");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  Net \t Profit\n\n "), "net profit");
    }

    #[test]
    fn normalize_compat_forms() {
        // full-width letters and the non-breaking space fold to plain ASCII
        assert_eq!(normalize("ＲＯＩ\u{a0}Total"), "roi total");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("Ação  Comercial");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_empty() {
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn collapse_keeps_case() {
        assert_eq!(collapse_whitespace(" Net\n Profit "), "Net Profit");
    }

    #[test]
    fn decode_prefers_utf8() {
        let (text, enc) = decode_bytes("Função".as_bytes()).unwrap();
        assert_eq!(text, "Função");
        assert_eq!(enc, Encoding::Utf8);
    }

    #[test]
    fn decode_strips_utf8_bom() {
        let (text, enc) = decode_bytes(b"\xEF\xBB\xBFabc").unwrap();
        assert_eq!(text, "abc");
        assert_eq!(enc, Encoding::Utf8);
    }

    #[test]
    fn decode_falls_back_to_latin1() {
        // "Função" in ISO-8859-1
        let (text, enc) = decode_bytes(b"Fun\xe7\xe3o").unwrap();
        assert_eq!(text, "Função");
        assert_eq!(enc, Encoding::Iso8859_1);
    }

    #[test]
    fn decode_uses_cp1252_for_smart_quotes() {
        // 0x93/0x94 are curly quotes in cp1252 but C1 controls in latin-1
        let (text, enc) = decode_bytes(b"\x93ROI\x94").unwrap();
        assert_eq!(text, "\u{201c}ROI\u{201d}");
        assert_eq!(enc, Encoding::Windows1252);
    }

    #[test]
    fn decode_fails_when_nothing_is_clean() {
        // 0x81 is unassigned in cp1252 and a control character in latin-1
        let err = decode(b"abc\x81", Path::new("x.html")).unwrap_err();
        assert!(matches!(err, ExtractError::Decoding { .. }));
    }

    #[test]
    fn latin1_and_utf8_fixtures_normalize_equal() {
        let (latin, _) = decode_bytes(b"Receita L\xedquida").unwrap();
        let (utf8, _) = decode_bytes("Receita Líquida".as_bytes()).unwrap();
        assert_eq!(normalize(&latin), normalize(&utf8));
    }
}
