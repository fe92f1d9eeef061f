//! Low-level scanning of exported HTML.
//!
//! The export is machine-generated and never needs a full DOM: everything the
//! parsers need can be found with a handful of regexes plus a depth-tracking
//! scan for `<table>` nesting.

use crate::text::{collapse_whitespace, normalize};
use once_cell::sync::Lazy;
use regex::Regex;

pub static ID_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\$\$\$\$([0-9A-Fa-f]+)\$\$\$\$\]").unwrap());

static PLAIN_FRAGMENT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([0-9A-Fa-f]{8,})$").unwrap());

static ANCHOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#).unwrap()
});

static ANCHOR_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<a\s[^>]*?name\s*=\s*["']?([^"'>\s]+)"#).unwrap());

static TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<img\s[^>]*?src\s*=\s*["']([^"']*)["'][^>]*>|<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#,
    )
    .unwrap()
});

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").unwrap());

static ENTITY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap());

static TABLE_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<(/?)table\b[^>]*>").unwrap());

static ROW_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap());

static CELL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t[dh]\b[^>]*>(.*?)</t[dh]\s*>").unwrap());

static SECTION_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<(td|th|div|span|table|p)\b[^>]*class\s*=\s*["']?SECTIONHEADER["']?[^>]*>(.*?)</(?:td|th|div|span|table|p)\s*>"#)
        .unwrap()
});

static BOLD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:b|strong)\b[^>]*>(.*?)</(?:b|strong)\s*>").unwrap());

static OBJECT_MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--\s*\[OBJECT:").unwrap());

/// An `<a href>` found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    /// File part of the href (before `#`)
    pub file: String,
    pub id: Option<String>,
    pub text: String,
}

impl Link {
    fn new(href: &str, inner: &str) -> Self {
        let href = decode_entities(href);
        let file = href.split('#').next().unwrap_or_default().to_string();
        let id = extract_id(&href);
        Self {
            file,
            id,
            text: strip_tags(inner),
            href,
        }
    }
}

/// An `<img>` or a link, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Image(String),
    Link(Link),
}

/// Pulls the object id out of an href, canonicalized to upper case.
pub fn extract_id(href: &str) -> Option<String> {
    if let Some(caps) = ID_PLACEHOLDER.captures(href) {
        return Some(caps[1].to_ascii_uppercase());
    }
    if href.contains("$$$$") {
        return None;
    }
    PLAIN_FRAGMENT_ID
        .captures(href)
        .map(|c| c[1].to_ascii_uppercase())
}

/// True for hrefs that carry the id marker but not a well-formed id.
pub fn has_malformed_id(href: &str) -> bool {
    href.contains("$$$$") && !ID_PLACEHOLDER.is_match(href)
}

pub fn links(html: &str) -> Vec<Link> {
    ANCHOR_REGEX
        .captures_iter(html)
        .map(|c| Link::new(&c[1], &c[2]))
        .collect()
}

/// Links that carry an id, in document order.
pub fn id_links(html: &str) -> Vec<Link> {
    links(html).into_iter().filter(|l| l.id.is_some()).collect()
}

pub fn tokens(html: &str) -> Vec<Token> {
    TOKEN_REGEX
        .captures_iter(html)
        .map(|c| match c.get(1) {
            Some(src) => Token::Image(decode_entities(src.as_str())),
            None => Token::Link(Link::new(
                c.get(2).map_or("", |m| m.as_str()),
                c.get(3).map_or("", |m| m.as_str()),
            )),
        })
        .collect()
}

/// `name` attributes of `<a>` tags with their byte offsets.
pub fn anchor_names(html: &str) -> Vec<(usize, String)> {
    ANCHOR_NAME_REGEX
        .captures_iter(html)
        .filter_map(|c| {
            let m = c.get(0)?;
            Some((m.start(), c[1].to_string()))
        })
        .collect()
}

pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_REGEX
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Visible text of an HTML fragment: tags and comments removed, entities
/// decoded, whitespace collapsed.
pub fn strip_tags(html: &str) -> String {
    let without_tags = TAG_REGEX.replace_all(html, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

pub fn bold_text(html: &str) -> Option<String> {
    BOLD_REGEX
        .captures_iter(html)
        .map(|c| strip_tags(&c[1]))
        .find(|t| !t.is_empty())
}

/// The slice of a detail document that describes one object.
///
/// Starts at the object's `<a name>` anchor, falling back to its
/// `[OBJECT: name]` comment, and runs until the next object marker.
pub fn object_section<'a>(doc: &'a str, id: Option<&str>, name: &str) -> Option<&'a str> {
    let start = id
        .and_then(|id| find_named_anchor(doc, id))
        .or_else(|| find_object_comment(doc, name))?;
    let search_from = doc[start..]
        .find("-->")
        .filter(|_| doc[start..].starts_with("<!--"))
        .map_or(start + 1, |p| start + p + 3);
    let end = OBJECT_MARKER_REGEX
        .find_at(doc, search_from.min(doc.len()))
        .map_or(doc.len(), |m| m.start());
    Some(&doc[start..end])
}

fn find_named_anchor(doc: &str, id: &str) -> Option<usize> {
    anchor_names(doc).into_iter().find_map(|(pos, name)| {
        let bare = ID_PLACEHOLDER
            .captures(&name)
            .map_or(name.clone(), |c| c[1].to_string());
        bare.eq_ignore_ascii_case(id).then_some(pos)
    })
}

fn find_object_comment(doc: &str, name: &str) -> Option<usize> {
    let wanted = normalize(name);
    OBJECT_MARKER_REGEX.find_iter(doc).find_map(|m| {
        let rest = &doc[m.end()..];
        let close = rest.find(']')?;
        (normalize(&decode_entities(&rest[..close])) == wanted).then_some(m.start())
    })
}

/// `(title, body)` for every section header, in document order.
pub fn sections(html: &str) -> Vec<(String, &str)> {
    let headers: Vec<_> = SECTION_HEADER_REGEX.captures_iter(html).collect();
    headers
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let end = headers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(html.len(), |m| m.start());
            Some((strip_tags(&caps[2]), &html[whole.end()..end]))
        })
        .collect()
}

/// Body of the first section whose header matches `title` after normalization.
pub fn section<'a>(html: &'a str, title: &str) -> Option<&'a str> {
    let wanted = normalize(title);
    sections(html)
        .into_iter()
        .find(|(t, _)| normalize(t) == wanted)
        .map(|(_, body)| body)
}

/// Tables that contain no nested table, in document order.
pub fn leaf_tables(html: &str) -> Vec<&str> {
    // (start offset, saw a nested table)
    let mut stack: Vec<(usize, bool)> = Vec::new();
    let mut leaves = Vec::new();

    for caps in TABLE_TAG_REGEX.captures_iter(html) {
        let Some(tag) = caps.get(0) else { continue };
        if caps[1].is_empty() {
            if let Some(parent) = stack.last_mut() {
                parent.1 = true;
            }
            stack.push((tag.start(), false));
        } else if let Some((start, has_child)) = stack.pop() {
            if !has_child {
                leaves.push(&html[start..tag.end()]);
            }
        }
    }

    leaves
}

/// Rows of a table as lists of raw cell HTML.
pub fn rows(table: &str) -> Vec<Vec<&str>> {
    ROW_REGEX
        .captures_iter(table)
        .filter_map(|row| {
            let inner = row.get(1)?.as_str();
            let cells: Vec<&str> = CELL_REGEX
                .captures_iter(inner)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            (!cells.is_empty()).then_some(cells)
        })
        .collect()
}

/// Column position of a header label in a table's first row.
pub fn column_index(header_row: &[&str], label: &str) -> Option<usize> {
    let wanted = normalize(label);
    header_row
        .iter()
        .position(|cell| normalize(&strip_tags(cell)) == wanted)
}

/// `(label, value cell)` pairs from every two-or-more-cell row of every leaf table.
pub fn label_rows(html: &str) -> Vec<(String, &str)> {
    leaf_tables(html)
        .into_iter()
        .flat_map(rows)
        .filter(|cells| cells.len() >= 2)
        .map(|cells| (strip_tags(cells[0]), cells[1]))
        .collect()
}

/// Content of the first cell following a `<!-- [MARKER] -->` comment.
pub fn marker_cell<'a>(html: &'a str, marker: &str) -> Option<&'a str> {
    let pattern = format!(r"(?is)<!--\s*\[{}\]\s*-->", regex::escape(marker));
    let re = Regex::new(&pattern).ok()?;
    let after = &html[re.find(html)?.end()..];
    CELL_REGEX
        .captures(after)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_from_placeholder() {
        assert_eq!(
            extract_id("Metric.html#[$$$$ab12CD$$$$]"),
            Some("AB12CD".to_string())
        );
    }

    #[test]
    fn id_from_plain_fragment() {
        assert_eq!(
            extract_id("Metric.html#0A1B2C3D4E"),
            Some("0A1B2C3D4E".to_string())
        );
        assert_eq!(extract_id("Metric.html#top"), None);
    }

    #[test]
    fn malformed_marker_has_no_id() {
        assert_eq!(extract_id("Metric.html#[$$$$XYZ$$$$]"), None);
        assert!(has_malformed_id("Metric.html#[$$$$XYZ$$$$]"));
        assert!(!has_malformed_id("Metric.html#[$$$$ABC$$$$]"));
    }

    #[test]
    fn links_capture_file_id_and_text() {
        let html = r#"<a href="M1.html#[$$$$AA11$$$$]"><font>Net&nbsp;Profit</font></a>"#;
        let found = links(html);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, "M1.html");
        assert_eq!(found[0].id.as_deref(), Some("AA11"));
        assert_eq!(found[0].text, "Net Profit");
    }

    #[test]
    fn tokens_keep_document_order() {
        let html = r#"<img src="Function.bmp"><a href="F.html#[$$$$01$$$$]">Sum</a>(<img src='Fact.bmp'/><a href="X.html#[$$$$02$$$$]">Revenue</a>)"#;
        let toks = tokens(html);
        assert_eq!(toks.len(), 4);
        assert_eq!(toks[0], Token::Image("Function.bmp".into()));
        assert!(matches!(&toks[1], Token::Link(l) if l.text == "Sum"));
        assert_eq!(toks[2], Token::Image("Fact.bmp".into()));
        assert!(matches!(&toks[3], Token::Link(l) if l.id.as_deref() == Some("02")));
    }

    #[test]
    fn entities_decode() {
        assert_eq!(decode_entities("a &amp; b &#233; &#xE7; &bogus;"), "a & b é ç &bogus;");
    }

    #[test]
    fn strip_tags_removes_comments() {
        assert_eq!(strip_tags("<b>Net</b> <!-- x --> Profit"), "Net Profit");
    }

    #[test]
    fn leaf_tables_skip_containers() {
        let html = "<table id=outer><tr><td><table id=a></table></td></tr><tr><td><table id=b><tr><td>x</td></tr></table></td></tr></table><table id=c></table>";
        let leaves = leaf_tables(html);
        assert_eq!(leaves.len(), 3);
        assert!(leaves[0].starts_with("<table id=a>"));
        assert!(leaves[1].starts_with("<table id=b>"));
        assert!(leaves[2].starts_with("<table id=c>"));
    }

    #[test]
    fn leaf_tables_tolerate_unbalanced_close() {
        let html = "</td></table><table id=x></table>";
        assert_eq!(leaf_tables(html), vec!["<table id=x></table>"]);
    }

    #[test]
    fn rows_and_cells() {
        let table = "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr><tr></tr></table>";
        let r = rows(table);
        assert_eq!(r, vec![vec!["A", "B"], vec!["1", "2"]]);
        assert_eq!(column_index(&r[0], "b"), Some(1));
    }

    #[test]
    fn sections_split_on_headers() {
        let html = r#"<td class="SECTIONHEADER">DEFINIÇÃO</td>body one<table class=SECTIONHEADER><tr><td>EXPRESSIONS</td></tr></table>body two"#;
        let found = sections(html);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "DEFINIÇÃO");
        assert_eq!(found[0].1, "body one");
        assert_eq!(section(html, "definicao"), Some("body one"));
        assert!(section(html, "Expressions").unwrap().ends_with("body two"));
        assert_eq!(section(html, "missing"), None);
    }

    #[test]
    fn object_section_by_anchor() {
        let doc = r#"<!-- [OBJECT: A] --><a name="AA"></a>first<!-- [OBJECT: B] --><a name="BB"></a>second"#;
        let s = object_section(doc, Some("bb"), "B").unwrap();
        assert!(s.contains("second"));
        assert!(!s.contains("first"));
        let a = object_section(doc, Some("AA"), "A").unwrap();
        assert!(a.contains("first"));
        assert!(!a.contains("second"));
    }

    #[test]
    fn object_section_falls_back_to_comment() {
        let doc = "<!-- [OBJECT: Vendas Líquidas] -->one<!-- [OBJECT: Other] -->two";
        let s = object_section(doc, Some("FF"), "vendas liquidas").unwrap();
        assert!(s.contains("one"));
        assert!(!s.contains("two"));
        assert!(object_section(doc, None, "Nope").is_none());
    }

    #[test]
    fn marker_cell_finds_following_cell() {
        let html = "<!-- [ROWS] --><td><a href='a.html#[$$$$01$$$$]'>Region</a></td><!-- [COLUMNS] --><td>cols</td>";
        assert!(marker_cell(html, "ROWS").unwrap().contains("Region"));
        assert_eq!(marker_cell(html, "COLUMNS"), Some("cols"));
        assert_eq!(marker_cell(html, "PAGES"), None);
    }

    #[test]
    fn label_rows_pairs() {
        let html = "<table><tr><td>Metric Type</td><td>Simple</td></tr><tr><td>lonely</td></tr></table>";
        let pairs = label_rows(html);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "Metric Type");
        assert_eq!(pairs[0].1, "Simple");
    }

    #[test]
    fn bold_text_skips_empty() {
        assert_eq!(bold_text("<b> </b><b>ID</b>"), Some("ID".to_string()));
        assert_eq!(bold_text("plain"), None);
    }
}
