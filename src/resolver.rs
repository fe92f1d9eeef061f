use crate::config::PREFIX_BONUS;
use crate::index::{IndexEntry, IndexTable};
use crate::text::normalize;
use rustc_hash::FxHashSet;
use tracing::trace;

/// Looks up authoritative index records by id, then by name.
///
/// Name lookup is exact on the normalized name first. When that misses, every
/// entry is scored with [`similarity`] and the best candidate at or above the
/// threshold wins; ties go to the entry listed first in the index.
#[derive(Debug, Clone, Copy)]
pub struct LinkResolver<'a> {
    table: &'a IndexTable,
    threshold: f64,
}

impl<'a> LinkResolver<'a> {
    pub fn new(table: &'a IndexTable, threshold: f64) -> Self {
        Self { table, threshold }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&'a IndexEntry> {
        self.table
            .get(id)
            .or_else(|| self.table.get(&id.to_ascii_uppercase()))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&'a IndexEntry> {
        self.find_by_exact_name(name)
            .or_else(|| self.find_similar(name))
    }

    /// First entry whose normalized name equals the normalized `name`.
    pub fn find_by_exact_name(&self, name: &str) -> Option<&'a IndexEntry> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }
        self.table.get_normalized(&wanted)
    }

    /// Best fuzzy candidate at or above the threshold.
    pub fn find_similar(&self, name: &str) -> Option<&'a IndexEntry> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }
        self.best_fuzzy(&wanted)
    }

    pub fn find_link(&self, id: Option<&str>, name: Option<&str>) -> Option<&'a IndexEntry> {
        id.and_then(|id| self.find_by_id(id))
            .or_else(|| name.and_then(|name| self.find_by_name(name)))
    }

    /// All entries whose display name normalizes to exactly `name`, in index order.
    pub fn find_all_by_exact_name(&self, name: &str) -> Vec<&'a IndexEntry> {
        let wanted = normalize(name);
        self.table
            .entries()
            .iter()
            .filter(|e| normalize(&e.name) == wanted)
            .collect()
    }

    fn best_fuzzy(&self, wanted: &str) -> Option<&'a IndexEntry> {
        let mut best: Option<(&IndexEntry, f64)> = None;
        for entry in self.table.entries() {
            let score = similarity(wanted, &normalize(&entry.name));
            if score < self.threshold {
                continue;
            }
            // strictly greater: the first entry keeps a tie
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((entry, score));
            }
        }
        if let Some((entry, score)) = best {
            trace!(query = wanted, matched = %entry.name, score, "Fuzzy name match");
        }
        best.map(|(entry, _)| entry)
    }
}

/// Similarity of two already-normalized names, in `[0, 1.5]`.
///
/// The score is the highest of:
/// - containment: `len(query) / len(candidate)` when the candidate contains the
///   query, plus [`PREFIX_BONUS`] when it also starts with it
/// - word overlap: shared words over the larger word count
/// - normalized Damerau-Levenshtein similarity, which absorbs single-character
///   corruption from bad decoding
pub fn similarity(query: &str, candidate: &str) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let containment = if candidate.contains(query) {
        let ratio = query.chars().count() as f64 / candidate.chars().count() as f64;
        if candidate.starts_with(query) {
            ratio + PREFIX_BONUS
        } else {
            ratio
        }
    } else {
        0.0
    };

    let query_words: FxHashSet<&str> = query.split(' ').collect();
    let candidate_words: FxHashSet<&str> = candidate.split(' ').collect();
    let common = query_words.intersection(&candidate_words).count();
    let overlap = common as f64 / query_words.len().max(candidate_words.len()) as f64;

    let edit = strsim::normalized_damerau_levenshtein(query, candidate);

    containment.max(overlap).max(edit)
}
