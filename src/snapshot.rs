//! On-disk snapshot of a parsed [`IndexSet`], so repeated runs over the same
//! export skip index parsing.

use crate::config::{Locale, SNAPSHOT_VERSION};
use crate::index::{IndexKind, IndexSet};
use anyhow::{bail, Context, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

/// `(file name, mtime secs, size)` of one index file; absent files are `(name, 0, 0)`.
type FileStamp = (String, u64, u64);

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub version: u32,
    pub base_path: String,
    pub locale: String,
    pub fingerprint: Vec<FileStamp>,
    pub entry_count: usize,
}

#[derive(Deserialize)]
struct SnapshotDe {
    metadata: SnapshotMetadata,
    indexes: IndexSet,
}

#[derive(Serialize)]
struct SnapshotSer<'a> {
    metadata: SnapshotMetadata,
    indexes: &'a IndexSet,
}

pub fn snapshot_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("index.snapshot")
}

fn file_stamp(path: &Path) -> Result<(u64, u64)> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to get metadata for: {}", path.display()))?;
    let mtime = metadata
        .modified()
        .context("Failed to get modification time")?
        .duration_since(SystemTime::UNIX_EPOCH)
        .context("Invalid modification time")?
        .as_secs();
    Ok((mtime, metadata.len()))
}

/// Stamps every index file the locale names under `base_path`.
pub fn fingerprint(base_path: &Path, locale: &Locale) -> Result<Vec<FileStamp>> {
    IndexKind::ALL
        .iter()
        .map(|kind| {
            let name = kind.file_name(locale);
            let path = base_path.join(name);
            let (mtime, size) = if path.exists() {
                file_stamp(&path)?
            } else {
                (0, 0)
            };
            Ok((name.to_string(), mtime, size))
        })
        .collect()
}

/// Returns `Ok(Some(indexes))` if the snapshot is valid, `Ok(None)` if missing or stale.
pub fn try_load(snapshot: &Path, base_path: &Path, locale: &Locale) -> Result<Option<IndexSet>> {
    if !snapshot.exists() {
        return Ok(None);
    }

    let file_size = fs::metadata(snapshot).map(|m| m.len()).unwrap_or(0);
    let file = File::open(snapshot).context("Failed to open snapshot file")?;
    let reader = BufReader::with_capacity(256 * 1024, file);
    let options = bincode::options().with_limit(file_size.saturating_add(1024));

    let decoded: SnapshotDe = match options.deserialize_from(reader) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Snapshot file is corrupt or unreadable");
            return Ok(None);
        }
    };
    let metadata = &decoded.metadata;

    if metadata.version != SNAPSHOT_VERSION {
        info!(
            cached = metadata.version,
            current = SNAPSHOT_VERSION,
            "Snapshot version mismatch"
        );
        return Ok(None);
    }

    let base = base_path.display().to_string();
    if metadata.base_path != base || metadata.locale != locale.code {
        info!(
            cached = %metadata.base_path,
            current = %base,
            "Snapshot was taken from a different export"
        );
        return Ok(None);
    }

    if metadata.fingerprint != fingerprint(base_path, locale)? {
        info!("Index files have changed since the snapshot was taken");
        return Ok(None);
    }

    info!(entries = metadata.entry_count, "Indexes loaded from snapshot");
    Ok(Some(decoded.indexes))
}

/// Serializes the indexes by reference and writes atomically via rename.
pub fn save(indexes: &IndexSet, snapshot: &Path, base_path: &Path, locale: &Locale) -> Result<()> {
    if let Some(parent) = snapshot.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let entry_count = indexes.total_entries();
    let payload = SnapshotSer {
        metadata: SnapshotMetadata {
            version: SNAPSHOT_VERSION,
            base_path: base_path.display().to_string(),
            locale: locale.code.to_string(),
            fingerprint: fingerprint(base_path, locale)?,
            entry_count,
        },
        indexes,
    };

    let tmp_path = snapshot.with_extension("snapshot.tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp snapshot file: {:?}", tmp_path))?;
    let writer = BufWriter::new(file);

    bincode::DefaultOptions::new()
        .serialize_into(writer, &payload)
        .context("Failed to serialize index snapshot")?;

    fs::rename(&tmp_path, snapshot)
        .with_context(|| format!("Failed to rename temp snapshot file to: {:?}", snapshot))?;

    info!(entries = entry_count, path = ?snapshot, "Index snapshot saved");
    Ok(())
}

/// Loads a snapshot without checking staleness.
pub fn load(snapshot: &Path) -> Result<IndexSet> {
    if !snapshot.exists() {
        bail!("Snapshot file does not exist: {:?}", snapshot);
    }
    let file_size = fs::metadata(snapshot).map(|m| m.len()).unwrap_or(0);
    let file = File::open(snapshot)
        .with_context(|| format!("Failed to open snapshot file: {:?}", snapshot))?;
    let reader = BufReader::with_capacity(256 * 1024, file);
    let decoded: SnapshotDe = bincode::options()
        .with_limit(file_size.saturating_add(1024))
        .deserialize_from(reader)
        .context("Failed to deserialize index snapshot")?;
    Ok(decoded.indexes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EN_US, PT_BR};
    use crate::index::IndexTable;
    use tempfile::TempDir;

    fn create_export(dir: &TempDir) -> PathBuf {
        let base = dir.path().join("export");
        fs::create_dir_all(&base).unwrap();
        fs::write(
            base.join("Document.html"),
            r#"<a href="D.html#[$$$$0A$$$$]">Sales</a>"#,
        )
        .unwrap();
        base
    }

    fn create_indexes(base: &Path) -> IndexSet {
        let mut set = IndexSet::default();
        set.insert(
            IndexKind::Document,
            IndexTable::parse_file(&base.join("Document.html"), 1 << 20).unwrap(),
        );
        set
    }

    #[test]
    fn snapshot_path_is_inside_cache_dir() {
        assert_eq!(
            snapshot_path(Path::new("/cache")),
            PathBuf::from("/cache/index.snapshot")
        );
    }

    #[test]
    fn try_load_returns_none_when_missing() {
        let dir = TempDir::new().unwrap();
        let result = try_load(&dir.path().join("none"), dir.path(), &EN_US).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let base = create_export(&dir);
        let path = snapshot_path(&dir.path().join("cache"));
        save(&create_indexes(&base), &path, &base, &EN_US).unwrap();

        let loaded = try_load(&path, &base, &EN_US).unwrap().unwrap();
        let docs = loaded.get(IndexKind::Document).unwrap();
        assert_eq!(docs.get("0A").unwrap().name, "Sales");
        assert_eq!(docs.get_normalized("sales").unwrap().id, "0A");

        assert!(load(&path).is_ok());
    }

    #[test]
    fn stale_when_index_file_changes() {
        let dir = TempDir::new().unwrap();
        let base = create_export(&dir);
        let path = snapshot_path(dir.path());
        save(&create_indexes(&base), &path, &base, &EN_US).unwrap();

        fs::write(
            base.join("Document.html"),
            r#"<a href="D.html#[$$$$0A$$$$]">Sales</a><a href="D.html#[$$$$0B$$$$]">Stock</a>"#,
        )
        .unwrap();
        assert!(try_load(&path, &base, &EN_US).unwrap().is_none());
    }

    #[test]
    fn stale_when_index_file_appears() {
        let dir = TempDir::new().unwrap();
        let base = create_export(&dir);
        let path = snapshot_path(dir.path());
        save(&create_indexes(&base), &path, &base, &EN_US).unwrap();

        fs::write(base.join("Metric.html"), "").unwrap();
        assert!(try_load(&path, &base, &EN_US).unwrap().is_none());
    }

    #[test]
    fn stale_for_other_locale_or_path() {
        let dir = TempDir::new().unwrap();
        let base = create_export(&dir);
        let path = snapshot_path(dir.path());
        save(&create_indexes(&base), &path, &base, &EN_US).unwrap();

        assert!(try_load(&path, &base, &PT_BR).unwrap().is_none());
        assert!(try_load(&path, dir.path(), &EN_US).unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_path(dir.path());
        fs::write(&path, b"not valid bincode data").unwrap();
        assert!(try_load(&path, dir.path(), &EN_US).unwrap().is_none());
        assert!(load(&path).is_err());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let base = create_export(&dir);
        let path = snapshot_path(&dir.path().join("nested").join("deep"));
        save(&create_indexes(&base), &path, &base, &EN_US).unwrap();
        assert!(path.exists());
    }
}
