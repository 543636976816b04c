//! Item file store.
//!
//! The scraper writes one pretty-printed JSON file per item at
//! `<output_dir>/<category dir>/<id>.json`. The ingestor and the `get`
//! command read them back.
//!
//! A scrape run replaces the store as a whole: [`replace_items`] writes into
//! `<output_dir>.partial` and swaps it in once every file is written, so an
//! item that failed this run is gone rather than left over from the last.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::BuildError;
use crate::models::ScrapedItem;

/// Path of the file holding `item` under `dir`.
pub fn item_path(dir: &Path, item: &ScrapedItem) -> PathBuf {
    dir.join(item.category.dir_name())
        .join(format!("{}.json", item.id))
}

/// Write one item, creating its category directory as needed.
pub fn write_item(dir: &Path, item: &ScrapedItem) -> Result<PathBuf, BuildError> {
    let path = item_path(dir, item);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| BuildError::WriteFile {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(item).map_err(|e| BuildError::ReadItem {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    std::fs::write(&path, json).map_err(|source| BuildError::WriteFile {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

/// Replace the contents of `dir` with exactly `items`.
pub fn replace_items<'a>(
    dir: &Path,
    items: impl IntoIterator<Item = &'a ScrapedItem>,
) -> Result<usize, BuildError> {
    let staging = staging_path(dir);
    if staging.exists() {
        remove_dir(&staging)?;
    }
    std::fs::create_dir_all(&staging).map_err(|source| BuildError::WriteFile {
        path: staging.clone(),
        source,
    })?;

    let mut written = 0;
    for item in items {
        if let Err(e) = write_item(&staging, item) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }
        written += 1;
    }

    if dir.exists() {
        remove_dir(dir)?;
    }
    std::fs::rename(&staging, dir).map_err(|source| BuildError::WriteFile {
        path: dir.to_path_buf(),
        source,
    })?;

    tracing::debug!(dir = %dir.display(), written, "item store replaced");
    Ok(written)
}

/// `<dir>.partial`, next to `dir` even when `dir` ends in a separator.
fn staging_path(dir: &Path) -> PathBuf {
    let mut name = dir.components().collect::<PathBuf>().into_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

fn remove_dir(dir: &Path) -> Result<(), BuildError> {
    std::fs::remove_dir_all(dir).map_err(|source| BuildError::WriteFile {
        path: dir.to_path_buf(),
        source,
    })
}

/// Load every `*.json` item under `dir`, sorted by id.
///
/// A file that cannot be read or parsed fails the whole load: the ingestor
/// must never build from a half-written scrape.
pub fn load_items(dir: &Path) -> Result<Vec<ScrapedItem>, BuildError> {
    if !dir.exists() {
        return Err(BuildError::NoItems {
            dir: dir.to_path_buf(),
        });
    }

    let mut items = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| BuildError::ReadItem {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
            reason: e.to_string(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|e| BuildError::ReadItem {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let item: ScrapedItem = serde_json::from_str(&content).map_err(|e| BuildError::ReadItem {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        items.push(item);
    }

    items.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(items)
}

/// Find one item by id.
pub fn find_item(dir: &Path, id: &str) -> Result<Option<ScrapedItem>, BuildError> {
    Ok(load_items(dir)?.into_iter().find(|item| item.id == id))
}
