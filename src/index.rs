//! Persisted vector index.
//!
//! The index is one SQLite file with two tables:
//!
//! - `index_meta`: a single row recording the embedding model, vector
//!   dimensionality, chunking settings and build time.
//! - `entries`: one row per vector, in insertion order, holding the
//!   citation metadata, the snippet text and the vector as a
//!   little-endian `f32` BLOB.
//!
//! The index is always written whole and loaded whole. [`VectorIndex::save`]
//! writes `<path>.partial` inside a single transaction and renames it over
//! `path` only after the commit succeeds, so a failed build never leaves a
//! file that looks like a usable index.
//!
//! Search is brute-force cosine similarity over every entry. Results are
//! ordered by score, ties by insertion order, so a fixed index and query
//! vector always give the same ranking.

use serde::Serialize;
use sqlx::Row;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{BuildError, QueryError};
use crate::models::{Category, IndexEntry, SearchHit};

/// Build-time facts stored alongside the vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexMeta {
    pub model: String,
    pub dims: usize,
    pub chunking: bool,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub item_count: usize,
    /// RFC 3339 timestamp.
    pub built_at: String,
}

/// Per-category totals of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub items: usize,
    pub entries: usize,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    pub meta: IndexMeta,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(meta: IndexMeta) -> Self {
        Self {
            meta,
            entries: Vec::new(),
        }
    }

    /// Append an entry. Its vector must match the index dimensionality.
    pub fn push(&mut self, entry: IndexEntry) -> Result<(), BuildError> {
        if entry.vector.len() != self.meta.dims {
            return Err(BuildError::DimensionMismatch {
                expected: self.meta.dims,
                actual: entry.vector.len(),
            });
        }
        self.entries.push(entry);
        Ok(())
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

    /// Distinct items and entries per category.
    pub fn category_counts(&self) -> BTreeMap<Category, CategoryCounts> {
        let mut items: BTreeMap<Category, HashSet<&str>> = BTreeMap::new();
        let mut counts: BTreeMap<Category, CategoryCounts> = BTreeMap::new();
        for entry in &self.entries {
            items
                .entry(entry.category)
                .or_default()
                .insert(entry.item_id.as_str());
            counts.entry(entry.category).or_default().entries += 1;
        }
        for (category, ids) in items {
            counts.entry(category).or_default().items = ids.len();
        }
        counts
    }

    /// Top-`k` entries by cosine similarity to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, QueryError> {
        if query.len() != self.meta.dims {
            return Err(QueryError::DimensionMismatch {
                expected: self.meta.dims,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (pos, cosine_similarity(query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(pos, score)| SearchHit {
                entry: self.entries[pos].clone(),
                score,
            })
            .collect())
    }

    /// Persist the whole index to `path`, replacing any previous file.
    pub async fn save(&self, path: &Path) -> Result<(), BuildError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| BuildError::WriteFile {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let partial = partial_path(path);
        remove_partial(&partial);

        if let Err(e) = self.write_to(&partial).await {
            remove_partial(&partial);
            return Err(e);
        }

        std::fs::rename(&partial, path).map_err(|source| {
            remove_partial(&partial);
            BuildError::WriteFile {
                path: path.to_path_buf(),
                source,
            }
        })?;

        tracing::info!(path = %path.display(), entries = self.entries.len(), "index saved");
        Ok(())
    }

    async fn write_to(&self, path: &Path) -> Result<(), BuildError> {
        let pool = db::connect(path, true).await?;

        let result: Result<(), sqlx::Error> = async {
            let mut tx = pool.begin().await?;

            sqlx::query(
                r#"
                CREATE TABLE index_meta (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    model TEXT NOT NULL,
                    dims INTEGER NOT NULL,
                    chunking INTEGER NOT NULL,
                    chunk_size INTEGER NOT NULL,
                    chunk_overlap INTEGER NOT NULL,
                    item_count INTEGER NOT NULL,
                    built_at TEXT NOT NULL
                )
                "#,
            )
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                CREATE TABLE entries (
                    position INTEGER PRIMARY KEY,
                    chunk_id TEXT NOT NULL UNIQUE,
                    item_id TEXT NOT NULL,
                    chunk_index INTEGER NOT NULL,
                    category TEXT NOT NULL,
                    title TEXT NOT NULL,
                    date TEXT,
                    source_url TEXT NOT NULL,
                    text TEXT NOT NULL,
                    hash TEXT NOT NULL,
                    vector BLOB NOT NULL
                )
                "#,
            )
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO index_meta (id, model, dims, chunking, chunk_size, chunk_overlap, item_count, built_at) \
                 VALUES (1, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&self.meta.model)
            .bind(self.meta.dims as i64)
            .bind(self.meta.chunking)
            .bind(self.meta.chunk_size as i64)
            .bind(self.meta.chunk_overlap as i64)
            .bind(self.meta.item_count as i64)
            .bind(&self.meta.built_at)
            .execute(&mut *tx)
            .await?;

            for (position, entry) in self.entries.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO entries (position, chunk_id, item_id, chunk_index, category, title, date, source_url, text, hash, vector) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(position as i64)
                .bind(&entry.chunk_id)
                .bind(&entry.item_id)
                .bind(entry.chunk_index as i64)
                .bind(entry.category.as_str())
                .bind(&entry.title)
                .bind(&entry.date)
                .bind(&entry.source_url)
                .bind(&entry.text)
                .bind(&entry.hash)
                .bind(vec_to_blob(&entry.vector))
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await
        }
        .await;

        pool.close().await;
        result.map_err(BuildError::from)
    }

    /// Load a whole index from `path`.
    pub async fn load(path: &Path) -> Result<Self, QueryError> {
        if !path.is_file() {
            return Err(QueryError::IndexMissing {
                path: path.to_path_buf(),
            });
        }

        let corrupt = |reason: String| QueryError::IndexCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let pool = db::connect(path, false)
            .await
            .map_err(|e| corrupt(e.to_string()))?;

        let result = read_index(&pool).await;
        pool.close().await;

        let index = result.map_err(corrupt)?;
        if index.is_empty() {
            return Err(QueryError::IndexEmpty {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!(path = %path.display(), entries = index.len(), "index loaded");
        Ok(index)
    }
}

async fn read_index(pool: &sqlx::SqlitePool) -> Result<VectorIndex, String> {
    let meta_row = sqlx::query(
        "SELECT model, dims, chunking, chunk_size, chunk_overlap, item_count, built_at \
         FROM index_meta WHERE id = 1",
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| e.to_string())?
    .ok_or_else(|| "missing index metadata".to_string())?;

    let meta = IndexMeta {
        model: meta_row.try_get("model").map_err(|e| e.to_string())?,
        dims: get_usize(&meta_row, "dims")?,
        chunking: meta_row.try_get("chunking").map_err(|e| e.to_string())?,
        chunk_size: get_usize(&meta_row, "chunk_size")?,
        chunk_overlap: get_usize(&meta_row, "chunk_overlap")?,
        item_count: get_usize(&meta_row, "item_count")?,
        built_at: meta_row.try_get("built_at").map_err(|e| e.to_string())?,
    };

    let rows = sqlx::query(
        "SELECT chunk_id, item_id, chunk_index, category, title, date, source_url, text, hash, vector \
         FROM entries ORDER BY position",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| e.to_string())?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let category: String = row.try_get("category").map_err(|e| e.to_string())?;
        let category =
            Category::parse(&category).ok_or_else(|| format!("unknown category '{}'", category))?;
        let blob: Vec<u8> = row.try_get("vector").map_err(|e| e.to_string())?;
        let vector = blob_to_vec(&blob);
        let chunk_id: String = row.try_get("chunk_id").map_err(|e| e.to_string())?;

        if vector.len() != meta.dims {
            return Err(format!(
                "entry {} has {} dimensions, index declares {}",
                chunk_id,
                vector.len(),
                meta.dims
            ));
        }

        entries.push(IndexEntry {
            chunk_id,
            item_id: row.try_get("item_id").map_err(|e| e.to_string())?,
            chunk_index: get_usize(&row, "chunk_index")?,
            category,
            title: row.try_get("title").map_err(|e| e.to_string())?,
            date: row.try_get("date").map_err(|e| e.to_string())?,
            source_url: row.try_get("source_url").map_err(|e| e.to_string())?,
            text: row.try_get("text").map_err(|e| e.to_string())?,
            hash: row.try_get("hash").map_err(|e| e.to_string())?,
            vector,
        });
    }

    Ok(VectorIndex { meta, entries })
}

fn get_usize(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<usize, String> {
    let value: i64 = row.try_get(column).map_err(|e| e.to_string())?;
    usize::try_from(value).map_err(|_| format!("negative value in column {}", column))
}

/// `<path>.partial`, the file a build writes before it is committed.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn remove_partial(partial: &Path) {
    for suffix in ["", "-journal"] {
        let mut name = partial.as_os_str().to_owned();
        name.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(name));
    }
}
