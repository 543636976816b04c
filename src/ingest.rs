//! Ingestion pipeline orchestration.
//!
//! Coordinates the full build: item store → chunking → embedding → index
//! file. The whole index is built in memory with one [`Embedder`] and
//! written in one pass; any failure aborts the run and leaves no index
//! behind (see [`VectorIndex::save`]).
//!
//! Raw-only mode bypasses chunking and embedding and writes every item as
//! `<raw_dir>/<id>.txt`, whose content is exactly the item's body text.

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::chunk::chunk_item;
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::BuildError;
use crate::index::{IndexMeta, VectorIndex};
use crate::models::{Category, Chunk, IndexEntry, ScrapedItem};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::store;

/// Switches for one ingest run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Write `<id>.txt` files instead of building an index.
    pub raw_only: bool,
    /// Embed whole items instead of chunks.
    pub no_chunk: bool,
    /// Count items and chunks without embedding or writing anything.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCount {
    pub items: usize,
    pub chunks: usize,
}

/// What an ingest run produced.
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub items: usize,
    pub chunks: usize,
    pub total_chunk_chars: usize,
    pub per_category: BTreeMap<Category, CategoryCount>,
    /// Set when an index file was written.
    pub index_path: Option<PathBuf>,
    /// Number of raw text files written in raw-only mode.
    pub raw_written: usize,
}

impl IngestSummary {
    pub fn average_chunk_chars(&self) -> usize {
        if self.chunks == 0 {
            0
        } else {
            self.total_chunk_chars / self.chunks
        }
    }
}

/// Load the item store, failing when it holds nothing to ingest.
pub fn load_corpus(dir: &Path) -> Result<Vec<ScrapedItem>, BuildError> {
    let items = store::load_items(dir)?;
    if items.is_empty() {
        return Err(BuildError::NoItems {
            dir: dir.to_path_buf(),
        });
    }
    Ok(items)
}

/// Chunk every item, keeping each chunk paired with its item.
pub fn plan_chunks<'a>(
    items: &'a [ScrapedItem],
    config: &Config,
    options: &IngestOptions,
) -> Vec<(&'a ScrapedItem, Chunk)> {
    let enabled = config.chunking.enabled && !options.no_chunk;
    items
        .iter()
        .flat_map(|item| {
            chunk_item(item, &config.chunking, enabled)
                .into_iter()
                .map(move |chunk| (item, chunk))
        })
        .collect()
}

fn summarize(items: &[ScrapedItem], planned: &[(&ScrapedItem, Chunk)]) -> IngestSummary {
    let mut summary = IngestSummary {
        items: items.len(),
        chunks: planned.len(),
        ..Default::default()
    };
    for item in items {
        summary.per_category.entry(item.category).or_default().items += 1;
    }
    for (item, chunk) in planned {
        summary.per_category.entry(item.category).or_default().chunks += 1;
        summary.total_chunk_chars += chunk.end - chunk.start;
    }
    summary
}

/// Embed every planned chunk and assemble the in-memory index.
///
/// Vectors are requested in `batch_size` batches from a single embedder.
/// Every batch must return one vector per text with the embedder's
/// dimensionality.
pub async fn build_index(
    items: &[ScrapedItem],
    planned: &[(&ScrapedItem, Chunk)],
    embedder: &dyn Embedder,
    config: &Config,
    options: &IngestOptions,
    reporter: &dyn IngestProgressReporter,
) -> Result<VectorIndex, BuildError> {
    let dims = embedder.dims();
    let mut index = VectorIndex::new(IndexMeta {
        model: embedder.model_name().to_string(),
        dims,
        chunking: config.chunking.enabled && !options.no_chunk,
        chunk_size: config.chunking.chunk_size,
        chunk_overlap: config.chunking.chunk_overlap,
        item_count: items.len(),
        built_at: chrono::Utc::now().to_rfc3339(),
    });

    let total = planned.len() as u64;
    let mut done = 0u64;
    reporter.report(IngestProgressEvent::Embedding { done: 0, total });

    for batch in planned.chunks(config.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|(_, chunk)| chunk.text.clone()).collect();
        let vectors = embedder
            .embed(&texts)
            .await
            .map_err(BuildError::Embedding)?;

        if vectors.len() != texts.len() {
            return Err(BuildError::VectorCount {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        for ((item, chunk), vector) in batch.iter().zip(vectors) {
            if vector.len() != dims {
                return Err(BuildError::DimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                });
            }
            index.push(IndexEntry {
                chunk_id: chunk.id.clone(),
                item_id: item.id.clone(),
                chunk_index: chunk.index,
                category: item.category,
                title: item.display_title().to_string(),
                date: item.date.clone(),
                source_url: item.source_url.clone(),
                text: chunk.text.clone(),
                hash: chunk.hash.clone(),
                vector,
            })?;
        }

        done += batch.len() as u64;
        tracing::debug!(done, total, "embedded batch");
        reporter.report(IngestProgressEvent::Embedding { done, total });
    }

    Ok(index)
}

/// Write each item's body to `<raw_dir>/<id>.txt`.
///
/// `.txt` files left by an earlier export are removed first, so the
/// directory holds exactly one file per item afterwards.
pub fn export_raw(items: &[ScrapedItem], raw_dir: &Path) -> Result<usize, BuildError> {
    std::fs::create_dir_all(raw_dir).map_err(|source| BuildError::WriteFile {
        path: raw_dir.to_path_buf(),
        source,
    })?;
    clear_raw_files(raw_dir)?;

    for item in items {
        let path = raw_dir.join(format!("{}.txt", item.id));
        std::fs::write(&path, &item.body_text)
            .map_err(|source| BuildError::WriteFile { path, source })?;
    }
    Ok(items.len())
}

fn clear_raw_files(raw_dir: &Path) -> Result<(), BuildError> {
    for entry in std::fs::read_dir(raw_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            std::fs::remove_file(&path)
                .map_err(|source| BuildError::WriteFile { path, source })?;
        }
    }
    Ok(())
}

/// Run one ingest with an injected embedder.
///
/// Raw-only and dry-run never touch the embedder and accept `None`; an
/// index build without one fails with [`BuildError::NoEmbedder`].
pub async fn ingest(
    config: &Config,
    options: &IngestOptions,
    embedder: Option<&dyn Embedder>,
    reporter: &dyn IngestProgressReporter,
) -> Result<IngestSummary, BuildError> {
    let items = load_corpus(&config.scraper.output_dir)?;
    reporter.report(IngestProgressEvent::Loaded {
        items: items.len() as u64,
    });
    tracing::info!(items = items.len(), dir = %config.scraper.output_dir.display(), "loaded items");

    if options.raw_only {
        let mut summary = IngestSummary {
            items: items.len(),
            ..Default::default()
        };
        for item in &items {
            summary.per_category.entry(item.category).or_default().items += 1;
        }
        summary.raw_written = export_raw(&items, &config.index.raw_dir)?;
        return Ok(summary);
    }

    let planned = plan_chunks(&items, config, options);
    let mut summary = summarize(&items, &planned);
    if options.dry_run {
        return Ok(summary);
    }
    let embedder = embedder.ok_or(BuildError::NoEmbedder)?;
    reporter.report(IngestProgressEvent::Chunked {
        chunks: planned.len() as u64,
    });

    let index = build_index(&items, &planned, embedder, config, options, reporter).await?;

    reporter.report(IngestProgressEvent::Writing {
        path: config.index.path.display().to_string(),
        entries: index.len() as u64,
    });
    index.save(&config.index.path).await?;
    summary.index_path = Some(config.index.path.clone());

    Ok(summary)
}

/// `satoshi ingest`: build the index (or the raw text corpus) and print a summary.
pub async fn run_ingest(config: &Config, options: IngestOptions, progress: ProgressMode) -> Result<()> {
    let reporter = progress.reporter();

    let needs_embedder = !options.raw_only && !options.dry_run;
    if needs_embedder && !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config, or use --raw-only.");
    }
    let embedder = if needs_embedder {
        let embedder = create_embedder(&config.embedding)?;
        if embedder.dims() == 0 {
            bail!("Embedding provider reports zero dimensions");
        }
        Some(embedder)
    } else {
        None
    };

    let summary = ingest(config, &options, embedder.as_deref(), reporter.as_ref()).await?;
    let source = config.scraper.output_dir.display();

    if options.raw_only {
        println!("ingest {} (raw-only)", source);
        println!("  items: {}", summary.items);
        println!(
            "  written: {} files to {}",
            summary.raw_written,
            config.index.raw_dir.display()
        );
        println!("ok");
        return Ok(());
    }

    if options.dry_run {
        println!("ingest {} (dry-run)", source);
    } else {
        println!("ingest {}", source);
    }
    println!("  items: {}", summary.items);
    println!("  chunks: {}", summary.chunks);
    println!("  average chunk size: {} chars", summary.average_chunk_chars());
    println!("  by category:");
    for (category, count) in &summary.per_category {
        println!(
            "    {}: {} items, {} chunks",
            category, count.items, count.chunks
        );
    }
    if let (Some(path), Some(embedder)) = (&summary.index_path, &embedder) {
        println!(
            "  embedding model: {} ({} dims)",
            embedder.model_name(),
            embedder.dims()
        );
        println!("  index: {}", path.display());
    }
    println!("ok");

    Ok(())
}
