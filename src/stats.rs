//! Index statistics.
//!
//! Summarizes what the chat stage will search: which embedding model built
//! the index, how it was chunked, and how entries split across categories.

use anyhow::Result;

use crate::config::Config;
use crate::index::VectorIndex;

pub async fn run_stats(config: &Config) -> Result<()> {
    let path = &config.index.path;
    let index = VectorIndex::load(path).await?;
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    let by_category = index.category_counts();

    let meta = &index.meta;
    println!("Satoshi RAG | Index Stats");
    println!("=========================");
    println!();
    println!("  Index:       {}", path.display());
    println!("  Size:        {}", format_bytes(size));
    println!("  Built:       {}", format_built_at(&meta.built_at));
    println!();
    println!("  Model:       {} ({} dims)", meta.model, meta.dims);
    if meta.chunking {
        println!(
            "  Chunking:    {} chars, {} overlap",
            meta.chunk_size, meta.chunk_overlap
        );
    } else {
        println!("  Chunking:    off (one entry per item)");
    }
    println!("  Items:       {}", meta.item_count);
    println!("  Entries:     {}", index.len());

    println!();
    println!("  By category:");
    println!("  {:<16} {:>8} {:>8}", "CATEGORY", "ITEMS", "ENTRIES");
    println!("  {}", "-".repeat(34));
    for (category, counts) in &by_category {
        println!(
            "  {:<16} {:>8} {:>8}",
            category.as_str(),
            counts.items,
            counts.entries
        );
    }
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_built_at(built_at: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(built_at)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|_| built_at.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_built_at() {
        assert_eq!(format_built_at("2026-03-04T05:06:07+00:00"), "2026-03-04 05:06 UTC");
        assert_eq!(format_built_at("yesterday"), "yesterday");
    }
}
