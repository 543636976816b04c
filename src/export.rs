//! Export the index as JSON.
//!
//! Dumps the build metadata and every entry (citation fields plus text,
//! without vectors) so the corpus can be inspected or reused outside the
//! chat stage.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::index::{IndexMeta, VectorIndex};
use crate::models::IndexEntry;

#[derive(Serialize)]
struct ExportData<'a> {
    meta: &'a IndexMeta,
    entries: &'a [IndexEntry],
}

/// Render the index as pretty JSON.
pub fn export_json(index: &VectorIndex) -> Result<String> {
    let data = ExportData {
        meta: &index.meta,
        entries: index.entries(),
    };
    Ok(serde_json::to_string_pretty(&data)?)
}

/// Export index entries as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let index = VectorIndex::load(&config.index.path).await?;
    let json = export_json(&index)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!("Exported {} entries to {}", index.len(), path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[test]
    fn test_export_omits_vectors() {
        let mut index = VectorIndex::new(IndexMeta {
            model: "m".to_string(),
            dims: 2,
            chunking: false,
            chunk_size: 1000,
            chunk_overlap: 100,
            item_count: 1,
            built_at: "2026-01-01T00:00:00+00:00".to_string(),
        });
        index
            .push(IndexEntry {
                chunk_id: "c".to_string(),
                item_id: "quotes-1".to_string(),
                chunk_index: 0,
                category: Category::Quote,
                title: "Q".to_string(),
                date: None,
                source_url: "https://example.org/quotes/1/".to_string(),
                text: "quote text".to_string(),
                hash: "ab12".to_string(),
                vector: vec![0.5, 0.5],
            })
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&export_json(&index).unwrap()).unwrap();
        assert_eq!(json["meta"]["model"], "m");
        assert_eq!(json["entries"][0]["category"], "quote");
        assert_eq!(json["entries"][0]["hash"], "ab12");
        assert!(json["entries"][0].get("vector").is_none());
    }
}
