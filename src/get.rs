//! Item retrieval by ID.
//!
//! Reads one item from the scraper's file store and shows it together with
//! the chunks the ingestor would produce for it under the current
//! configuration.

use anyhow::{bail, Result};

use crate::chunk::chunk_item;
use crate::config::Config;
use crate::models::ScrapedItem;
use crate::store;

pub fn get_item(config: &Config, id: &str) -> Result<ScrapedItem> {
    match store::find_item(&config.scraper.output_dir, id)? {
        Some(item) => Ok(item),
        None => bail!("item not found: {}", id),
    }
}

/// CLI entry point. Prints the item and its chunks to stdout.
pub fn run_get(config: &Config, id: &str) -> Result<()> {
    let item = get_item(config, id)?;
    let chunks = chunk_item(&item, &config.chunking, config.chunking.enabled);

    println!("--- Item ---");
    println!("id:         {}", item.id);
    println!("title:      {}", item.display_title());
    println!("category:   {}", item.category);
    println!("date:       {}", item.date.as_deref().unwrap_or("(unknown)"));
    if let Some(source) = &item.source {
        println!("source:     {}", source);
    }
    println!("source_url: {}", item.source_url);
    println!("chars:      {}", item.body_text.chars().count());
    println!();

    println!("--- Body ---");
    println!("{}", item.body_text);
    println!();

    println!("--- Chunks ({}) ---", chunks.len());
    for chunk in &chunks {
        println!("[chunk {}] chars {}..{}", chunk.index, chunk.start, chunk.end);
        println!("{}", chunk.text);
        println!();
    }

    Ok(())
}
