//! Retrieval without generation.
//!
//! `satoshi search` embeds the query with the index's model and prints the
//! ranked passages. Useful for checking what the chat stage will see before
//! a language model is involved.

use anyhow::Result;

use crate::chat::ChatContext;
use crate::config::Config;
use crate::models::SearchHit;

/// Shorten `text` to at most `max_chars` characters on one line.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    if let Some(pos) = cut.rfind(' ') {
        cut.truncate(pos);
    }
    cut.push_str("...");
    cut
}

/// Print ranked hits.
pub fn print_hits(hits: &[SearchHit], snippet_chars: usize) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        let entry = &hit.entry;
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            hit.score,
            entry.category,
            entry.title
        );
        if let Some(date) = &entry.date {
            println!("    date: {}", date);
        }
        println!("    url: {}", entry.source_url);
        println!("    excerpt: \"{}\"", snippet(&entry.text, snippet_chars));
        println!("    id: {} (chunk {})", entry.item_id, entry.chunk_index);
        println!();
    }
}

pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let mut config = config.clone();
    if let Some(k) = limit {
        config.retrieval.top_k = k.max(1);
    }

    let ctx = ChatContext::open(&config).await?;
    let hits = ctx.retrieve(query).await?;
    print_hits(&hits, config.retrieval.snippet_chars);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_short_text_unchanged() {
        assert_eq!(snippet("a  b\nc", 20), "a b c");
    }

    #[test]
    fn test_snippet_cuts_on_word_boundary() {
        let s = snippet("the quick brown fox jumps", 12);
        assert_eq!(s, "the quick...");
    }
}
