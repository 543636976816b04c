//! Core data models used throughout the pipeline.
//!
//! These types represent the scraped items, chunks, index entries, and chat
//! results that flow from the scraper through the ingestor to the chat stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of archive page an item was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "forum-post", alias = "post")]
    Post,
    #[serde(rename = "quote")]
    Quote,
}

impl Category {
    /// Directory name used by the item store.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Email => "emails",
            Category::Post => "posts",
            Category::Quote => "quotes",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Email => "email",
            Category::Post => "forum-post",
            Category::Quote => "quote",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Category::Email),
            "forum-post" | "post" => Some(Category::Post),
            "quote" => Some(Category::Quote),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One archive page, as extracted by the scraper. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedItem {
    /// Stable identifier derived from the URL path (e.g. `emails--cryptography--1`).
    pub id: String,
    pub source_url: String,
    pub title: String,
    pub date: Option<String>,
    /// Mailing list or forum the item appeared on, when the page names it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub category: Category,
    pub body_text: String,
}

impl ScrapedItem {
    /// Title for display, falling back to the identifier.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

/// A window of an item's body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub item_id: String,
    pub index: usize,
    pub text: String,
    /// Character offset (inclusive) of the window in the body.
    pub start: usize,
    /// Character offset (exclusive) of the window in the body.
    pub end: usize,
    /// Hex SHA-256 of `text`.
    pub hash: String,
}

/// A vector plus the metadata needed to cite it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub item_id: String,
    pub chunk_index: usize,
    pub category: Category,
    pub title: String,
    pub date: Option<String>,
    pub source_url: String,
    pub text: String,
    /// Hex SHA-256 of `text`, carried over from the chunk.
    pub hash: String,
    #[serde(skip)]
    pub vector: Vec<f32>,
}

/// A retrieved entry with its similarity to the query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub entry: IndexEntry,
    pub score: f32,
}

/// A source link shown next to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub item_id: String,
    pub title: String,
    pub source_url: String,
}

impl Citation {
    pub fn from_entry(entry: &IndexEntry) -> Self {
        Self {
            item_id: entry.item_id.clone(),
            title: if entry.title.is_empty() {
                entry.item_id.clone()
            } else {
                entry.title.clone()
            },
            source_url: entry.source_url.clone(),
        }
    }
}

/// One completed question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Citation>,
}

/// Result of a chat request.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
    /// Question actually used for retrieval when history rephrasing kicked in.
    pub standalone_question: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&Category::Post).unwrap();
        assert_eq!(json, "\"forum-post\"");
        let back: Category = serde_json::from_str("\"post\"").unwrap();
        assert_eq!(back, Category::Post);
        assert_eq!(Category::parse("quote"), Some(Category::Quote));
        assert_eq!(Category::parse("memo"), None);
    }

    #[test]
    fn test_display_title_falls_back_to_id() {
        let item = ScrapedItem {
            id: "quotes-1".to_string(),
            source_url: "https://example.org/quotes/1/".to_string(),
            title: String::new(),
            date: None,
            source: None,
            category: Category::Quote,
            body_text: "text".to_string(),
        };
        assert_eq!(item.display_title(), "quotes-1");
    }
}
