//! Error taxonomy for the three pipeline stages.
//!
//! - [`FetchError`]: one page could not be scraped. Recoverable; the item is
//!   skipped and the run continues.
//! - [`BuildError`]: the ingest run cannot produce a trustworthy index. Fatal
//!   for the run; nothing partial is left behind.
//! - [`QueryError`]: one chat request failed. Fatal for that request only; the
//!   user may retry. Setup problems (missing index, model mismatch) are
//!   flagged by [`QueryError::is_setup_error`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid url: {url}")]
    InvalidUrl { url: String },

    #[error("no content extracted from {url}")]
    EmptyContent { url: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Request { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::InvalidUrl { url }
            | FetchError::EmptyContent { url } => url,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no scraped items found in {}", dir.display())]
    NoItems { dir: PathBuf },

    #[error("failed to read item {}: {reason}", path.display())]
    ReadItem { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("an index build needs an embedding provider")]
    NoEmbedder,

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("embedding provider returned {actual} vectors for {expected} texts")]
    VectorCount { expected: usize, actual: usize },

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("failed to persist index: {0}")]
    Persist(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("index not found at {} (run `satoshi ingest` first)", path.display())]
    IndexMissing { path: PathBuf },

    #[error("index at {} is corrupt: {reason}", path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("index at {} contains no entries", path.display())]
    IndexEmpty { path: PathBuf },

    #[error("index was built with embedding model '{index_model}' but '{configured}' is configured")]
    ModelMismatch {
        index_model: String,
        configured: String,
    },

    #[error("embedding has {actual} dimensions but the index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding the question failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("language model call failed: {0:#}")]
    Generation(anyhow::Error),
}

impl QueryError {
    /// Errors that no retry can fix: the index or model setup is wrong.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            QueryError::IndexMissing { .. }
                | QueryError::IndexCorrupt { .. }
                | QueryError::IndexEmpty { .. }
                | QueryError::ModelMismatch { .. }
                | QueryError::DimensionMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_classification() {
        assert!(QueryError::IndexMissing {
            path: PathBuf::from("x")
        }
        .is_setup_error());
        assert!(QueryError::ModelMismatch {
            index_model: "a".into(),
            configured: "b".into()
        }
        .is_setup_error());
        assert!(!QueryError::EmptyQuestion.is_setup_error());
        assert!(!QueryError::Generation(anyhow::anyhow!("boom")).is_setup_error());
    }

    #[test]
    fn test_fetch_error_url() {
        let err = FetchError::Status {
            url: "http://x/emails/1/".into(),
            status: 404,
        };
        assert_eq!(err.url(), "http://x/emails/1/");
        assert!(err.to_string().contains("404"));
    }
}
