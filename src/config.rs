//! TOML configuration parsing and validation.
//!
//! Every stage reads the same file (default `./config/satoshi.toml`).
//! Only the sections a stage needs must be meaningful, but the whole file is
//! validated up front so a bad value fails before any network or disk work.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::Category;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_sections")]
    pub sections: Vec<SectionConfig>,
}

/// One archive index page to walk.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SectionConfig {
    pub category: Category,
    /// Path of the index page relative to `base_url`, e.g. `/emails/`.
    pub path: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            output_dir: default_output_dir(),
            user_agent: default_user_agent(),
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_timeout_secs(),
            sections: default_sections(),
        }
    }
}

fn default_base_url() -> String {
    "https://satoshi.nakamotoinstitute.org".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./data/items")
}
fn default_user_agent() -> String {
    concat!("satoshi-rag/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_request_delay_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_sections() -> Vec<SectionConfig> {
    vec![
        SectionConfig {
            category: Category::Email,
            path: "/emails/".to_string(),
        },
        SectionConfig {
            category: Category::Post,
            path: "/posts/".to_string(),
        },
        SectionConfig {
            category: Category::Quote,
            path: "/quotes/".to_string(),
        },
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Window length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by consecutive windows.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            raw_dir: default_raw_dir(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/satoshi.index")
}
fn default_raw_dir() -> PathBuf {
    PathBuf::from("./data/raw")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 32,
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Character budget for the whole prompt (system + history + context + question).
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_true")]
    pub rephrase_with_history: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
            max_context_chars: default_max_context_chars(),
            rephrase_with_history: true,
        }
    }
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}
fn default_llm_model() -> String {
    "llama3.2:1b".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_max_context_chars() -> usize {
    12_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_snippet_chars() -> usize {
    240
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.scraper.sections.is_empty() {
        anyhow::bail!("scraper.sections must not be empty");
    }
    for section in &config.scraper.sections {
        if !section.path.starts_with('/') {
            anyhow::bail!(
                "scraper.sections path must start with '/': '{}'",
                section.path
            );
        }
    }

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.llm.max_context_chars == 0 {
        anyhow::bail!("llm.max_context_chars must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "ollama" | "openai" => {}
        "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, openai, or local.",
            other
        ),
    }

    // The local provider resolves its own defaults.
    if config.embedding.is_enabled() && config.embedding.provider != "local" {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.llm.provider.as_str() {
        "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be ollama or openai.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.scraper.sections.len(), 3);
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.chunk_overlap, 100);
        assert_eq!(cfg.retrieval.top_k, 4);
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(cfg.llm.provider, "ollama");
    }

    #[test]
    fn test_full_file() {
        let cfg = parse_config(
            r#"
[scraper]
base_url = "http://127.0.0.1:9999"
output_dir = "/tmp/items"
request_delay_ms = 0

[[scraper.sections]]
category = "quote"
path = "/quotes/"

[chunking]
chunk_size = 200
chunk_overlap = 50

[embedding]
provider = "ollama"
model = "granite-embedding:30m"
dims = 384

[llm]
model = "llama3.2:1b"
max_context_chars = 4000
"#,
        )
        .unwrap();
        assert_eq!(cfg.scraper.sections.len(), 1);
        assert_eq!(cfg.scraper.sections[0].category, Category::Quote);
        assert_eq!(cfg.chunking.chunk_size, 200);
        assert_eq!(cfg.embedding.dims, Some(384));
        assert_eq!(cfg.llm.max_context_chars, 4000);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = parse_config("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_enabled_provider_requires_dims() {
        let err = parse_config("[embedding]\nprovider = \"ollama\"\nmodel = \"m\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_unknown_llm_provider() {
        let err = parse_config("[llm]\nprovider = \"mystery\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn test_section_path_must_be_absolute() {
        let err = parse_config(
            "[[scraper.sections]]\ncategory = \"email\"\npath = \"emails/\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }
}
