#![allow(dead_code)]

use async_trait::async_trait;
use axum::{response::Html, routing::get, Router};
use satoshi_rag::embedding::Embedder;
use satoshi_rag::llm::{ChatMessage, ChatModel};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

/// Deterministic bag-of-words embedder: every lowercase word adds 1.0 to
/// the bucket its SHA-256 selects.
pub struct HashEmbedder {
    pub name: String,
    pub dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            name: "test-hash".to_string(),
            dims,
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bytes) % self.dims as u64) as usize;
            v[bucket] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Language model double: returns a fixed reply and records every prompt.
#[derive(Clone)]
pub struct CannedModel {
    pub reply: String,
    pub calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl CannedModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ChatModel for CannedModel {
    fn model_name(&self) -> &str {
        "canned"
    }
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

pub const QUOTE_BODY: &str = "The nature of Bitcoin is such that once version 0.1 was released, \
the core design was set in stone for the rest of its lifetime.";

const EMAILS_INDEX: &str = r#"<html><body><main>
<nav><a href="/emails/">Emails</a> <a href="/quotes/">Quotes</a></nav>
<ul>
  <li><a href="/emails/cryptography/1/">Bitcoin P2P e-cash paper</a></li>
  <li><a href="/emails/cryptography/2/">Re: Bitcoin P2P e-cash paper</a></li>
  <li><a href="/emails/cryptography/3/">Missing email</a></li>
</ul>
</main></body></html>"#;

const EMAIL_1: &str = r#"<html><body><main>
<h1>Bitcoin P2P e-cash paper</h1>
<header class="border-b font-mono"><div class="grid">
  <span>From:</span><span>Satoshi Nakamoto</span><span>Date:</span><span>2008-10-31</span>
</div></header>
<section class="px-8 py-4 font-mono">
I've been working on a new electronic cash system that's fully
peer-to-peer, with no trusted third party. The network prevents
double-spending with a peer-to-peer network.
</section>
<footer>Satoshi Nakamoto Institute</footer>
</main></body></html>"#;

const EMAIL_2: &str = r#"<html><body><main>
<h1>Re: Bitcoin P2P e-cash paper</h1>
<time datetime="2008-11-03">November 3, 2008</time>
<section class="px-8 py-4 font-mono">
Proof-of-work has the nice property that it can be relayed through
untrusted middlemen. The timestamp server chains blocks of hashes.
</section>
</main></body></html>"#;

const QUOTES_INDEX: &str = r#"<html><body><main>
<a href="/quotes/">All quotes</a>
<a href="/quotes/bitcoin-design/">Bitcoin Design</a>
<a href="/quotes/transactions/">Transactions</a>
<a href="/quotes/bitcoin-design/#quote">Bitcoin Design (again)</a>
</main></body></html>"#;

const QUOTE_TRANSACTIONS: &str = r#"<html><body><main>
<h1>Transactions</h1>
<blockquote>
Transaction fees will be an incentive for nodes once the coin supply
has been distributed, so the system can remain free of inflation.
</blockquote>
</main></body></html>"#;

fn quote_design_page() -> String {
    format!(
        r#"<html><body><main>
<h1>Bitcoin Design</h1>
<time datetime="2010-06-17">June 17, 2010</time>
<div class="quote-content">{}</div>
</main></body></html>"#,
        QUOTE_BODY
    )
}

/// Local stand-in for the archive: two section index pages linking five
/// items, one of which (`/emails/cryptography/3/`) returns 404.
pub fn fixture_site() -> Router {
    fixture_site_without(&[])
}

/// The fixture archive with the pages at `missing` answering 404.
pub fn fixture_site_without(missing: &[&str]) -> Router {
    let pages = [
        ("/emails/", EMAILS_INDEX.to_string()),
        ("/emails/cryptography/1/", EMAIL_1.to_string()),
        ("/emails/cryptography/2/", EMAIL_2.to_string()),
        ("/quotes/", QUOTES_INDEX.to_string()),
        ("/quotes/bitcoin-design/", quote_design_page()),
        ("/quotes/transactions/", QUOTE_TRANSACTIONS.to_string()),
    ];

    let mut router = Router::new();
    for (path, html) in pages {
        if missing.contains(&path) {
            continue;
        }
        router = router.route(
            path,
            get(move || {
                let html = html.clone();
                async move { Html(html) }
            }),
        );
    }
    router
}

/// Serve `router` on an ephemeral local port; returns `http://127.0.0.1:<port>`.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Config text pointing every stage at `root` and the scraper at `base_url`.
pub fn config_toml(root: &std::path::Path, base_url: &str) -> String {
    format!(
        r#"[scraper]
base_url = "{base}"
output_dir = "{root}/items"
request_delay_ms = 0
timeout_secs = 5

[[scraper.sections]]
category = "email"
path = "/emails/"

[[scraper.sections]]
category = "quote"
path = "/quotes/"

[chunking]
chunk_size = 200
chunk_overlap = 50

[index]
path = "{root}/data/satoshi.index"
raw_dir = "{root}/data/raw"

[retrieval]
top_k = 2
"#,
        base = base_url,
        root = root.display()
    )
}
