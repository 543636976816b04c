//! Archive scraper.
//!
//! Walks the configured section index pages, follows every item link, and
//! extracts title, date and body text from each item page. Pages are fetched
//! sequentially with a politeness delay between item requests.
//!
//! # Skip-and-continue
//!
//! A failure for one page (network error, non-2xx status, nothing
//! extractable) never aborts the run. The page is logged with
//! `tracing::warn!`, recorded in [`ScrapeReport::skipped`], and the run
//! moves on. There is no retry and no resume state; a re-run fetches
//! everything again.
//!
//! # Body extraction
//!
//! Each category has its own selector cascade, tried in order. The first
//! candidate element with enough text wins; `main` is the last resort.
//!
//! | Category | Cascade |
//! |----------|---------|
//! | email | `section.px-8.py-4` → `section.font-mono` (>50 chars) → `main` |
//! | forum-post | `div.post` → `main` |
//! | quote | `div.quote-content` → `section.px-8` → `div.prose` → `blockquote` → `main section` (>50 chars) → `main` |
//!
//! Text inside `nav`, `footer`, `script` and `style` is dropped. Line
//! structure is kept and the body is never truncated.

use anyhow::{anyhow, Result};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::config::{Config, ScraperConfig, SectionConfig};
use crate::error::FetchError;
use crate::models::{Category, ScrapedItem};
use crate::store;

/// Elements whose text never belongs to an item body.
const EXCLUDED_TAGS: &[&str] = &["nav", "footer", "script", "style", "noscript", "template"];

/// A page that was not turned into an item.
#[derive(Debug)]
pub struct SkippedPage {
    pub url: String,
    pub error: FetchError,
}

/// Outcome of one scrape run.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Items keyed by identifier. Identifiers are unique by construction.
    pub items: BTreeMap<String, ScrapedItem>,
    pub skipped: Vec<SkippedPage>,
    pub sections: usize,
    pub links_found: usize,
    /// Links that resolved to an identifier already collected.
    pub duplicates: usize,
}

/// Scraper context. Owns the HTTP client for the whole run.
pub struct Scraper {
    client: reqwest::Client,
    base: Url,
    sections: Vec<SectionConfig>,
    delay: Duration,
    extractors: Extractors,
}

impl Scraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| anyhow!("invalid scraper.base_url '{}': {}", config.base_url, e))?;
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base,
            sections: config.sections.clone(),
            delay: Duration::from_millis(config.request_delay_ms),
            extractors: Extractors::new()?,
        })
    }

    /// Scrape every configured section.
    pub async fn scrape_all(&self) -> ScrapeReport {
        let mut report = ScrapeReport {
            sections: self.sections.len(),
            ..Default::default()
        };
        let mut first_request = true;

        for section in &self.sections {
            tracing::info!(category = %section.category, path = %section.path, "scraping section");

            let links = match self.discover(section).await {
                Ok(links) => links,
                Err(error) => {
                    tracing::warn!(url = error.url(), %error, "skipping section index");
                    report.skipped.push(SkippedPage {
                        url: error.url().to_string(),
                        error,
                    });
                    continue;
                }
            };
            tracing::info!(category = %section.category, links = links.len(), "found item links");
            report.links_found += links.len();

            for url in links {
                if !first_request && !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                first_request = false;

                match self.scrape_item(&url, section.category).await {
                    Ok(item) => {
                        if report.items.contains_key(&item.id) {
                            tracing::warn!(id = %item.id, url = %url, "duplicate item id, ignoring");
                            report.duplicates += 1;
                            continue;
                        }
                        tracing::debug!(
                            id = %item.id,
                            chars = item.body_text.chars().count(),
                            "scraped item"
                        );
                        report.items.insert(item.id.clone(), item);
                    }
                    Err(error) => {
                        tracing::warn!(url = %url, %error, "skipping item");
                        report.skipped.push(SkippedPage {
                            url: url.to_string(),
                            error,
                        });
                    }
                }
            }
        }

        report
    }

    /// Fetch a section index page and return its item links in page order.
    pub async fn discover(&self, section: &SectionConfig) -> Result<Vec<Url>, FetchError> {
        let index_url = self
            .base
            .join(&section.path)
            .map_err(|_| FetchError::InvalidUrl {
                url: format!("{}{}", self.base, section.path),
            })?;
        let html = self.fetch(&index_url).await?;
        Ok(extract_links(&html, &index_url, &section.path))
    }

    /// Fetch and extract one item page.
    pub async fn scrape_item(&self, url: &Url, category: Category) -> Result<ScrapedItem, FetchError> {
        let html = self.fetch(url).await?;
        self.extractors.extract(&html, url, category)
    }

    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        tracing::debug!(url = %url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }
}

/// Extract item links from a section index page.
///
/// Keeps links on the same host whose path contains `section_path` and is
/// not the section page itself. Fragments and queries are dropped and
/// duplicates removed, preserving first-seen order.
pub fn extract_links(html: &str, page_url: &Url, section_path: &str) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut url) = page_url.join(href) else {
            continue;
        };
        url.set_fragment(None);
        url.set_query(None);

        if url.host_str() != page_url.host_str() || url.port() != page_url.port() {
            continue;
        }
        let path = url.path();
        if !path.contains(section_path) || path == section_path {
            continue;
        }
        if seen.insert(url.to_string()) {
            links.push(url);
        }
    }
    links
}

/// Stable item identifier from the URL path.
///
/// `/emails/cryptography/1/` → `emails--cryptography--1`. Characters other
/// than ASCII alphanumerics, `-`, `_` and `.` become `_`. Path segments are
/// joined with `--` so that `/x/a-b/` and `/x/a/b/` stay distinct.
pub fn item_id_from_url(url: &Url) -> Option<String> {
    let segments: Vec<String> = url
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect()
        })
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("--"))
    }
}

struct Candidate {
    selector: Selector,
    min_chars: usize,
}

/// Pre-parsed selectors for every category.
struct Extractors {
    email: Vec<Candidate>,
    post: Vec<Candidate>,
    quote: Vec<Candidate>,
    title: Selector,
    page_title: Selector,
    time: Selector,
    source: Selector,
    email_header: Selector,
}

impl Extractors {
    fn new() -> Result<Self> {
        Ok(Self {
            email: cascade(&[
                ("section.px-8.py-4", 0),
                ("section.font-mono", 50),
                ("main", 0),
            ])?,
            post: cascade(&[("div.post", 0), ("main", 0)])?,
            quote: cascade(&[
                ("div.quote-content", 50),
                ("section.px-8", 50),
                ("div.prose", 50),
                ("blockquote", 50),
                ("main section", 50),
                ("main", 0),
            ])?,
            title: selector("h1")?,
            page_title: selector("title")?,
            time: selector("time")?,
            source: selector("h2.small-caps")?,
            email_header: selector("header div.grid")?,
        })
    }

    fn extract(&self, html: &str, url: &Url, category: Category) -> Result<ScrapedItem, FetchError> {
        let id = item_id_from_url(url).ok_or_else(|| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        let document = Html::parse_document(html);

        let candidates = match category {
            Category::Email => &self.email,
            Category::Post => &self.post,
            Category::Quote => &self.quote,
        };

        let mut body_text = candidates
            .iter()
            .find_map(|candidate| {
                document.select(&candidate.selector).find_map(|element| {
                    let text = element_text(element);
                    (!text.is_empty() && text.chars().count() > candidate.min_chars).then_some(text)
                })
            })
            .unwrap_or_default();

        let header = match category {
            Category::Email => document.select(&self.email_header).next().map(header_fields),
            _ => None,
        };

        if body_text.is_empty() {
            return Err(FetchError::EmptyContent {
                url: url.to_string(),
            });
        }

        if let Some(fields) = &header {
            if !fields.is_empty() {
                body_text = format!("{}\n{}", fields.join(" | "), body_text);
            }
        }

        let title = document
            .select(&self.title)
            .next()
            .or_else(|| document.select(&self.page_title).next())
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .unwrap_or_default();

        let date = document
            .select(&self.time)
            .next()
            .and_then(|el| {
                el.value()
                    .attr("datetime")
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
                    .or_else(|| {
                        let text = collapse_whitespace(&el.text().collect::<String>());
                        (!text.is_empty()).then_some(text)
                    })
            })
            .or_else(|| header.as_deref().and_then(header_date));

        let source = document
            .select(&self.source)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty());

        Ok(ScrapedItem {
            id,
            source_url: url.to_string(),
            title,
            date,
            source,
            category,
            body_text,
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid CSS selector '{}': {:?}", css, e))
}

fn cascade(candidates: &[(&str, usize)]) -> Result<Vec<Candidate>> {
    candidates
        .iter()
        .map(|(css, min_chars)| {
            Ok(Candidate {
                selector: selector(css)?,
                min_chars: *min_chars,
            })
        })
        .collect()
}

/// Text of `root`, one trimmed line per source line, skipping excluded
/// subtrees.
fn element_text(root: ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let excluded = node
            .ancestors()
            .take_while(|ancestor| ancestor.id() != root.id())
            .filter_map(ElementRef::wrap)
            .any(|el| EXCLUDED_TAGS.contains(&el.value().name()));
        if excluded {
            continue;
        }
        lines.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
    lines.join("\n")
}

/// Text pieces of an email header grid (`From:`, `Subject:`, `Date:` and their values).
fn header_fields(grid: ElementRef<'_>) -> Vec<String> {
    grid.text()
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
        .collect()
}

fn header_date(fields: &[String]) -> Option<String> {
    let pos = fields.iter().position(|f| f == "Date:")?;
    fields.get(pos + 1).cloned()
}

fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim().to_string()
}

/// `satoshi scrape`: scrape every section and write the item store.
pub async fn run_scrape(config: &Config) -> Result<()> {
    let scraper = Scraper::new(&config.scraper)?;
    let report = scraper.scrape_all().await;

    let out_dir = &config.scraper.output_dir;
    let written = store::replace_items(out_dir, report.items.values())?;

    println!("scrape {}", config.scraper.base_url);
    println!("  sections: {}", report.sections);
    println!("  links found: {}", report.links_found);
    println!("  fetched: {} items", report.items.len());
    println!("  skipped: {}", report.skipped.len());
    for skipped in &report.skipped {
        println!("    {}: {}", skipped.url, skipped.error);
    }
    if report.duplicates > 0 {
        println!("  duplicates ignored: {}", report.duplicates);
    }
    println!("  written: {} files to {}", written, out_dir.display());
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_item_id_from_url() {
        assert_eq!(
            item_id_from_url(&url("https://x.org/emails/cryptography/1/")).as_deref(),
            Some("emails--cryptography--1")
        );
        assert_eq!(
            item_id_from_url(&url("https://x.org/quotes/a b/")).as_deref(),
            Some("quotes--a_20b")
        );
        assert_eq!(item_id_from_url(&url("https://x.org/")), None);
    }

    #[test]
    fn test_item_ids_keep_slug_hyphens_apart_from_segments() {
        let joined = item_id_from_url(&url("https://x.org/quotes/a-b/")).unwrap();
        let nested = item_id_from_url(&url("https://x.org/quotes/a/b/")).unwrap();
        assert_eq!(joined, "quotes--a-b");
        assert_eq!(nested, "quotes--a--b");
        assert_ne!(joined, nested);
    }

    #[test]
    fn test_extract_links_filters_and_dedups() {
        let html = r#"
            <html><body>
              <nav><a href="/emails/">All emails</a></nav>
              <a href="/emails/cryptography/1/">One</a>
              <a href="/emails/cryptography/2/#top">Two</a>
              <a href="/emails/cryptography/1/">One again</a>
              <a href="/posts/3/">Post</a>
              <a href="https://elsewhere.org/emails/9/">Offsite</a>
              <a href="cryptography/3/?page=2">Relative</a>
            </body></html>
        "#;
        let page = url("https://x.org/emails/");
        let links: Vec<String> = extract_links(html, &page, "/emails/")
            .iter()
            .map(Url::to_string)
            .collect();
        assert_eq!(
            links,
            vec![
                "https://x.org/emails/cryptography/1/",
                "https://x.org/emails/cryptography/2/",
                "https://x.org/emails/cryptography/3/",
            ]
        );
    }

    #[test]
    fn test_extract_email_with_header_date() {
        let html = r#"
            <html><body><main>
              <h1>Bitcoin P2P e-cash paper</h1>
              <h2 class="small-caps">Cryptography   Mailing List</h2>
              <header class="border-b font-mono">
                <div class="grid"><span>From:</span><span>Satoshi Nakamoto</span>
                <span>Date:</span><span>2008-10-31</span></div>
              </header>
              <section class="px-8 py-4 font-mono">
                I've been working on a new electronic cash system
                that's fully peer-to-peer, with no trusted third party.
              </section>
              <footer>Copyright</footer>
            </main></body></html>
        "#;
        let ex = Extractors::new().unwrap();
        let item = ex
            .extract(html, &url("https://x.org/emails/cryptography/1/"), Category::Email)
            .unwrap();
        assert_eq!(item.id, "emails--cryptography--1");
        assert_eq!(item.title, "Bitcoin P2P e-cash paper");
        assert_eq!(item.date.as_deref(), Some("2008-10-31"));
        assert_eq!(item.source.as_deref(), Some("Cryptography Mailing List"));
        assert!(item.body_text.starts_with("From: | Satoshi Nakamoto | Date: | 2008-10-31\n"));
        assert!(item
            .body_text
            .ends_with("I've been working on a new electronic cash system\nthat's fully peer-to-peer, with no trusted third party."));
        assert!(!item.body_text.contains("Copyright"));
    }

    #[test]
    fn test_extract_post_falls_back_to_main_without_nav() {
        let html = r#"
            <html><body><main>
              <nav>Home | Posts</nav>
              <h1>Bitcoin open source implementation</h1>
              <time datetime="2009-02-11">February 11, 2009</time>
              <p>I've developed a new open source P2P e-cash system called Bitcoin.</p>
              <footer>Footer text</footer>
            </main></body></html>
        "#;
        let ex = Extractors::new().unwrap();
        let item = ex
            .extract(html, &url("https://x.org/posts/p2pfoundation/1/"), Category::Post)
            .unwrap();
        assert_eq!(item.date.as_deref(), Some("2009-02-11"));
        assert!(item.body_text.contains("open source P2P e-cash"));
        assert!(!item.body_text.contains("Home | Posts"));
        assert!(!item.body_text.contains("Footer text"));
    }

    #[test]
    fn test_extract_quote_prefers_substantial_container() {
        let long = "The nature of Bitcoin is such that once version 0.1 was released, the core design was set in stone for the rest of its lifetime.";
        let html = format!(
            r#"<html><body><main>
                 <h1>Bitcoin Design</h1>
                 <div class="quote-content">short</div>
                 <blockquote>{}</blockquote>
               </main></body></html>"#,
            long
        );
        let ex = Extractors::new().unwrap();
        let item = ex
            .extract(&html, &url("https://x.org/quotes/bitcoin-design/"), Category::Quote)
            .unwrap();
        assert_eq!(item.body_text, long);
        assert_eq!(item.date, None);
        assert_eq!(item.source, None);
    }

    #[test]
    fn test_empty_page_is_fetch_error() {
        let ex = Extractors::new().unwrap();
        let err = ex
            .extract("<html><body></body></html>", &url("https://x.org/posts/1/"), Category::Post)
            .unwrap_err();
        assert!(matches!(err, FetchError::EmptyContent { .. }));
    }
}
