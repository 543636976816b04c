//! Chat stage: retrieval plus generation.
//!
//! [`ChatContext`] bundles everything a question needs: the loaded index,
//! the embedder that must match it, the language model, and the retrieval
//! settings. It is built once at stage start and passed to every call;
//! there is no process-wide state.
//!
//! # Flow of [`ChatContext::ask`]
//!
//! ```text
//! question ──▶ (rephrase with history) ──▶ embed ──▶ top-k search
//!                                                        │
//!          answer + citations ◀── LLM ◀── budgeted prompt ◀┘
//! ```

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::embedding::{create_embedder, embed_query, Embedder};
use crate::error::QueryError;
use crate::history::Conversation;
use crate::index::VectorIndex;
use crate::llm::{create_chat_model, ChatModel};
use crate::models::{Answer, Citation, ConversationTurn, SearchHit};
use crate::prompt;

/// Retrieval and prompt settings.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub top_k: usize,
    pub max_context_chars: usize,
    pub rephrase_with_history: bool,
}

impl From<&Config> for ChatSettings {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            max_context_chars: config.llm.max_context_chars,
            rephrase_with_history: config.llm.rephrase_with_history,
        }
    }
}

pub struct ChatContext {
    index: VectorIndex,
    embedder: Box<dyn Embedder>,
    llm: Box<dyn ChatModel>,
    settings: ChatSettings,
}

impl ChatContext {
    /// Assemble a context from already-built parts.
    ///
    /// Fails when the embedder is not the one the index was built with.
    pub fn new(
        index: VectorIndex,
        embedder: Box<dyn Embedder>,
        llm: Box<dyn ChatModel>,
        settings: ChatSettings,
    ) -> Result<Self, QueryError> {
        if index.meta.model != embedder.model_name() {
            return Err(QueryError::ModelMismatch {
                index_model: index.meta.model.clone(),
                configured: embedder.model_name().to_string(),
            });
        }
        if index.meta.dims != embedder.dims() {
            return Err(QueryError::DimensionMismatch {
                expected: index.meta.dims,
                actual: embedder.dims(),
            });
        }

        Ok(Self {
            index,
            embedder,
            llm,
            settings,
        })
    }

    /// Load the index and create the configured clients.
    pub async fn open(config: &Config) -> Result<Self> {
        let index = VectorIndex::load(&config.index.path).await?;
        if !config.embedding.is_enabled() {
            bail!("Embedding provider is disabled. Set [embedding] provider to the one the index was built with.");
        }
        let embedder = create_embedder(&config.embedding)?;
        let llm = create_chat_model(&config.llm)?;
        tracing::info!(
            entries = index.len(),
            model = %index.meta.model,
            llm = llm.model_name(),
            "chat context ready"
        );
        Ok(Self::new(index, embedder, llm, ChatSettings::from(config))?)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Embed `query` and return the top-k hits.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchHit>, QueryError> {
        let vector = embed_query(self.embedder.as_ref(), query)
            .await
            .map_err(QueryError::Embedding)?;
        self.index.search(&vector, self.settings.top_k)
    }

    /// Answer `question` given the prior turns of the conversation.
    pub async fn ask(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<Answer, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        let standalone = if !history.is_empty() && self.settings.rephrase_with_history {
            self.rephrase(question, history).await
        } else {
            None
        };
        let retrieval_query = standalone.as_deref().unwrap_or(question);

        let hits = self.retrieve(retrieval_query).await?;
        let plan = prompt::build_messages(
            question,
            &hits,
            history,
            self.settings.max_context_chars,
        );
        if plan.used_hits < hits.len() || plan.used_turns < history.len() {
            tracing::info!(
                hits = plan.used_hits,
                of_hits = hits.len(),
                turns = plan.used_turns,
                of_turns = history.len(),
                "prompt trimmed to fit context budget"
            );
        }

        let text = self
            .llm
            .complete(&plan.messages)
            .await
            .map_err(QueryError::Generation)?;

        Ok(Answer {
            text: text.trim().to_string(),
            citations: citations(&hits[..plan.used_hits]),
            standalone_question: standalone,
        })
    }

    /// Ask the model for a standalone question. Falls back to `None` on failure.
    async fn rephrase(&self, question: &str, history: &[ConversationTurn]) -> Option<String> {
        let messages =
            prompt::rephrase_messages(question, history, self.settings.max_context_chars);
        match self.llm.complete(&messages).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    None
                } else {
                    tracing::debug!(standalone = text, "rephrased question");
                    Some(text.to_string())
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "rephrasing failed, retrieving with the raw question");
                None
            }
        }
    }
}

/// Citations for hits, deduplicated by source URL in rank order.
pub fn citations(hits: &[SearchHit]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter(|hit| seen.insert(hit.entry.source_url.clone()))
        .map(|hit| Citation::from_entry(&hit.entry))
        .collect()
}

/// Numbered markdown list of source links.
pub fn render_sources(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let mut out = String::from("**Sources:**\n");
    for (i, c) in citations.iter().enumerate() {
        out.push_str(&format!("{}. [{}]({})\n", i + 1, c.title, c.source_url));
    }
    out
}

/// `satoshi ask`: answer one question.
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let ctx = ChatContext::open(config).await?;
    let answer = ctx.ask(question, &[]).await?;

    println!("{}", answer.text);
    if !answer.citations.is_empty() {
        println!();
        print!("{}", render_sources(&answer.citations));
    }
    Ok(())
}

/// `satoshi chat`: interactive session on stdin with conversation memory.
///
/// `/reset` clears the history; `exit`, `quit` or end of input ends the session.
pub async fn run_chat(config: &Config) -> Result<()> {
    let ctx = ChatContext::open(config).await?;
    let mut conversation = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "Ask about Satoshi Nakamoto's emails, posts and quotes ({} indexed passages).",
        ctx.index().len()
    );
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                conversation.clear();
                println!("history cleared");
                continue;
            }
            _ => {}
        }

        match ctx.ask(line, conversation.turns()).await {
            Ok(answer) => {
                println!("{}", answer.text);
                if !answer.citations.is_empty() {
                    println!();
                    print!("{}", render_sources(&answer.citations));
                }
                println!();
                conversation.record(line, &answer);
            }
            Err(e) if e.is_setup_error() => return Err(e.into()),
            Err(e) => eprintln!("error: {}", e),
        }
    }

    Ok(())
}
