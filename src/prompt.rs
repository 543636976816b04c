//! Prompt assembly.
//!
//! Builds the message list sent to the language model: instructions, the
//! numbered context block, prior turns, and the question. The whole list is
//! kept within a character budget:
//!
//! 1. The instructions, the question and its retrieved context are
//!    mandatory. If they alone exceed the budget, the lowest-ranked
//!    snippets are dropped, always keeping at least one.
//! 2. Prior turns fill what is left, newest first. The first turn that does
//!    not fit ends the history; older turns are dropped.
//!
//! The rephrase request that precedes a follow-up question follows the same
//! rule for its transcript.

use crate::llm::ChatMessage;
use crate::models::{ConversationTurn, SearchHit};

pub const SYSTEM_PROMPT: &str = "You answer questions about Satoshi Nakamoto using the provided \
context: Satoshi Nakamoto's emails, quotes, and forum posts. Cite specific sources with their \
bracketed numbers (e.g. [1]) and mention the email date or forum post title when referencing \
context. If the question refers to an unspecified person, assume it is Satoshi Nakamoto. If the \
context is insufficient or contradictory, state this clearly and do not speculate. Provide a \
concise, factual, and neutral answer.";

const REPHRASE_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question that can be understood without the \
conversation. Reply with the standalone question only.";

/// Messages to send, and how much of the input made it in.
#[derive(Debug, Clone)]
pub struct PromptPlan {
    pub messages: Vec<ChatMessage>,
    /// Number of leading hits included in the context block.
    pub used_hits: usize,
    /// Number of most recent turns included.
    pub used_turns: usize,
}

/// Render hits as a numbered context block.
///
/// ```text
/// [1] Bitcoin P2P e-cash paper | 2008-10-31 | https://.../emails/cryptography/1/
/// I've been working on a new electronic cash system...
/// ```
pub fn render_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "(no context retrieved)\n".to_string();
    }

    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let entry = &hit.entry;
        out.push_str(&format!("[{}] {}", i + 1, entry.title));
        if let Some(date) = &entry.date {
            out.push_str(&format!(" | {}", date));
        }
        out.push_str(&format!(" | {}\n{}\n\n", entry.source_url, entry.text.trim()));
    }
    out
}

fn question_message(question: &str, hits: &[SearchHit]) -> ChatMessage {
    ChatMessage::user(format!(
        "Context:\n{}Question: {}\n\nAnswer:",
        render_context(hits),
        question
    ))
}

fn char_len(message: &ChatMessage) -> usize {
    message.content.chars().count()
}

/// Build the budgeted message list for one question.
pub fn build_messages(
    question: &str,
    hits: &[SearchHit],
    history: &[ConversationTurn],
    max_chars: usize,
) -> PromptPlan {
    let system = ChatMessage::system(SYSTEM_PROMPT);

    let mut used_hits = hits.len();
    let mut final_message = question_message(question, &hits[..used_hits]);
    while used_hits > 1 && char_len(&system) + char_len(&final_message) > max_chars {
        used_hits -= 1;
        final_message = question_message(question, &hits[..used_hits]);
    }

    let remaining = max_chars.saturating_sub(char_len(&system) + char_len(&final_message));
    let kept = recent_turns(history, remaining, 0);

    let mut messages = Vec::with_capacity(2 + kept.len() * 2);
    messages.push(system);
    for turn in kept {
        messages.push(ChatMessage::user(turn.question.clone()));
        messages.push(ChatMessage::assistant(turn.answer.clone()));
    }
    messages.push(final_message);

    PromptPlan {
        messages,
        used_hits,
        used_turns: kept.len(),
    }
}

/// The longest run of most recent turns whose cost fits in `budget`.
///
/// A turn costs its question and answer characters plus `overhead`.
fn recent_turns(
    history: &[ConversationTurn],
    budget: usize,
    overhead: usize,
) -> &[ConversationTurn] {
    let mut remaining = budget;
    let mut kept = 0;
    for turn in history.iter().rev() {
        let cost = turn.question.chars().count() + turn.answer.chars().count() + overhead;
        if cost > remaining {
            break;
        }
        remaining -= cost;
        kept += 1;
    }
    &history[history.len() - kept..]
}

fn transcript_line(question: &str, answer: &str) -> String {
    format!("Human: {}\nAssistant: {}\n", question, answer)
}

fn rephrase_request(transcript: &str, question: &str) -> ChatMessage {
    ChatMessage::user(format!(
        "Chat history:\n{}\nFollow up question: {}\nStandalone question:",
        transcript, question
    ))
}

/// Messages asking the model to turn a follow-up into a standalone question.
///
/// The transcript keeps as many of the most recent turns as fit in
/// `max_chars` alongside the instructions and the question.
pub fn rephrase_messages(
    question: &str,
    history: &[ConversationTurn],
    max_chars: usize,
) -> Vec<ChatMessage> {
    let system = ChatMessage::system(REPHRASE_PROMPT);
    let mandatory = char_len(&system) + char_len(&rephrase_request("", question));
    let overhead = transcript_line("", "").chars().count();
    let kept = recent_turns(history, max_chars.saturating_sub(mandatory), overhead);

    let transcript: String = kept
        .iter()
        .map(|turn| transcript_line(&turn.question, &turn.answer))
        .collect();

    vec![system, rephrase_request(&transcript, question)]
}
