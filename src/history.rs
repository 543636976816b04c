//! Chat memory as an explicit, caller-owned list of turns.
//!
//! Nothing is remembered implicitly between [`ChatContext::ask`] calls: the
//! caller keeps a [`Conversation`], passes [`Conversation::turns`] into each
//! call, and records the answer afterwards. How much of the history reaches
//! the model is decided by the prompt budget in [`crate::prompt`].
//!
//! [`ChatContext::ask`]: crate::chat::ChatContext::ask

use crate::models::{Answer, ConversationTurn};

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prior turns, oldest first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Record a completed exchange.
    pub fn record(&mut self, question: &str, answer: &Answer) {
        self.turns.push(ConversationTurn {
            question: question.to_string(),
            answer: answer.text.clone(),
            sources: answer.citations.clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
