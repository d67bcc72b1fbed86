//! Tutor Session
//!
//! Per-process conversation state that is *not* persisted: the running message
//! list sent to the provider, the selected model and chapter, and the running
//! cost of this session. It is independent of the per-chapter ledgers kept in
//! the syllabus document.

use serde::Serialize;

use crate::llm_client::ChatMessage;
use crate::pricing::ModelTier;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Accounting for one exchange of this session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRecord {
    pub chapter: String,
    pub model: ModelTier,
    pub total_tokens: u32,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct TutorSession {
    system_prompt: String,
    messages: Vec<ChatMessage>,
    model: ModelTier,
    selected_chapter: Option<String>,
    exchanges: Vec<ExchangeRecord>,
    total_cost: f64,
}

impl Default for TutorSession {
    fn default() -> Self {
        Self::init_session(DEFAULT_SYSTEM_PROMPT)
    }
}

impl TutorSession {
    /// Starts a session whose message list holds only the system prompt.
    pub fn init_session(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            messages: vec![ChatMessage::system(system_prompt.clone())],
            system_prompt,
            model: ModelTier::default(),
            selected_chapter: None,
            exchanges: Vec::new(),
            total_cost: 0.0,
        }
    }

    /// Clears the conversation and its cost. Model and chapter selection stay.
    pub fn reset_session(&mut self) {
        self.messages = vec![ChatMessage::system(self.system_prompt.clone())];
        self.exchanges.clear();
        self.total_cost = 0.0;
    }

    pub fn select_model(&mut self, model: ModelTier) {
        self.model = model;
    }

    pub fn model(&self) -> ModelTier {
        self.model
    }

    /// Records the chapter the learner is looking at. Callers validate the title.
    pub fn select_chapter(&mut self, title: impl Into<String>) {
        self.selected_chapter = Some(title.into());
    }

    pub fn selected_chapter(&self) -> Option<&str> {
        self.selected_chapter.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn exchanges(&self) -> &[ExchangeRecord] {
        &self.exchanges
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub(crate) fn push_user(&mut self, content: &str) {
        self.messages.push(ChatMessage::user(content));
    }

    pub(crate) fn push_assistant(&mut self, content: &str) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Drops messages past `len`, used to undo a turn that did not commit.
    pub(crate) fn truncate_messages(&mut self, len: usize) {
        self.messages.truncate(len.max(1));
    }

    pub(crate) fn record_exchange(&mut self, record: ExchangeRecord) {
        self.total_cost += record.cost;
        self.exchanges.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::Role;

    #[test]
    fn test_new_session_starts_with_system_prompt() {
        let session = TutorSession::default();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::System);
        assert_eq!(session.messages()[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(session.total_cost(), 0.0);
        assert_eq!(session.model(), ModelTier::Economy);
        assert!(session.selected_chapter().is_none());
    }

    #[test]
    fn test_reset_session_keeps_selection() {
        let mut session = TutorSession::init_session("Teach Python.");
        session.select_model(ModelTier::Premium);
        session.select_chapter("Loops");
        session.push_user("hi");
        session.push_assistant("hello");
        session.record_exchange(ExchangeRecord {
            chapter: "Loops".to_string(),
            model: ModelTier::Premium,
            total_tokens: 10,
            cost: 0.5,
        });

        session.reset_session();

        assert_eq!(session.messages(), &[ChatMessage::system("Teach Python.")]);
        assert!(session.exchanges().is_empty());
        assert_eq!(session.total_cost(), 0.0);
        assert_eq!(session.model(), ModelTier::Premium);
        assert_eq!(session.selected_chapter(), Some("Loops"));
    }

    #[test]
    fn test_messages_keep_every_turn_in_order() {
        let mut session = TutorSession::default();
        for i in 0..3 {
            session.push_user(&format!("q{}", i));
            session.push_assistant(&format!("a{}", i));
        }
        session.push_user("q3");

        let messages = session.messages();
        assert_eq!(messages.len(), 8);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], ChatMessage::user("q0"));
        assert_eq!(messages[6], ChatMessage::assistant("a2"));
        assert_eq!(messages[7], ChatMessage::user("q3"));
    }

    #[test]
    fn test_truncate_never_drops_system_prompt() {
        let mut session = TutorSession::default();
        session.push_user("hi");
        session.truncate_messages(0);
        assert_eq!(session.messages().len(), 1);
    }
}
