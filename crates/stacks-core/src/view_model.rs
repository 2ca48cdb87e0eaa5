//! UI-agnostic view of the active conversation
//!
//! Shared by every front end. Messages are derived from stored chat entries;
//! a question that has been sent but not yet answered is held separately as
//! the pending message so a failed send can be rolled back cleanly.

use crate::chat_log::ChatEntry;
use serde::{Deserialize, Serialize};

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    fn question(index: usize, content: impl Into<String>) -> Self {
        Self {
            id: format!("q-{}", index),
            role: ChatRole::User,
            content: content.into(),
        }
    }

    fn answer(index: usize, content: impl Into<String>) -> Self {
        Self {
            id: format!("a-{}", index),
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Flatten entries into alternating user/assistant turns.
///
/// Entry `i` becomes `q-{i}` then `a-{i}`, so ids stay stable between renders.
pub fn messages_from_entries(entries: &[ChatEntry]) -> Vec<ChatMessage> {
    entries
        .iter()
        .enumerate()
        .flat_map(|(i, entry)| {
            [
                ChatMessage::question(i, entry.question.as_str()),
                ChatMessage::answer(i, entry.response.as_str()),
            ]
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationView {
    committed: Vec<ChatMessage>,
    pending: Option<ChatMessage>,
}

impl ConversationView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[ChatEntry]) -> Self {
        Self {
            committed: messages_from_entries(entries),
            pending: None,
        }
    }

    /// Completed exchanges shown in this view
    fn exchange_count(&self) -> usize {
        self.committed.len() / 2
    }

    /// Show a question optimistically while its answer is outstanding.
    pub fn push_pending(&mut self, question: impl Into<String>) {
        self.pending = Some(ChatMessage::question(self.exchange_count(), question));
    }

    /// Turn the pending question (or `question` if none is pending) into a
    /// committed exchange together with its answer.
    pub fn commit(&mut self, question: &str, response: &str) {
        let index = self.exchange_count();
        let asked = self
            .pending
            .take()
            .unwrap_or_else(|| ChatMessage::question(index, question));
        self.committed.push(asked);
        self.committed.push(ChatMessage::answer(index, response));
    }

    /// Drop the pending question, handing its text back.
    pub fn rollback(&mut self) -> Option<String> {
        self.pending.take().map(|m| m.content)
    }

    pub fn pending(&self) -> Option<&ChatMessage> {
        self.pending.as_ref()
    }

    /// Committed turns followed by the pending question, if any
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.committed.iter().chain(self.pending.iter())
    }

    pub fn len(&self) -> usize {
        self.committed.len() + usize::from(self.pending.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(question: &str, response: &str) -> ChatEntry {
        ChatEntry {
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
            question: question.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn summary<'a>(messages: impl Iterator<Item = &'a ChatMessage>) -> Vec<(ChatRole, String)> {
        messages.map(|m| (m.role, m.content.clone())).collect()
    }

    #[test]
    fn test_entries_flatten_to_alternating_turns() {
        let entries = vec![entry("hi", "hello"), entry("bye", "goodbye")];
        let messages = messages_from_entries(&entries);

        assert_eq!(
            summary(messages.iter()),
            vec![
                (ChatRole::User, "hi".to_string()),
                (ChatRole::Assistant, "hello".to_string()),
                (ChatRole::User, "bye".to_string()),
                (ChatRole::Assistant, "goodbye".to_string()),
            ]
        );
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["q-0", "a-0", "q-1", "a-1"]);
    }

    #[test]
    fn test_pending_then_commit_keeps_id() {
        let mut view = ConversationView::from_entries(&[entry("hi", "hello")]);
        view.push_pending("next?");

        assert_eq!(view.len(), 3);
        assert_eq!(view.pending().map(|m| m.id.as_str()), Some("q-1"));

        view.commit("next?", "sure");
        assert!(view.pending().is_none());

        let ids: Vec<&str> = view.messages().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["q-0", "a-0", "q-1", "a-1"]);
    }

    #[test]
    fn test_rollback_restores_previous_state() {
        let before = ConversationView::from_entries(&[entry("hi", "hello")]);
        let mut view = before.clone();

        view.push_pending("lost?");
        assert_eq!(view.rollback().as_deref(), Some("lost?"));
        assert_eq!(view, before);
        assert_eq!(view.rollback(), None);
    }

    #[test]
    fn test_commit_without_pending() {
        let mut view = ConversationView::new();
        assert!(view.is_empty());

        view.commit("q", "a");
        assert_eq!(
            summary(view.messages()),
            vec![
                (ChatRole::User, "q".to_string()),
                (ChatRole::Assistant, "a".to_string()),
            ]
        );
    }
}
