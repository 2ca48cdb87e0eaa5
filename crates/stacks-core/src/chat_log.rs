//! Persisted log of question/response pairs
//!
//! The whole log is one JSON array under [`CHAT_HISTORY_KEY`]. Appending reads
//! the array, pushes one entry and writes the array back; sessions are derived
//! by grouping on every read.

use crate::identity::UserId;
use crate::storage::{SharedStore, CHAT_HISTORY_KEY};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One completed exchange with the ask endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub user_id: String,
    pub session_id: String,
    pub question: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// All entries of one conversation thread, in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub chats: Vec<ChatEntry>,
}

impl ChatSession {
    /// First question of the thread, cut to `max_chars` with a trailing "..."
    pub fn title(&self, max_chars: usize) -> String {
        let Some(first) = self.chats.first() else {
            return String::new();
        };

        if first.question.chars().count() > max_chars {
            let cut: String = first.question.chars().take(max_chars).collect();
            format!("{}...", cut)
        } else {
            first.question.clone()
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.chats.first().map(|c| c.timestamp)
    }
}

/// Generate an identifier for a new conversation thread
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Clone)]
pub struct ChatLog {
    store: SharedStore,
}

impl ChatLog {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// The stored array as-is. Unreadable or corrupt data counts as empty.
    fn load_raw(&self) -> Vec<serde_json::Value> {
        let raw = match self.store.get(CHAT_HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "chat log unreadable, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "chat log is corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    /// Every readable entry, oldest first. Malformed entries are skipped.
    fn load(&self) -> Vec<ChatEntry> {
        let values = self.load_raw();
        let total = values.len();
        let entries: Vec<ChatEntry> = values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if entries.len() != total {
            warn!(
                skipped = total - entries.len(),
                "skipped malformed chat log entries"
            );
        }
        entries
    }

    /// Entries that could not be parsed are written back untouched.
    pub fn append(
        &self,
        user_id: &UserId,
        session_id: &str,
        question: &str,
        response: &str,
    ) -> Result<ChatEntry> {
        if !user_id.is_available() {
            return Err(anyhow!("Cannot store chat without a user id"));
        }

        let entry = ChatEntry {
            user_id: user_id.as_str().to_string(),
            session_id: session_id.to_string(),
            question: question.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
        };

        let mut entries = self.load_raw();
        entries.push(serde_json::to_value(&entry)?);

        let serialized = serde_json::to_string(&entries)?;
        self.store.set(CHAT_HISTORY_KEY, &serialized)?;

        debug!(session_id, total = entries.len(), "appended chat entry");
        Ok(entry)
    }

    pub fn session(&self, user_id: &UserId, session_id: &str) -> Vec<ChatEntry> {
        self.load()
            .into_iter()
            .filter(|c| c.user_id == user_id.as_str() && c.session_id == session_id)
            .collect()
    }

    /// The user's entries grouped by session, sessions in first-seen order
    pub fn all_sessions(&self, user_id: &UserId) -> Vec<ChatSession> {
        let mut sessions: Vec<ChatSession> = Vec::new();
        let mut index_by_id: HashMap<String, usize> = HashMap::new();

        for entry in self.load() {
            if entry.user_id != user_id.as_str() {
                continue;
            }

            match index_by_id.get(&entry.session_id) {
                Some(&i) => sessions[i].chats.push(entry),
                None => {
                    index_by_id.insert(entry.session_id.clone(), sessions.len());
                    sessions.push(ChatSession {
                        session_id: entry.session_id.clone(),
                        chats: vec![entry],
                    });
                }
            }
        }

        sessions
    }

    /// Number of entries across all users
    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    fn log() -> (ChatLog, SharedStore) {
        let store = MemoryStore::shared();
        (ChatLog::new(store.clone()), store)
    }

    #[test]
    fn test_session_preserves_append_order() {
        let (log, _) = log();
        let u1 = UserId::new("u1");

        log.append(&u1, "s1", "hi", "hello").unwrap();
        log.append(&u1, "s1", "bye", "goodbye").unwrap();

        let chats = log.session(&u1, "s1");
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].question, "hi");
        assert_eq!(chats[0].response, "hello");
        assert_eq!(chats[1].question, "bye");
        assert_eq!(chats[1].response, "goodbye");
    }

    #[test]
    fn test_all_sessions_partitions_by_session() {
        let (log, _) = log();
        let u1 = UserId::new("u1");

        log.append(&u1, "s1", "a", "1").unwrap();
        log.append(&u1, "s2", "b", "2").unwrap();
        log.append(&u1, "s1", "c", "3").unwrap();
        log.append(&UserId::new("u2"), "s1", "d", "4").unwrap();
        log.append(&u1, "s3", "e", "5").unwrap();

        let sessions = log.all_sessions(&u1);
        let ids: Vec<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);

        let questions: Vec<Vec<&str>> = sessions
            .iter()
            .map(|s| s.chats.iter().map(|c| c.question.as_str()).collect())
            .collect();
        assert_eq!(questions, vec![vec!["a", "c"], vec!["b"], vec!["e"]]);

        let total: usize = sessions.iter().map(|s| s.chats.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_users_sharing_session_id_are_isolated() {
        let (log, _) = log();
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");

        log.append(&u1, "shared", "from u1", "r1").unwrap();
        log.append(&u2, "shared", "from u2", "r2").unwrap();

        for (user, question) in [(&u1, "from u1"), (&u2, "from u2")] {
            let sessions = log.all_sessions(user);
            assert_eq!(sessions.len(), 1);
            assert_eq!(sessions[0].chats.len(), 1);
            assert_eq!(sessions[0].chats[0].question, question);
        }
    }

    #[test]
    fn test_missing_log_is_empty() {
        let (log, _) = log();
        assert!(log.is_empty());
        assert!(log.all_sessions(&UserId::new("u1")).is_empty());
    }

    #[test]
    fn test_corrupt_log_is_empty_and_recovers_on_append() {
        let (log, store) = log();
        store.set(CHAT_HISTORY_KEY, "{not an array").unwrap();
        let u1 = UserId::new("u1");

        assert!(log.session(&u1, "s1").is_empty());

        log.append(&u1, "s1", "q", "r").unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let (log, store) = log();
        let raw = r#"[
            {"user_id":"u1","session_id":"s1","question":"q1","response":"r1","timestamp":"2024-03-01T10:00:00.000Z"},
            {"user_id":"u1","session_id":"s1"},
            {"user_id":"u1","session_id":"s1","question":"q2","response":"r2","timestamp":"2024-03-01T10:05:00.000Z"}
        ]"#;
        store.set(CHAT_HISTORY_KEY, raw).unwrap();

        let chats = log.session(&UserId::new("u1"), "s1");
        let questions: Vec<&str> = chats.iter().map(|c| c.question.as_str()).collect();
        assert_eq!(questions, vec!["q1", "q2"]);
    }

    #[test]
    fn test_append_keeps_unparsed_entries() {
        let (log, store) = log();
        let raw = r#"[
            {"user_id":"u1","session_id":"s1","question":"no reply","timestamp":"2024-03-01T10:00:00.000Z"}
        ]"#;
        store.set(CHAT_HISTORY_KEY, raw).unwrap();
        let u1 = UserId::new("u1");

        log.append(&u1, "s1", "q1", "r1").unwrap();

        let stored = store.get(CHAT_HISTORY_KEY).unwrap().unwrap();
        let values: Vec<serde_json::Value> = serde_json::from_str(&stored).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["question"], "no reply");

        let chats = log.session(&u1, "s1");
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].question, "q1");
    }

    #[test]
    fn test_append_requires_identity() {
        let (log, _) = log();
        assert!(log.append(&UserId::unavailable(), "s1", "q", "r").is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn test_append_propagates_write_failure() {
        let log = ChatLog::new(Arc::new(crate::storage::tests::UnavailableStore));
        assert!(log.append(&UserId::new("u1"), "s1", "q", "r").is_err());
    }

    #[test]
    fn test_session_title_truncates() {
        let (log, _) = log();
        let u1 = UserId::new("u1");
        log.append(&u1, "s1", "What does the contract say about termination?", "r")
            .unwrap();
        log.append(&u1, "s2", "short", "r").unwrap();

        let sessions = log.all_sessions(&u1);
        assert_eq!(sessions[0].title(30), "What does the contract say abo...");
        assert_eq!(sessions[1].title(30), "short");
        assert!(sessions[0].started_at().is_some());
    }
}
