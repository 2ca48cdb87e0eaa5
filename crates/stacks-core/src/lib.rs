pub mod chat_log;
pub mod client;
pub mod config;
pub mod controller;
pub mod identity;
pub mod profile;
pub mod storage;
pub mod view_model;

// Re-export main types for convenience
pub use chat_log::{new_session_id, ChatEntry, ChatLog, ChatSession};
pub use client::{AskBackend, AskClient, AskRequest};
pub use config::Config;
pub use controller::{ConversationController, ConversationState, SendOutcome, SubmitError};
pub use identity::{get_or_create_user_id, UserId};
pub use profile::{ProfileError, ProfileStore, UserProfile};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use view_model::{messages_from_entries, ChatMessage, ChatRole, ConversationView};
