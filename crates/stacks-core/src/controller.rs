//! Conversation controller
//!
//! Owns the active session and its view, and drives a question through
//! `Idle -> Sending -> Idle` (or `Error` when the endpoint fails). Sending is
//! split into [`ConversationController::begin_send`] and
//! [`ConversationController::complete_send`] so a front end can run the
//! network call on its own task; [`ConversationController::send`] does both.

use crate::chat_log::{new_session_id, ChatLog, ChatSession};
use crate::client::{AskBackend, AskRequest};
use crate::identity::UserId;
use crate::view_model::ConversationView;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Sending,
    Error(String),
}

/// Why a submission was refused before anything was sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("No user id available; chats cannot be saved")]
    NoIdentity,
    #[error("No active conversation")]
    NoActiveSession,
    #[error("A message is already being sent")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The endpoint answered. `persisted` is false if the log write failed.
    Delivered { response: String, persisted: bool },
    /// The endpoint failed; nothing was stored and the question is handed back.
    Failed { reason: String, restored_input: String },
    /// No send was in flight.
    Ignored,
}

struct InFlight {
    session_id: String,
    question: String,
}

pub struct ConversationController {
    user_id: UserId,
    log: ChatLog,
    backend: Arc<dyn AskBackend>,
    state: ConversationState,
    active_session: Option<String>,
    view: ConversationView,
    sessions: Vec<ChatSession>,
    in_flight: Option<InFlight>,
}

impl ConversationController {
    /// Starts on a fresh, empty conversation with the session list loaded.
    pub fn new(user_id: UserId, log: ChatLog, backend: Arc<dyn AskBackend>) -> Self {
        let mut controller = Self {
            user_id,
            log,
            backend,
            state: ConversationState::Idle,
            active_session: Some(new_session_id()),
            view: ConversationView::new(),
            sessions: Vec::new(),
            in_flight: None,
        };
        controller.refresh_sessions();
        controller
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == ConversationState::Sending
    }

    pub fn active_session(&self) -> Option<&str> {
        self.active_session.as_deref()
    }

    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn backend(&self) -> Arc<dyn AskBackend> {
        Arc::clone(&self.backend)
    }

    pub fn refresh_sessions(&mut self) {
        self.sessions = if self.user_id.is_available() {
            self.log.all_sessions(&self.user_id)
        } else {
            Vec::new()
        };
    }

    /// Switch to a fresh session. The log is not touched.
    pub fn new_conversation(&mut self) {
        let session_id = new_session_id();
        info!(%session_id, "starting new conversation");
        self.active_session = Some(session_id);
        self.view = ConversationView::new();
    }

    /// Make `session_id` active and rebuild the view from the log. A question
    /// still awaiting its reply in that session stays pending.
    pub fn load_session(&mut self, session_id: &str) {
        let entries = self.log.session(&self.user_id, session_id);
        self.view = ConversationView::from_entries(&entries);
        if let Some(in_flight) = self.in_flight.as_ref().filter(|f| f.session_id == session_id) {
            self.view.push_pending(&in_flight.question);
        }
        self.active_session = Some(session_id.to_string());
    }

    /// Validate `input`, show it as pending and build the request to send.
    pub fn begin_send(&mut self, input: &str) -> Result<AskRequest, SubmitError> {
        if self.is_sending() {
            return Err(SubmitError::Busy);
        }
        if input.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if !self.user_id.is_available() {
            return Err(SubmitError::NoIdentity);
        }
        let session_id = self
            .active_session
            .clone()
            .ok_or(SubmitError::NoActiveSession)?;

        let history = self.log.session(&self.user_id, &session_id);
        self.view.push_pending(input);
        self.in_flight = Some(InFlight {
            session_id: session_id.clone(),
            question: input.to_string(),
        });
        self.state = ConversationState::Sending;

        Ok(AskRequest {
            user_id: self.user_id.as_str().to_string(),
            question: input.to_string(),
            chat_id: session_id,
            history,
        })
    }

    /// Apply the endpoint's answer (or failure) to the in-flight question.
    pub fn complete_send(&mut self, result: anyhow::Result<String>) -> SendOutcome {
        let Some(in_flight) = self.in_flight.take() else {
            return SendOutcome::Ignored;
        };
        let still_active = self.active_session.as_deref() == Some(in_flight.session_id.as_str());

        match result {
            Ok(response) => {
                let persisted = match self.log.append(
                    &self.user_id,
                    &in_flight.session_id,
                    &in_flight.question,
                    &response,
                ) {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(error = %e, "reply received but could not be saved");
                        false
                    }
                };

                if still_active {
                    self.view.commit(&in_flight.question, &response);
                }
                self.refresh_sessions();
                self.state = ConversationState::Idle;

                SendOutcome::Delivered {
                    response,
                    persisted,
                }
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(error = %reason, "failed to send message");

                if still_active {
                    self.view.rollback();
                }
                self.state = ConversationState::Error(reason.clone());

                SendOutcome::Failed {
                    reason,
                    restored_input: in_flight.question,
                }
            }
        }
    }

    /// Acknowledge a failed send, returning to `Idle`.
    pub fn dismiss_error(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.state, ConversationState::Idle) {
            ConversationState::Error(reason) => Some(reason),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Send `input` and wait for the answer.
    pub async fn send(&mut self, input: &str) -> Result<SendOutcome, SubmitError> {
        let request = self.begin_send(input)?;
        let result = self.backend.ask(&request).await;
        Ok(self.complete_send(result))
    }
}
