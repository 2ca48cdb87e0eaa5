use std::sync::Arc;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use stacks_core::{
    get_or_create_user_id, AskBackend, ChatLog, ConversationController, ProfileStore,
    SendOutcome, SharedStore, UserProfile,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sessions,
    Messages,
    Input,
}

/// Sidebar titles are cut to this many characters
pub const SESSION_TITLE_CHARS: usize = 30;

pub struct App {
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Login state
    pub username_input: String,
    pub username_cursor: usize,
    pub login_error: Option<String>,

    // Chat state
    pub profile: Option<UserProfile>,
    pub controller: Option<ConversationController>,
    pub input: String,
    pub input_cursor: usize,
    pub sessions_state: ListState,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub notification: Option<String>,
    pub animation_frame: u8,
    pub reply_task: Option<JoinHandle<anyhow::Result<String>>>,

    // Areas for mouse hit-testing
    pub sessions_area: Option<Rect>,
    pub chat_area: Option<Rect>,

    store: SharedStore,
    profiles: ProfileStore,
    backend: Arc<dyn AskBackend>,
}

impl App {
    /// Resumes the saved login if there is one, otherwise opens the login screen.
    pub fn new(store: SharedStore, backend: Arc<dyn AskBackend>) -> Self {
        let profiles = ProfileStore::new(store.clone());

        let mut app = Self {
            should_quit: false,
            screen: Screen::Login,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,

            username_input: String::new(),
            username_cursor: 0,
            login_error: None,

            profile: None,
            controller: None,
            input: String::new(),
            input_cursor: 0,
            sessions_state: ListState::default(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            notification: None,
            animation_frame: 0,
            reply_task: None,

            sessions_area: None,
            chat_area: None,

            store,
            profiles,
            backend,
        };

        if let Some(profile) = app.profiles.current() {
            info!(user = %profile.name, "resuming saved login");
            app.start_chat(profile);
        }

        app
    }

    fn start_chat(&mut self, profile: UserProfile) {
        let user_id = get_or_create_user_id(self.store.as_ref());
        if !user_id.is_available() {
            self.notification = Some("Local storage unavailable; chats will not be saved".to_string());
        }

        let log = ChatLog::new(self.store.clone());
        self.controller = Some(ConversationController::new(user_id, log, self.backend.clone()));
        self.profile = Some(profile);
        self.screen = Screen::Chat;
        self.focus = FocusPane::Input;
        self.input_mode = InputMode::Editing;
        self.chat_scroll = 0;
        self.sync_session_selection();
    }

    pub fn login(&mut self) {
        match self.profiles.login(&self.username_input) {
            Ok(profile) => {
                self.login_error = None;
                self.username_input.clear();
                self.username_cursor = 0;
                self.start_chat(profile);
            }
            Err(e) => self.login_error = Some(e.to_string()),
        }
    }

    pub fn logout(&mut self) {
        if let Err(e) = self.profiles.logout() {
            warn!(error = %e, "logout could not clear storage");
        }
        if let Some(task) = self.reply_task.take() {
            task.abort();
        }

        self.profile = None;
        self.controller = None;
        self.input.clear();
        self.input_cursor = 0;
        self.sessions_state = ListState::default();
        self.notification = None;
        self.screen = Screen::Login;
        self.input_mode = InputMode::Editing;
        self.focus = FocusPane::Input;
    }

    pub fn is_sending(&self) -> bool {
        self.controller.as_ref().is_some_and(|c| c.is_sending())
    }

    /// Send the current input on a background task.
    pub fn submit(&mut self) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };

        match controller.begin_send(&self.input) {
            Ok(request) => {
                let backend = controller.backend();
                self.reply_task = Some(tokio::spawn(async move { backend.ask(&request).await }));
                self.input.clear();
                self.input_cursor = 0;
                self.notification = None;
                self.scroll_chat_to_bottom();
            }
            Err(e) => self.notification = Some(e.to_string()),
        }
    }

    /// Hand a finished reply to the controller. Returns true if one was applied.
    pub async fn poll_reply(&mut self) -> bool {
        let finished = self.reply_task.as_ref().is_some_and(|t| t.is_finished());
        if !finished {
            return false;
        }
        let Some(task) = self.reply_task.take() else {
            return false;
        };

        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("request task failed: {}", e)),
        };

        let Some(controller) = self.controller.as_mut() else {
            return false;
        };

        match controller.complete_send(result) {
            SendOutcome::Delivered { persisted, .. } => {
                if !persisted {
                    self.notification = Some("Reply received but could not be saved locally".to_string());
                }
            }
            SendOutcome::Failed { restored_input, .. } => {
                let reason = controller.dismiss_error().unwrap_or_default();
                let mut notice = format!("Failed to send message: {}", reason);
                if let Some(url) = self.backend.base_url() {
                    notice.push_str(&format!(". Make sure the backend is running at {}", url));
                }
                self.notification = Some(notice);
                if self.input.is_empty() {
                    self.input_cursor = restored_input.chars().count();
                    self.input = restored_input;
                }
            }
            SendOutcome::Ignored => {}
        }

        self.sync_session_selection();
        self.scroll_chat_to_bottom();
        true
    }

    pub fn new_chat(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            controller.new_conversation();
        }
        self.chat_scroll = 0;
        self.sync_session_selection();
        self.focus = FocusPane::Input;
        self.input_mode = InputMode::Editing;
    }

    pub fn open_selected_session(&mut self) {
        let Some(i) = self.sessions_state.selected() else {
            return;
        };
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let Some(session_id) = controller.sessions().get(i).map(|s| s.session_id.clone()) else {
            return;
        };

        controller.load_session(&session_id);
        self.chat_scroll = 0;
        self.focus = FocusPane::Messages;
    }

    /// Highlight the active session in the sidebar, if it has been saved yet
    fn sync_session_selection(&mut self) {
        let selected = self.controller.as_ref().and_then(|c| {
            let active = c.active_session()?;
            c.sessions().iter().position(|s| s.session_id == active)
        });
        self.sessions_state.select(selected);
    }

    pub fn session_count(&self) -> usize {
        self.controller.as_ref().map(|c| c.sessions().len()).unwrap_or(0)
    }

    pub fn sessions_nav_down(&mut self) {
        let len = self.session_count();
        if len > 0 {
            let i = self.sessions_state.selected().map(|i| i + 1).unwrap_or(0);
            self.sessions_state.select(Some(i.min(len - 1)));
        }
    }

    pub fn sessions_nav_up(&mut self) {
        if self.session_count() > 0 {
            let i = self.sessions_state.selected().unwrap_or(0);
            self.sessions_state.select(Some(i.saturating_sub(1)));
        }
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat to bottom so the newest turn (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let Some(controller) = self.controller.as_ref() else {
            return;
        };

        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in controller.view().messages() {
            total_lines = total_lines.saturating_add(1); // Role line
            for line in msg.content.lines() {
                // Character count, not byte length
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 { 1 } else { char_count / wrap_width + 1 };
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if controller.is_sending() {
            total_lines = total_lines.saturating_add(2); // "AI:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use stacks_core::{AskRequest, ChatRole, KeyValueStore, MemoryStore};
    use std::time::Duration;

    struct FixedBackend(Result<String, String>);

    #[async_trait]
    impl AskBackend for FixedBackend {
        async fn ask(&self, _request: &AskRequest) -> Result<String> {
            self.0.clone().map_err(|e| anyhow!(e))
        }

        fn base_url(&self) -> Option<&str> {
            Some("http://localhost:5000")
        }
    }

    fn app_with(store: SharedStore, reply: Result<String, String>) -> App {
        App::new(store, Arc::new(FixedBackend(reply)))
    }

    async fn wait_for_reply(app: &mut App) {
        for _ in 0..100 {
            if app.poll_reply().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("reply never arrived");
    }

    #[test]
    fn test_starts_on_login_without_profile() {
        let app = app_with(MemoryStore::shared(), Ok("hi".into()));
        assert_eq!(app.screen, Screen::Login);
        assert!(app.controller.is_none());
    }

    #[test]
    fn test_blank_username_shows_error() {
        let mut app = app_with(MemoryStore::shared(), Ok("hi".into()));
        app.username_input = "   ".to_string();
        app.login();

        assert_eq!(app.screen, Screen::Login);
        assert_eq!(app.login_error.as_deref(), Some("Username cannot be empty"));
    }

    #[test]
    fn test_saved_login_is_resumed() {
        let store = MemoryStore::shared();
        let mut first = app_with(store.clone(), Ok("hi".into()));
        first.username_input = "alice".to_string();
        first.login();
        assert_eq!(first.screen, Screen::Chat);

        let second = app_with(store, Ok("hi".into()));
        assert_eq!(second.screen, Screen::Chat);
        assert_eq!(second.profile.map(|p| p.name).as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_submit_and_receive() {
        let store = MemoryStore::shared();
        let mut app = app_with(store, Ok("hello".into()));
        app.username_input = "alice".to_string();
        app.login();

        app.input = "hi".to_string();
        app.submit();
        assert!(app.is_sending());
        assert!(app.input.is_empty());

        wait_for_reply(&mut app).await;
        let controller = app.controller.as_ref().unwrap();
        let roles: Vec<ChatRole> = controller.view().messages().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant]);
        assert_eq!(app.sessions_state.selected(), Some(0));
    }

    #[tokio::test]
    async fn test_failed_send_restores_input() {
        let store = MemoryStore::shared();
        let mut app = app_with(store.clone(), Err("connection refused".into()));
        app.username_input = "alice".to_string();
        app.login();

        app.input = "keep me".to_string();
        app.submit();
        wait_for_reply(&mut app).await;

        assert_eq!(app.input, "keep me");
        assert!(!app.is_sending());
        assert!(app
            .notification
            .as_deref()
            .is_some_and(|n| n.contains("connection refused") && n.contains("http://localhost:5000")));
        assert!(app.controller.as_ref().unwrap().view().is_empty());
        assert_eq!(store.get(stacks_core::storage::CHAT_HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn test_logout_returns_to_login() {
        let mut app = app_with(MemoryStore::shared(), Ok("hi".into()));
        app.username_input = "alice".to_string();
        app.login();
        app.logout();

        assert_eq!(app.screen, Screen::Login);
        assert!(app.profile.is_none());
        assert!(app.controller.is_none());
    }
}
