use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use arcadechat_core::{ChatMessage, Conversation, HistoryStore, SessionSummary, StructuredPayload};

use crate::worker::{SessionEvent, SessionHandle};

/// Sent when the user asks to connect but the agent hasn't offered a link yet.
pub const CONNECT_REQUEST: &str =
    "I want to connect my Google Drive account. Please provide the authentication link.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub agent_url: String,

    // Chat state
    pub conversation: Conversation,
    pub loading: bool,
    pub run_id: Option<String>,
    /// Set when the chat has messages that aren't in history yet
    pub unsaved: bool,
    /// History entry this chat was loaded from or last saved as
    history_id: Option<String>,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Chat scroll state (sizes are updated during render)
    pub scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16,
    pub total_chat_lines: u16,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // History panel state
    pub show_history: bool,
    pub history: Vec<SessionSummary>,
    pub history_state: ListState,

    // One-line status shown in the footer
    pub status: Option<String>,

    history_store: HistoryStore,
    session: SessionHandle,
}

impl App {
    pub fn new(agent_url: &str, history_store: HistoryStore, session: SessionHandle) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            agent_url: agent_url.to_string(),

            conversation: Conversation::new(),
            loading: false,
            run_id: None,
            unsaved: false,
            history_id: None,

            input: String::new(),
            cursor: 0,

            scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            total_chat_lines: 0,
            chat_area: None,

            animation_frame: 0,

            show_history: false,
            history: Vec::new(),
            history_state: ListState::default(),

            status: None,

            history_store,
            session,
        }
    }

    /// Send the input box contents, if there is anything to send.
    ///
    /// Returns false when the input is blank or a reply is still streaming.
    pub fn submit_input(&mut self) -> bool {
        let text = self.input.trim().to_string();
        if text.is_empty() || !self.send_message(&text) {
            return false;
        }
        self.input.clear();
        self.cursor = 0;
        true
    }

    pub fn send_message(&mut self, text: &str) -> bool {
        if self.loading {
            self.status = Some("Wait for the current reply to finish".to_string());
            return false;
        }
        self.session.send(text);
        self.loading = true;
        self.unsaved = true;
        self.status = None;
        self.follow_bottom = true;
        true
    }

    pub fn apply_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Upsert(message) => self.conversation.upsert(message),
            SessionEvent::Finished { run_id } => {
                self.loading = false;
                self.run_id = run_id;
            }
        }
    }

    /// Save the current chat and start over with no run.
    pub fn new_chat(&mut self) {
        if self.loading {
            self.status = Some("Wait for the current reply to finish".to_string());
            return;
        }
        self.save_history();
        self.session.reset();
        self.conversation.clear();
        self.run_id = None;
        self.history_id = None;
        self.scroll = 0;
        self.follow_bottom = true;
        self.status = Some("New chat started".to_string());
    }

    pub fn save_history(&mut self) {
        if !self.unsaved {
            return;
        }
        let saved = self
            .history_store
            .save_as(self.history_id.as_deref(), self.conversation.messages());
        match saved {
            Ok(Some(summary)) => {
                self.unsaved = false;
                self.history_id = Some(summary.id.clone());
                self.status = Some(format!("Saved \"{}\"", summary.title));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "could not save chat history");
                self.status = Some(format!("Could not save history: {e}"));
            }
        }
    }

    pub fn open_history(&mut self) {
        self.history = self.history_store.list();
        self.history_state
            .select(if self.history.is_empty() { None } else { Some(0) });
        self.show_history = true;
    }

    pub fn close_history(&mut self) {
        self.show_history = false;
    }

    pub fn history_nav_down(&mut self) {
        let len = self.history.len();
        if len > 0 {
            let i = self.history_state.selected().unwrap_or(0);
            self.history_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn history_nav_up(&mut self) {
        let i = self.history_state.selected().unwrap_or(0);
        self.history_state.select(Some(i.saturating_sub(1)));
    }

    fn selected_history(&self) -> Option<&SessionSummary> {
        self.history_state.selected().and_then(|i| self.history.get(i))
    }

    /// Replace the chat with the selected saved one.
    pub fn load_selected_history(&mut self) {
        if self.loading {
            self.status = Some("Wait for the current reply to finish".to_string());
            return;
        }
        let Some(summary) = self.selected_history().cloned() else {
            return;
        };
        self.save_history();

        let messages = self.history_store.load(&summary.id);
        self.session.restore(messages.clone());
        self.conversation = Conversation::from_messages(messages);
        self.run_id = None;
        self.unsaved = false;
        self.history_id = Some(summary.id.clone());
        self.follow_bottom = true;
        self.show_history = false;
        self.status = Some(format!("Loaded \"{}\"", summary.title));
    }

    pub fn delete_selected_history(&mut self) {
        let Some(id) = self.selected_history().map(|s| s.id.clone()) else {
            return;
        };
        if let Err(e) = self.history_store.delete(&id) {
            self.status = Some(format!("Could not delete chat: {e}"));
            return;
        }
        if self.history_id.as_deref() == Some(id.as_str()) {
            self.history_id = None;
        }
        self.history = self.history_store.list();
        let len = self.history.len();
        let selected = self.history_state.selected().unwrap_or(0);
        self.history_state
            .select(if len == 0 { None } else { Some(selected.min(len - 1)) });
    }

    /// Most recent auth request from the agent, if any.
    pub fn latest_payload(&self) -> Option<&StructuredPayload> {
        self.conversation
            .messages()
            .iter()
            .rev()
            .find_map(|m| m.structured.as_ref())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn max_scroll(&self) -> u16 {
        self.total_chat_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = (self.scroll.saturating_add(lines)).min(self.max_scroll());
        if self.scroll >= self.max_scroll() {
            self.follow_bottom = true;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        if self.follow_bottom {
            self.scroll = self.max_scroll();
        }
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
        self.scroll = self.max_scroll();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::SessionCommand;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn test_app() -> (App, UnboundedReceiver<SessionCommand>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (handle, rx) = SessionHandle::detached();
        let app = App::new("https://agents.example/a1", HistoryStore::new(dir.path()), handle);
        (app, rx, dir)
    }

    fn reply(id: &str, content: &str) -> ChatMessage {
        let mut msg = ChatMessage::assistant_placeholder();
        msg.id = id.to_string();
        msg.content = content.to_string();
        msg
    }

    #[test]
    fn test_blank_input_is_not_sent() {
        let (mut app, mut rx, _dir) = test_app();
        app.input = "   \n ".to_string();
        assert!(!app.submit_input());
        assert!(rx.try_recv().is_err());
        assert!(!app.loading);
    }

    #[test]
    fn test_submit_trims_and_clears_input() {
        let (mut app, mut rx, _dir) = test_app();
        app.input = "  List my files ".to_string();
        app.cursor = 5;
        assert!(app.submit_input());

        match rx.try_recv().unwrap() {
            SessionCommand::Send(text) => assert_eq!(text, "List my files"),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert!(app.loading);
    }

    #[test]
    fn test_second_send_waits_for_first() {
        let (mut app, mut rx, _dir) = test_app();
        assert!(app.send_message("one"));
        assert!(!app.send_message("two"));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        app.apply_session_event(SessionEvent::Finished {
            run_id: Some("abc".to_string()),
        });
        assert!(!app.loading);
        assert_eq!(app.run_id.as_deref(), Some("abc"));
        assert!(app.send_message("two"));
    }

    #[test]
    fn test_upserts_replace_streaming_message() {
        let (mut app, _rx, _dir) = test_app();
        app.apply_session_event(SessionEvent::Upsert(ChatMessage::user("hi")));
        app.apply_session_event(SessionEvent::Upsert(reply("r1", "Hel")));
        app.apply_session_event(SessionEvent::Upsert(reply("r1", "Hello!")));

        assert_eq!(app.messages().len(), 2);
        assert_eq!(app.messages()[1].content, "Hello!");
    }

    #[test]
    fn test_latest_payload_finds_newest() {
        let (mut app, _rx, _dir) = test_app();
        let mut first = reply("r1", "connect");
        first.structured = Some(StructuredPayload {
            url: "https://old".to_string(),
            integration: "googledrive".to_string(),
        });
        let mut second = reply("r2", "again");
        second.structured = Some(StructuredPayload {
            url: "https://new".to_string(),
            integration: "googledrive".to_string(),
        });
        app.apply_session_event(SessionEvent::Upsert(first));
        app.apply_session_event(SessionEvent::Upsert(second));
        app.apply_session_event(SessionEvent::Upsert(reply("r3", "plain")));

        assert_eq!(app.latest_payload().unwrap().url, "https://new");
    }

    #[test]
    fn test_new_chat_saves_and_resets() {
        let (mut app, mut rx, _dir) = test_app();
        app.send_message("List my files");
        app.apply_session_event(SessionEvent::Upsert(ChatMessage::user("List my files")));
        app.apply_session_event(SessionEvent::Upsert(reply("r1", "Two files.")));
        app.apply_session_event(SessionEvent::Finished {
            run_id: Some("abc".to_string()),
        });

        app.new_chat();

        assert!(app.messages().is_empty());
        assert!(app.run_id.is_none());
        let _send = rx.try_recv().unwrap();
        assert!(matches!(rx.try_recv().unwrap(), SessionCommand::Reset));

        app.open_history();
        assert_eq!(app.history.len(), 1);
        assert_eq!(app.history[0].title, "List my files");
    }

    #[test]
    fn test_load_history_restores_session() {
        let (mut app, mut rx, _dir) = test_app();
        let saved = vec![ChatMessage::user("old"), reply("r1", "answer")];
        app.history_store.save(&saved).unwrap();

        app.open_history();
        app.load_selected_history();

        assert_eq!(app.messages(), saved.as_slice());
        assert!(!app.show_history);
        match rx.try_recv().unwrap() {
            SessionCommand::Restore(messages) => assert_eq!(messages, saved),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_continuing_loaded_chat_updates_its_entry() {
        let (mut app, _rx, _dir) = test_app();
        let saved = vec![ChatMessage::user("old"), reply("r1", "answer")];
        let summary = app.history_store.save(&saved).unwrap().unwrap();

        app.open_history();
        app.load_selected_history();
        app.send_message("follow up");
        app.apply_session_event(SessionEvent::Upsert(ChatMessage::user("follow up")));
        app.apply_session_event(SessionEvent::Upsert(reply("r2", "more")));
        app.apply_session_event(SessionEvent::Finished { run_id: None });
        app.save_history();

        let sessions = app.history_store.list();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, summary.id);
        assert_eq!(sessions[0].preview, "more");
        assert_eq!(app.history_store.load(&summary.id).len(), 4);

        // A fresh chat after that gets its own entry
        app.new_chat();
        app.send_message("new topic");
        app.apply_session_event(SessionEvent::Upsert(ChatMessage::user("new topic")));
        app.apply_session_event(SessionEvent::Upsert(reply("r3", "sure")));
        app.apply_session_event(SessionEvent::Finished { run_id: None });
        app.save_history();
        assert_eq!(app.history_store.list().len(), 2);
    }

    #[test]
    fn test_scroll_up_leaves_follow_mode() {
        let (mut app, _rx, _dir) = test_app();
        app.total_chat_lines = 50;
        app.chat_height = 10;
        app.scroll_to_bottom();
        assert_eq!(app.scroll, 40);

        app.scroll_up(3);
        assert_eq!(app.scroll, 37);
        assert!(!app.follow_bottom);

        app.scroll_down(10);
        assert_eq!(app.scroll, 40);
        assert!(app.follow_bottom);
    }
}
