//! Saved chats, one JSON file per chat plus an index.
//!
//! Mirrors a browser key-value store: unreadable files read as empty rather
//! than failing the caller.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::data_dir;
use crate::error::StoreError;
use crate::state::{ChatMessage, ChatRole};

const INDEX_FILE: &str = "index.json";
const MAX_SESSIONS: usize = 20;
const TITLE_CHARS: usize = 40;
const PREVIEW_CHARS: usize = 60;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub preview: String,
}

pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self::new(data_dir()?.join("history")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a chat as the newest history entry.
    ///
    /// Chats with fewer than two messages are not worth keeping and return
    /// `None`. Only the newest entries are retained.
    pub fn save(&self, messages: &[ChatMessage]) -> Result<Option<SessionSummary>, StoreError> {
        self.save_as(None, messages)
    }

    /// Like [`save`](Self::save), but overwrites the entry `id` (moving it to
    /// the top) instead of adding a new one. An unknown or invalid id falls
    /// back to a fresh entry.
    pub fn save_as(
        &self,
        id: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<Option<SessionSummary>, StoreError> {
        if messages.len() < 2 {
            return Ok(None);
        }

        let mut sessions = self.list();
        let id = match id.filter(|id| is_valid_id(id) && sessions.iter().any(|s| s.id == *id)) {
            Some(id) => {
                sessions.retain(|s| s.id != id);
                id.to_string()
            }
            None => self.next_id(&sessions),
        };
        let summary = SessionSummary {
            id,
            title: title_for(messages),
            timestamp: Utc::now(),
            preview: messages
                .last()
                .map(|m| truncate_chars(&m.content, PREVIEW_CHARS))
                .unwrap_or_default(),
        };

        fs::create_dir_all(&self.dir)?;
        fs::write(
            self.session_path(&summary.id),
            serde_json::to_string_pretty(messages)?,
        )?;

        sessions.insert(0, summary.clone());
        for evicted in sessions.iter().skip(MAX_SESSIONS) {
            remove_if_exists(&self.session_path(&evicted.id))?;
        }
        sessions.truncate(MAX_SESSIONS);
        self.write_index(&sessions)?;

        tracing::debug!(id = %summary.id, title = %summary.title, "chat saved to history");
        Ok(Some(summary))
    }

    /// Newest first.
    pub fn list(&self) -> Vec<SessionSummary> {
        read_or_default(&self.dir.join(INDEX_FILE))
    }

    pub fn load(&self, id: &str) -> Vec<ChatMessage> {
        if !is_valid_id(id) {
            return Vec::new();
        }
        read_or_default(&self.session_path(id))
    }

    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut sessions = self.list();
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        let removed = sessions.len() != before;

        if removed {
            self.write_index(&sessions)?;
        }
        if is_valid_id(id) {
            remove_if_exists(&self.session_path(id))?;
        }
        Ok(removed)
    }

    fn next_id(&self, sessions: &[SessionSummary]) -> String {
        let mut millis = Utc::now().timestamp_millis();
        while sessions.iter().any(|s| s.id == millis.to_string()) {
            millis += 1;
        }
        millis.to_string()
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("session-{id}.json"))
    }

    fn write_index(&self, sessions: &[SessionSummary]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(
            self.dir.join(INDEX_FILE),
            serde_json::to_string_pretty(sessions)?,
        )?;
        Ok(())
    }
}

fn title_for(messages: &[ChatMessage]) -> String {
    let first_user = messages
        .iter()
        .find(|m| m.role == ChatRole::User)
        .map(|m| m.content.as_str())
        .unwrap_or("New Chat");

    let mut title = truncate_chars(first_user, TITLE_CHARS);
    if first_user.chars().count() > TITLE_CHARS {
        title.push_str("...");
    }
    title
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return T::default(),
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable store file");
        T::default()
    })
}

fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
