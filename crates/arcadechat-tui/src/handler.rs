use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode, CONNECT_REQUEST};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Session(event) => app.apply_session_event(event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_history {
        handle_history_keys(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }

        KeyCode::Char('n') => app.new_chat(),
        KeyCode::Char('h') => app.open_history(),
        KeyCode::Char('c') => connect(app),

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') | KeyCode::PageDown => {
            let page = (app.chat_height / 2).max(1);
            app.scroll_down(page);
        }
        KeyCode::Char('u') | KeyCode::PageUp => {
            let page = (app.chat_height / 2).max(1);
            app.scroll_up(page);
        }
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_input();
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn handle_history_keys(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('q') => app.close_history(),
        KeyCode::Char('j') | KeyCode::Down => app.history_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.history_nav_up(),
        KeyCode::Enter => app.load_selected_history(),
        KeyCode::Char('d') | KeyCode::Delete => app.delete_selected_history(),
        _ => {}
    }
}

/// Open the agent's auth link, or ask the agent for one.
fn connect(app: &mut App) {
    match app.latest_payload().cloned() {
        Some(payload) => {
            app.status = Some(if open_url(&payload.url) {
                format!("Opened {} sign-in in your browser", payload.integration)
            } else {
                format!("Open this link to connect: {}", payload.url)
            });
        }
        None => {
            app.send_message(CONNECT_REQUEST);
        }
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

fn open_url(url: &str) -> bool {
    use std::process::{Command, Stdio};

    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };

    match Command::new(opener)
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(opener, error = %e, "could not open auth link");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{SessionCommand, SessionHandle};
    use arcadechat_core::HistoryStore;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn test_app(dir: &tempfile::TempDir) -> (App, UnboundedReceiver<SessionCommand>) {
        let (handle, rx) = SessionHandle::detached();
        let app = App::new("https://agents.example/a1", HistoryStore::new(dir.path()), handle);
        (app, rx)
    }

    #[test]
    fn test_typing_with_cursor_movement() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _commands) = test_app(&dir);

        for c in "héllo".chars() {
            handle_event(&mut app, key(KeyCode::Char(c))).unwrap();
        }
        handle_event(&mut app, key(KeyCode::Home)).unwrap();
        handle_event(&mut app, key(KeyCode::Right)).unwrap();
        handle_event(&mut app, key(KeyCode::Delete)).unwrap();
        handle_event(&mut app, key(KeyCode::Char('e'))).unwrap();
        handle_event(&mut app, key(KeyCode::End)).unwrap();
        handle_event(&mut app, key(KeyCode::Backspace)).unwrap();

        assert_eq!(app.input, "hell");
        assert_eq!(app.cursor, 4);
    }

    #[test]
    fn test_enter_sends_and_escape_leaves_editing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _commands) = test_app(&dir);

        handle_event(&mut app, key(KeyCode::Char('h'))).unwrap();
        handle_event(&mut app, key(KeyCode::Char('i'))).unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert!(app.loading);
        assert!(app.input.is_empty());

        handle_event(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);

        handle_event(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(app.should_quit);
    }

    #[test]
    fn test_connect_without_link_asks_agent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, mut commands) = test_app(&dir);
        app.input_mode = InputMode::Normal;

        handle_event(&mut app, key(KeyCode::Char('c'))).unwrap();
        assert!(app.loading);
        match commands.try_recv().unwrap() {
            SessionCommand::Send(text) => assert_eq!(text, CONNECT_REQUEST),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_ctrl_c_quits_while_editing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _commands) = test_app(&dir);
        let ctrl_c = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        handle_event(&mut app, ctrl_c).unwrap();
        assert!(app.should_quit);
        assert!(app.input.is_empty());
    }
}
