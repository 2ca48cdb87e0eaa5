use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane, InputMode, Screen};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_reply().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.screen {
        Screen::Login => handle_login(app, key),
        Screen::Chat => match app.input_mode {
            InputMode::Normal => handle_chat_normal(app, key),
            InputMode::Editing => handle_chat_editing(app, key),
        },
    }
}

fn handle_login(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => app.login(),
        _ => {
            edit_line(&mut app.username_input, &mut app.username_cursor, key);
            app.login_error = None;
        }
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Esc => app.dismiss_notification(),

        // Tab cycles: Sessions -> Messages -> Input -> Sessions
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Sessions => FocusPane::Messages,
                FocusPane::Messages => FocusPane::Input,
                FocusPane::Input => FocusPane::Sessions,
            };
            if app.focus == FocusPane::Input {
                app.input_mode = InputMode::Editing;
                app.input_cursor = app.input.chars().count();
            }
            if app.focus == FocusPane::Sessions && app.sessions_state.selected().is_none() {
                app.sessions_nav_down();
            }
        }

        KeyCode::Char('i') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.input.chars().count();
        }

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Sessions => app.sessions_nav_down(),
            _ => app.chat_scroll = app.chat_scroll.saturating_add(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Sessions => app.sessions_nav_up(),
            _ => app.chat_scroll = app.chat_scroll.saturating_sub(1),
        },
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.chat_scroll = app.chat_scroll.saturating_add(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.chat_scroll = app.chat_scroll.saturating_sub(app.chat_height / 2);
        }

        KeyCode::Enter => {
            if app.focus == FocusPane::Sessions {
                app.open_selected_session();
            } else if app.focus == FocusPane::Input {
                app.input_mode = InputMode::Editing;
            }
        }

        KeyCode::Char('n') => app.new_chat(),
        KeyCode::Char('L') => app.logout(),

        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Sessions;
            if app.sessions_state.selected().is_none() {
                app.sessions_nav_down();
            }
        }
        // Alt+Enter inserts a newline; plain Enter sends
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, '\n');
            app.input_cursor += 1;
        }
        KeyCode::Enter => {
            // Submission stays disabled while a reply is outstanding
            if !app.is_sending() && !app.input.trim().is_empty() {
                app.submit();
            }
        }
        _ => edit_line(&mut app.input, &mut app.input_cursor, key),
    }
}

/// Cursor movement and character editing shared by every text field
fn edit_line(text: &mut String, cursor: &mut usize, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < text.chars().count() {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            *cursor = (*cursor + 1).min(text.chars().count());
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = text.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat {
        return;
    }

    let (x, y) = (mouse.column, mouse.row);
    let in_sessions = app.sessions_area.is_some_and(|r| point_in_rect(x, y, r));
    let in_chat = app.chat_area.is_some_and(|r| point_in_rect(x, y, r));

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_chat {
                app.chat_scroll = app.chat_scroll.saturating_add(3);
            } else if in_sessions {
                app.sessions_nav_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_chat {
                app.chat_scroll = app.chat_scroll.saturating_sub(3);
            } else if in_sessions {
                app.sessions_nav_up();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_edit_line_inserts_at_cursor() {
        let mut text = "ac".to_string();
        let mut cursor = 1;
        edit_line(&mut text, &mut cursor, key(KeyCode::Char('b')));
        assert_eq!(text, "abc");
        assert_eq!(cursor, 2);

        edit_line(&mut text, &mut cursor, key(KeyCode::Backspace));
        edit_line(&mut text, &mut cursor, key(KeyCode::Home));
        edit_line(&mut text, &mut cursor, key(KeyCode::Delete));
        assert_eq!(text, "c");
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_edit_line_handles_unicode() {
        let mut text = String::new();
        let mut cursor = 0;
        for c in "añb".chars() {
            edit_line(&mut text, &mut cursor, key(KeyCode::Char(c)));
        }
        edit_line(&mut text, &mut cursor, key(KeyCode::Left));
        edit_line(&mut text, &mut cursor, key(KeyCode::Backspace));
        assert_eq!(text, "ab");
    }
}
