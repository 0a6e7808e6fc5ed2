use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Lines moved by one PageUp/PageDown
const PAGE_SCROLL: u16 = 10;

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
        AppEvent::Resize(width, height) => {
            tracing::debug!(width, height, "terminal resized");
        }
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    app.poll_reply().await;
    Ok(())
}

pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Any key press dismisses the last status message
    app.status_message = None;

    if app.show_api_key_input {
        handle_api_key_input(app, key);
        return;
    }
    if app.show_rename_input {
        handle_rename_input(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Tab => app.cycle_focus(),
        KeyCode::Char('i') => app.focus_input(),
        KeyCode::Char('n') => app.new_chat(),
        KeyCode::Char('b') => app.toggle_sidebar(),
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Char('K') => app.open_api_key_input(),
        KeyCode::PageDown => app.scroll_chat_down(PAGE_SCROLL),
        KeyCode::PageUp => app.scroll_chat_up(PAGE_SCROLL),

        _ => match app.focus {
            FocusPane::Sidebar => handle_sidebar_key(app, key),
            FocusPane::Chat => handle_chat_key(app, key),
            FocusPane::Input => {
                if key.code == KeyCode::Enter {
                    app.focus_input();
                }
            }
        },
    }
}

fn handle_sidebar_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.sidebar_down(),
        KeyCode::Char('k') | KeyCode::Up => app.sidebar_up(),
        KeyCode::Enter | KeyCode::Char('l') => app.select_highlighted(),
        KeyCode::Char('r') => app.start_rename(),
        KeyCode::Char('d') | KeyCode::Delete => app.delete_highlighted(),
        _ => {}
    }
}

fn handle_chat_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_down(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_up(app.chat_height / 2);
        }
        KeyCode::Char('g') => app.scroll_chat_to_top(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        KeyCode::Enter => app.focus_input(),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.cycle_focus();
        }
        // Alt+Enter or Shift+Enter starts a new line, plain Enter sends
        KeyCode::Enter if key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) => {
            insert_char(&mut app.input, &mut app.input_cursor, '\n');
        }
        KeyCode::Enter => app.send_input(),
        KeyCode::PageDown => app.scroll_chat_down(PAGE_SCROLL),
        KeyCode::PageUp => app.scroll_chat_up(PAGE_SCROLL),
        _ => edit_text(&mut app.input, &mut app.input_cursor, key),
    }
}

fn handle_rename_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_rename(),
        KeyCode::Enter => app.confirm_rename(),
        _ => edit_text(&mut app.rename_input, &mut app.rename_cursor, key),
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_api_key_input(),
        KeyCode::Enter => app.confirm_api_key(),
        _ => edit_text(&mut app.api_key_input, &mut app.api_key_input_cursor, key),
    }
}

fn insert_char(text: &mut String, cursor: &mut usize, c: char) {
    let byte_pos = char_to_byte_index(text, *cursor);
    text.insert(byte_pos, c);
    *cursor += 1;
}

/// Cursor movement and character editing shared by every text field
fn edit_text(text: &mut String, cursor: &mut usize, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = text.chars().count();
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = text.chars().count();
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = text.chars().count();
        }
        KeyCode::Char(c) => insert_char(text, cursor, c),
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Determine which area the mouse is in (position-based scrolling)
    let in_sidebar = app.sidebar_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_sidebar {
                app.sidebar_down();
            } else if in_chat {
                app.scroll_chat_down(3);
            }
        }
        MouseEventKind::ScrollUp => {
            if in_sidebar {
                app.sidebar_up();
            } else if in_chat {
                app.scroll_chat_up(3);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askai_core::{Config, ConversationStore, JsonFileRepository};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_key(app, press(KeyCode::Char(c)));
        }
    }

    fn test_app(dir: &tempfile::TempDir) -> App {
        let store = ConversationStore::open(JsonFileRepository::new(dir.path().join("conversations.json")));
        let config = Config {
            base_url: Some("http://127.0.0.1:9".to_string()),
            ..Config::new()
        };
        App::from_parts(config, store)
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_editing_is_utf8_safe() {
        let mut text = String::new();
        let mut cursor = 0;
        for c in "añb".chars() {
            edit_text(&mut text, &mut cursor, press(KeyCode::Char(c)));
        }
        edit_text(&mut text, &mut cursor, press(KeyCode::Left));
        edit_text(&mut text, &mut cursor, press(KeyCode::Backspace));
        assert_eq!(text, "ab");
        assert_eq!(cursor, 1);

        edit_text(&mut text, &mut cursor, press(KeyCode::Delete));
        assert_eq!(text, "a");
        edit_text(&mut text, &mut cursor, press(KeyCode::End));
        assert_eq!(cursor, 1);
    }

    #[tokio::test]
    async fn test_enter_sends_and_second_enter_is_ignored_while_sending() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        type_text(&mut app, "hello");
        handle_key(&mut app, press(KeyCode::Enter));
        assert!(app.is_sending());
        assert!(app.input.is_empty());

        type_text(&mut app, "again");
        handle_key(&mut app, press(KeyCode::Enter));
        assert_eq!(app.input, "again");
        assert_eq!(app.active_messages().len(), 1);

        while app.is_sending() {
            handle_event(&mut app, AppEvent::Tick).await.unwrap();
            tokio::task::yield_now().await;
        }
        assert_eq!(app.active_messages().len(), 2);
    }

    #[test]
    fn test_alt_enter_inserts_newline() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        type_text(&mut app, "a");
        handle_key(&mut app, KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT));
        type_text(&mut app, "b");

        assert_eq!(app.input, "a\nb");
        assert!(!app.is_sending());
    }

    #[test]
    fn test_sidebar_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        handle_key(&mut app, press(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);
        handle_key(&mut app, press(KeyCode::Char('n')));
        handle_key(&mut app, press(KeyCode::Esc));
        handle_key(&mut app, press(KeyCode::Char('n')));
        handle_key(&mut app, press(KeyCode::Esc));
        assert_eq!(app.store.conversations().len(), 2);

        // Input -> Sidebar
        handle_key(&mut app, press(KeyCode::Tab));
        assert_eq!(app.focus, FocusPane::Sidebar);

        handle_key(&mut app, press(KeyCode::Char('r')));
        assert!(app.show_rename_input);
        handle_key(&mut app, press(KeyCode::End));
        type_text(&mut app, "!");
        handle_key(&mut app, press(KeyCode::Enter));
        assert_eq!(app.store.conversations()[0].title, "New Chat!");

        handle_key(&mut app, press(KeyCode::Char('d')));
        assert_eq!(app.store.conversations().len(), 1);
    }

    #[test]
    fn test_ctrl_c_quits_from_popup() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.open_api_key_input();

        handle_key(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));

        assert!(app.should_quit);
    }
}
