use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Generation(outcome) => app.on_generation(outcome),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // The notice popup swallows the next key
    if app.notice.is_some() {
        app.notice = None;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
        InputMode::Attaching => handle_attach_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('a') => app.open_attach_prompt(),
        KeyCode::Char('x') => app.clear_image(),
        KeyCode::Char('t') => app.toggle_thinking(),

        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown | KeyCode::Char('d') => app.scroll_down(app.transcript_height.max(1) / 2),
        KeyCode::PageUp | KeyCode::Char('u') => app.scroll_up(app.transcript_height.max(1) / 2),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_to_top(),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        // Single-line input: Shift+Enter neither sends nor inserts a newline
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {}
        KeyCode::Enter => app.submit(),

        KeyCode::Char('t') if ctrl => app.toggle_thinking(),
        KeyCode::Char('o') if ctrl => app.open_attach_prompt(),
        KeyCode::Char('x') if ctrl => app.clear_image(),
        KeyCode::Char('a') if ctrl => app.input.move_home(),
        KeyCode::Char('e') if ctrl => app.input.move_end(),

        KeyCode::Backspace => app.input.backspace(),
        KeyCode::Delete => app.input.delete(),
        KeyCode::Left => app.input.move_left(),
        KeyCode::Right => app.input.move_right(),
        KeyCode::Home => app.input.move_home(),
        KeyCode::End => app.input.move_end(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(app.transcript_height.max(1) / 2),
        KeyCode::PageDown => app.scroll_down(app.transcript_height.max(1) / 2),
        KeyCode::Char(c) if !ctrl => app.input.insert(c),
        _ => {}
    }
}

fn handle_attach_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.attach_input.clear();
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Enter => app.confirm_attach(),
        KeyCode::Backspace => {
            app.attach_input.pop();
        }
        KeyCode::Char(c) => app.attach_input.push(c),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if app.notice.is_some() {
        return;
    }
    match app.input_mode {
        InputMode::Attaching => app.attach_input.push_str(text.trim()),
        _ if text.trim_start().starts_with("data:image/") => {
            app.attach_input = text.trim().to_string();
            if !app.is_loading() {
                app.confirm_attach();
            }
        }
        _ => {
            app.input_mode = InputMode::Editing;
            app.input.insert_str(text);
        }
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_transcript = app
        .transcript_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_transcript {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gemini::{GeminiClient, ModelSettings};
    use crossterm::event::{KeyEventKind, KeyEventState};
    use tokio::sync::mpsc;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&Config::default(), tx).without_persistence();
        app.client = GeminiClient::new(None, "http://127.0.0.1:9", ModelSettings::default());
        app
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            handle_event(app, key(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    #[test]
    fn enter_on_blank_input_raises_notice_then_any_key_dismisses() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));
        assert!(app.notice.is_some());
        assert!(app.conversation.is_empty());

        handle_event(&mut app, key(KeyCode::Char('z'), KeyModifiers::NONE));
        assert!(app.notice.is_none());
        assert_eq!(app.input.text(), "");
    }

    #[test]
    fn shift_enter_does_nothing() {
        let mut app = app();
        type_str(&mut app, "Define osmosis");
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::SHIFT));
        assert_eq!(app.input.text(), "Define osmosis");
        assert!(app.conversation.is_empty());
    }

    #[tokio::test]
    async fn enter_submits_and_clears_input() {
        let mut app = app();
        type_str(&mut app, "Define osmosis");
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));

        assert_eq!(app.input.text(), "");
        assert_eq!(app.conversation.len(), 1);
        assert!(app.is_loading());
    }

    #[test]
    fn ctrl_t_toggles_thinking_while_editing() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('t'), KeyModifiers::CONTROL));
        assert!(app.input.thinking_mode());
        assert_eq!(app.input.text(), "");
    }

    #[test]
    fn attach_popup_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cell.jpg");
        std::fs::write(&path, b"jpg").unwrap();

        let mut app = app();
        handle_event(&mut app, key(KeyCode::Esc, KeyModifiers::NONE));
        handle_event(&mut app, key(KeyCode::Char('a'), KeyModifiers::NONE));
        assert_eq!(app.input_mode, InputMode::Attaching);

        handle_event(&mut app, AppEvent::Paste(path.display().to_string()));
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));

        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(app.input.image().unwrap().mime_type, "image/jpeg");
        assert!(app.notice.is_none());
    }

    #[test]
    fn pasted_data_url_attaches_directly() {
        let mut app = app();
        handle_event(&mut app, AppEvent::Paste("data:image/png;base64,iVBORw0KGgo=".into()));
        assert_eq!(app.input.image().unwrap().mime_type, "image/png");
        assert_eq!(app.input.text(), "");
    }

    #[test]
    fn scroll_keys_are_clamped() {
        let mut app = app();
        app.input_mode = InputMode::Normal;
        app.transcript_height = 10;
        app.max_scroll = 5;
        for _ in 0..8 {
            handle_event(&mut app, key(KeyCode::Char('j'), KeyModifiers::NONE));
        }
        assert_eq!(app.transcript_scroll, 5);
        handle_event(&mut app, key(KeyCode::Char('g'), KeyModifiers::NONE));
        assert_eq!(app.transcript_scroll, 0);
    }
}
