use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, InputMode};
use crate::markdown::render_markdown;
use crate::message::{ChatMessage, ContentKind, Sender};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, input, footer
    let [header_area, transcript_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, transcript_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Popups (notice wins over the attach prompt)
    if let Some(notice) = app.notice.as_deref() {
        render_notice(notice, frame, area);
    } else if app.input_mode == InputMode::Attaching {
        render_attach_prompt(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let settings = app.client.settings();
    let thinking = if app.input.thinking_mode() {
        Span::styled(
            format!(" Thinking mode: ON ({}) ", settings.pro_model),
            Style::default().fg(Color::Magenta).bold(),
        )
    } else {
        Span::styled(
            format!(" Thinking mode: off ({}) ", settings.fast_model),
            Style::default().fg(Color::Gray),
        )
    };

    let key = match app.key_source {
        Some(source) => Span::styled(format!(" key: {} ", source), Style::default().fg(Color::Gray)),
        None if app.client.has_credential() => Span::raw(""),
        None => Span::styled(" no API key ", Style::default().fg(Color::Red).bold()),
    };

    let title = Line::from(vec![
        Span::styled(" AI Study Helper ", Style::default().fg(Color::Cyan).bold()),
        thinking,
        key,
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn sender_line(msg: &ChatMessage) -> Line<'static> {
    let (label, color) = match msg.sender() {
        Sender::User => ("You", Color::Cyan),
        Sender::Ai => ("AI", Color::Yellow),
    };
    Line::from(vec![
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {}", msg.display_time()), Style::default().fg(Color::DarkGray)),
    ])
}

/// Every transcript row, before wrapping
pub fn transcript_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in app.conversation.messages() {
        lines.push(sender_line(msg));

        if msg.kind() == ContentKind::Image {
            if let Some(image) = msg.image() {
                lines.push(Line::from(Span::styled(
                    format!("[image: {} ({})]", image.display_name(), image.mime_type),
                    Style::default().fg(Color::Magenta),
                )));
            }
        }

        let text = msg.text().unwrap_or_default();
        match msg.sender() {
            Sender::User => {
                lines.extend(text.lines().map(|l| Line::from(l.to_string())));
            }
            Sender::Ai => lines.extend(render_markdown(text)),
        }
        lines.push(Line::default());
    }

    if app.is_loading() {
        lines.push(Line::from(Span::styled(
            "AI",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    app.transcript_area = Some(area);
    // Inner size minus borders
    app.transcript_height = area.height.saturating_sub(2);
    app.transcript_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Study chat ");

    if app.conversation.is_empty() && !app.is_loading() {
        let mut hint = vec![Line::from(Span::styled(
            "Ask your study helper for notes, summaries, short answers or maths steps...",
            Style::default().fg(Color::DarkGray),
        ))];
        if !app.client.has_credential() {
            hint.push(Line::default());
            hint.push(Line::from(Span::styled(
                "No API key found. Set GEMINI_API_KEY (or API_KEY) before asking.",
                Style::default().fg(Color::Red),
            )));
        }
        app.update_transcript_extent(0);
        let placeholder = Paragraph::new(Text::from(hint))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(placeholder, area);
        return;
    }

    // Count rows with the same word wrapping the widget renders with
    let chat = Paragraph::new(Text::from(transcript_lines(app))).wrap(Wrap { trim: false });
    let total = chat.line_count(app.transcript_width).min(u16::MAX as usize) as u16;
    app.update_transcript_extent(total);

    let chat = chat.block(block).scroll((app.transcript_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if app.is_loading() {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };

    let mut title = vec![Span::raw(if app.is_loading() {
        " Waiting for answer... "
    } else {
        " Ask "
    })];
    if let Some(image) = app.input.image() {
        title.push(Span::styled(
            format!(" [{}] ", image.display_name()),
            Style::default().fg(Color::Black).bg(Color::Green),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Line::from(title));

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2);
    let (visible_text, cursor_x) = visible_window(app.input.text(), app.input.cursor(), inner_width);

    let input = if app.input.text().is_empty() {
        let placeholder = if app.input.image().is_some() {
            "Add a prompt for the image..."
        } else {
            "Ask your study helper..."
        };
        Paragraph::new(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        Paragraph::new(visible_text).style(Style::default().fg(Color::Cyan))
    };

    frame.render_widget(input.block(block), area);

    // Show cursor when editing
    if editing && app.notice.is_none() {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// Slice of `text` that fits in `width` columns with the cursor (a char index)
/// in view, plus the cursor's display column inside that slice.
fn visible_window(text: &str, cursor: usize, width: u16) -> (String, u16) {
    let width = width as usize;
    let chars: Vec<(char, usize)> = text
        .chars()
        .map(|c| (c, c.width().unwrap_or(0)))
        .collect();
    let cursor = cursor.min(chars.len());
    let mut cursor_col: usize = chars[..cursor].iter().map(|(_, w)| w).sum();

    // Drop leading chars until the cursor cell itself fits
    let mut start = 0;
    while start < cursor && cursor_col + 1 > width {
        cursor_col -= chars[start].1;
        start += 1;
    }

    let mut used = 0;
    let visible = chars[start..]
        .iter()
        .take_while(|(_, w)| {
            used += w;
            used <= width
        })
        .map(|(c, _)| *c)
        .collect();
    (visible, cursor_col.min(width.saturating_sub(1)) as u16)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INPUT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        InputMode::Attaching => (" ATTACH ", Style::default().bg(Color::Green).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: &[(&str, &str)] = match app.input_mode {
        InputMode::Normal => &[
            ("i", "type"),
            ("j/k", "scroll"),
            ("a", "image"),
            ("x", "drop image"),
            ("t", "thinking"),
            ("q", "quit"),
        ],
        InputMode::Editing => &[
            ("Enter", "send"),
            ("^O", "image"),
            ("^X", "drop image"),
            ("^T", "thinking"),
            ("Esc", "stop typing"),
        ],
        InputMode::Attaching => &[("Enter", "attach"), ("Esc", "cancel")],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)];
    for (key, label) in pairs {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height);
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn render_notice(notice: &str, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 50, 5);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Notice ");

    let text = Text::from(vec![
        Line::from(notice.to_string()),
        Line::from(Span::styled(
            "Press any key to continue",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    frame.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        popup,
    );
}

fn render_attach_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 70, 7);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Attach image ");

    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let Some(input_area) = attach_input_row(inner) else {
        return;
    };
    if input_area.y > inner.y {
        let instructions = Paragraph::new("Image path or data:image URL. Enter to attach, Esc to cancel.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));
    }

    // Show the tail of long paths so the cursor stays in view
    let len = app.attach_input.chars().count();
    let (visible, cursor_x) = visible_window(&app.attach_input, len, input_area.width);
    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)),
        input_area,
    );
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

/// Path row of the attach popup: two rows under the instructions, pulled up
/// to the last inner row on short terminals
fn attach_input_row(inner: Rect) -> Option<Rect> {
    if inner.height == 0 || inner.width == 0 {
        return None;
    }
    let offset = 2.min(inner.height - 1);
    Some(Rect::new(inner.x, inner.y + offset, inner.width, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gemini::{GeminiClient, ModelSettings};
    use crate::message::SendRequest;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&Config::default(), tx).without_persistence();
        app.client = GeminiClient::new(Some("test".into()), "http://127.0.0.1:9", ModelSettings::default());
        app
    }

    fn draw(app: &mut App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn shows_exchange_and_thinking_indicator() {
        let mut app = app();
        app.conversation
            .begin(&SendRequest {
                prompt: "Summarize photosynthesis".into(),
                image: None,
                thinking_mode: false,
            })
            .unwrap();

        let screen = draw(&mut app, 80, 20);
        assert!(screen.contains("Summarize photosynthesis"));
        assert!(screen.contains("Thinking."));
        assert!(screen.contains("Waiting for answer"));

        app.on_generation(Ok("**Photosynthesis** makes sugar.".into()));
        let screen = draw(&mut app, 80, 20);
        assert!(screen.contains("Photosynthesis makes sugar."));
        assert!(!screen.contains("Thinking."));
    }

    #[test]
    fn header_reflects_thinking_mode() {
        let mut app = app();
        assert!(draw(&mut app, 100, 12).contains("Thinking mode: off (gemini-2.5-flash)"));
        app.toggle_thinking();
        assert!(draw(&mut app, 100, 12).contains("Thinking mode: ON (gemini-2.5-pro)"));
    }

    #[test]
    fn notice_popup_is_drawn() {
        let mut app = app();
        app.submit();
        let screen = draw(&mut app, 80, 20);
        assert!(screen.contains("Please enter a message"));
    }

    #[test]
    fn long_transcript_sticks_to_bottom() {
        let mut app = app();
        for i in 0..10 {
            app.conversation
                .begin(&SendRequest {
                    prompt: format!("question {}", i),
                    image: None,
                    thinking_mode: false,
                })
                .unwrap();
            app.conversation.finish(Ok(format!("answer {}", i)));
        }

        let screen = draw(&mut app, 60, 16);
        assert!(screen.contains("answer 9"));
        assert!(!screen.contains("question 0"));
        assert!(app.transcript_scroll > 0);
    }

    #[test]
    fn long_wrapped_answer_ends_in_view() {
        let mut app = app();
        app.conversation
            .begin(&SendRequest {
                prompt: "Explain the water cycle".into(),
                image: None,
                thinking_mode: false,
            })
            .unwrap();
        let mut answer: Vec<String> = (0..60).map(|i| format!("word{:03}x", i)).collect();
        answer.push("FINALWORD".into());
        app.on_generation(Ok(answer.join(" ")));

        let screen = draw(&mut app, 24, 14);
        assert!(screen.contains("FINALWORD"), "{}", screen);
        assert_eq!(app.transcript_scroll, app.max_scroll);
    }

    #[test]
    fn input_window_measures_wide_chars() {
        // Each CJK char takes two columns
        assert_eq!(visible_window("光合作用", 4, 20), ("光合作用".to_string(), 8));
        assert_eq!(visible_window("ab光c", 3, 20), ("ab光c".to_string(), 4));

        let (visible, col) = visible_window("光合作用光合作用", 8, 6);
        assert_eq!(col, 4);
        assert_eq!(visible, "作用");
    }

    #[test]
    fn input_window_scrolls_ascii_to_cursor() {
        let (visible, col) = visible_window("abcdefghij", 10, 5);
        assert_eq!(visible, "ghij");
        assert_eq!(col, 4);
        assert_eq!(visible_window("abc", 0, 5), ("abc".to_string(), 0));
    }

    #[test]
    fn attach_row_stays_inside_short_popup() {
        assert_eq!(attach_input_row(Rect::new(1, 1, 30, 5)), Some(Rect::new(1, 3, 30, 1)));
        assert_eq!(attach_input_row(Rect::new(1, 1, 30, 2)), Some(Rect::new(1, 2, 30, 1)));
        assert_eq!(attach_input_row(Rect::new(1, 1, 30, 1)), Some(Rect::new(1, 1, 30, 1)));
        assert_eq!(attach_input_row(Rect::new(1, 1, 30, 0)), None);
    }

    #[test]
    fn attach_prompt_on_short_terminal_shows_path() {
        let mut app = app();
        app.open_attach_prompt();
        app.attach_input = "notes.png".into();
        let screen = draw(&mut app, 40, 4);
        assert!(screen.contains("notes.png"), "{}", screen);
    }
}
