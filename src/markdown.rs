//! Markdown answers to styled terminal lines.
//!
//! Parsing is left to `pulldown-cmark`; this module only maps its events onto
//! ratatui spans and lines. Wrapping is done later by the `Paragraph` widget.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

const RULE_WIDTH: usize = 40;

pub fn render_markdown(source: &str) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::default();
    for event in Parser::new_ext(source, options) {
        renderer.handle(event);
    }
    renderer.finish()
}

fn heading_style(level: HeadingLevel) -> Style {
    match level {
        HeadingLevel::H1 => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        HeadingLevel::H2 => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        _ => Style::default().add_modifier(Modifier::BOLD),
    }
}

fn code_style() -> Style {
    Style::default().fg(Color::LightYellow)
}

#[derive(Default)]
struct TableBuf {
    rows: Vec<Vec<String>>,
    header_rows: usize,
    row: Vec<String>,
    cell: String,
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    // None for bullets, Some(next number) for ordered lists
    lists: Vec<Option<u64>>,
    pending_marker: Option<String>,
    quote_depth: usize,
    in_code_block: bool,
    link_urls: Vec<String>,
    table: Option<TableBuf>,
}

impl Renderer {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.push_str(&text);
                } else if self.in_code_block {
                    for line in text.lines() {
                        let mut spans = self.quote_prefix();
                        spans.push(Span::styled(format!("  {}", line), code_style()));
                        self.lines.push(Line::from(spans));
                    }
                } else {
                    self.push_text(text.to_string(), self.current_style());
                }
            }
            Event::Code(code) => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.push_str(&code);
                } else {
                    self.push_text(code.to_string(), self.current_style().patch(code_style()));
                }
            }
            Event::Html(html) => self.push_text(html.trim_end().to_string(), self.current_style()),
            Event::FootnoteReference(name) => {
                self.push_text(format!("[^{}]", name), self.current_style())
            }
            Event::SoftBreak => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.push(' ');
                } else {
                    self.push_text(" ".to_string(), self.current_style());
                }
            }
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.lines.push(Line::styled(
                    "─".repeat(RULE_WIDTH),
                    Style::default().fg(Color::DarkGray),
                ));
                self.blank_line();
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.push_text(marker.to_string(), self.current_style());
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading(level, _, _) => {
                self.flush_line();
                self.styles.push(heading_style(level));
            }
            Tag::BlockQuote => {
                self.flush_line();
                self.quote_depth += 1;
                self.styles.push(
                    Style::default()
                        .fg(Color::Gray)
                        .add_modifier(Modifier::ITALIC),
                );
            }
            Tag::CodeBlock(_) => {
                self.flush_line();
                self.in_code_block = true;
            }
            Tag::List(start) => {
                self.flush_line();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush_line();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let m = format!("{}. ", n);
                        *n += 1;
                        m
                    }
                    _ => "• ".to_string(),
                };
                self.pending_marker = Some(format!("{}{}", "  ".repeat(depth), marker));
            }
            Tag::Table(_) => {
                self.flush_line();
                self.table = Some(TableBuf::default());
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.row.clear();
                }
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.clear();
                }
            }
            Tag::Emphasis => self.styles.push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.styles.push(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.styles.push(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link(_, url, _) => {
                self.styles.push(
                    Style::default()
                        .fg(Color::Blue)
                        .add_modifier(Modifier::UNDERLINED),
                );
                self.link_urls.push(url.to_string());
            }
            Tag::Image(_, url, _) => {
                self.push_inline("[image: ".to_string(), self.current_style());
                self.link_urls.push(url.to_string());
            }
            Tag::FootnoteDefinition(name) => {
                self.flush_line();
                self.push_text(format!("[^{}]: ", name), self.current_style());
            }
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.flush_line();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            Tag::Heading(..) => {
                self.styles.pop();
                self.flush_line();
                self.blank_line();
            }
            Tag::BlockQuote => {
                self.flush_line();
                self.styles.pop();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                if self.quote_depth == 0 {
                    self.blank_line();
                }
            }
            Tag::CodeBlock(_) => {
                self.in_code_block = false;
                self.blank_line();
            }
            Tag::List(_) => {
                self.flush_line();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            Tag::Item => self.flush_line(),
            Tag::Table(_) => {
                if let Some(table) = self.table.take() {
                    self.render_table(table);
                }
                self.blank_line();
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                    table.header_rows = table.rows.len();
                }
            }
            Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough => {
                self.styles.pop();
            }
            Tag::Link(..) => {
                self.styles.pop();
                if let Some(url) = self.link_urls.pop().filter(|u| !u.is_empty()) {
                    self.push_inline(format!(" ({})", url), Style::default().fg(Color::DarkGray));
                }
            }
            Tag::Image(..) => {
                let url = self.link_urls.pop().unwrap_or_default();
                self.push_inline(format!("] ({})", url), Style::default().fg(Color::DarkGray));
            }
            Tag::FootnoteDefinition(_) => self.flush_line(),
        }
    }

    fn current_style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default(), |acc, s| acc.patch(*s))
    }

    fn quote_prefix(&self) -> Vec<Span<'static>> {
        if self.quote_depth == 0 {
            Vec::new()
        } else {
            vec![Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(Color::DarkGray),
            )]
        }
    }

    fn push_text(&mut self, text: String, style: Style) {
        if self.spans.is_empty() {
            self.spans = self.quote_prefix();
            if let Some(marker) = self.pending_marker.take() {
                self.spans
                    .push(Span::styled(marker, Style::default().fg(Color::Yellow)));
            } else if !self.lists.is_empty() {
                // Continuation lines inside a list item line up with the item text
                self.spans.push(Span::raw("  ".repeat(self.lists.len())));
            }
        }
        self.spans.push(Span::styled(text, style));
    }

    /// Link and image decorations belong to the table cell when one is open
    fn push_inline(&mut self, text: String, style: Style) {
        match self.table.as_mut() {
            Some(table) => table.cell.push_str(&text),
            None => self.push_text(text, style),
        }
    }

    fn flush_line(&mut self) {
        if !self.spans.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.spans)));
        }
    }

    fn blank_line(&mut self) {
        if self.lines.last().is_some_and(|l| !l.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn render_table(&mut self, table: TableBuf) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }

        let mut widths = vec![0usize; columns];
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let border = Style::default().fg(Color::DarkGray);
        for (r, row) in table.rows.iter().enumerate() {
            let is_header = r < table.header_rows;
            let cell_style = if is_header {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let mut spans = self.quote_prefix();
            spans.push(Span::styled("│", border));
            for (i, width) in widths.iter().enumerate() {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let pad = width - cell.chars().count();
                spans.push(Span::styled(format!(" {}{} ", cell, " ".repeat(pad)), cell_style));
                spans.push(Span::styled("│", border));
            }
            self.lines.push(Line::from(spans));

            if is_header && r + 1 == table.header_rows {
                let separator: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
                let mut spans = self.quote_prefix();
                spans.push(Span::styled(format!("├{}┤", separator.join("┼")), border));
                self.lines.push(Line::from(spans));
            }
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}
