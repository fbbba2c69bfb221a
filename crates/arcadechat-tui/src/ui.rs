use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};
use arcadechat_core::{ChatMessage, ChatRole, StructuredPayload};
use crate::app::{App, InputMode};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("**") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("**") else {
            break;
        };
        if close == 0 {
            // "****" is not bold text
            spans.push(Span::raw(rest[..open + 4].to_string()));
            rest = &after_open[2..];
            continue;
        }
        if open > 0 {
            spans.push(Span::raw(rest[..open].to_string()));
        }
        spans.push(Span::styled(
            after_open[..close].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after_open[close + 2..];
    }

    // Push any remaining text
    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

/// Wrap text to fit within a given width, returning multiple lines
/// Uses word boundaries for wrapping (doesn't break mid-word unless a word
/// is wider than the whole line)
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: String = word.to_string();
        let mut word_len = word.chars().count();

        // Hard-split words (usually URLs) that can never fit
        while word_len > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current_line));
                current_len = 0;
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            word_len -= width;
            lines.push(head);
        }
        if word_len == 0 {
            continue;
        }

        if current_len == 0 {
            // First word on line
            current_line = word;
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            // Word fits on current line
            current_line.push(' ');
            current_line.push_str(&word);
            current_len += 1 + word_len;
        } else {
            // Word doesn't fit, start new line
            lines.push(std::mem::replace(&mut current_line, word));
            current_len = word_len;
        }
    }

    // Don't forget the last line
    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_history {
        render_history(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (status, status_color) = if app.loading {
        (" STREAMING ", Color::Yellow)
    } else {
        (" ONLINE ", Color::Green)
    };

    let run = match &app.run_id {
        Some(run_id) => format!(" run {}", run_id.chars().take(8).collect::<String>()),
        None => " new run".to_string(),
    };

    let title = Line::from(vec![
        Span::styled(" ARCADE AI ", Style::default().fg(Color::Red).bold()),
        Span::styled("Google Drive Assistant ", Style::default().fg(Color::Gray)),
        Span::styled(status, Style::default().fg(status_color).bold()),
        Span::styled(run, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn connect_lines(payload: &StructuredPayload, width: usize) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        format!("[ CONNECT {} ]  press c", payload.integration.to_uppercase()),
        Style::default()
            .fg(Color::Black)
            .bg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
    ))];
    for chunk in wrap_text_to_width(&payload.url, width) {
        lines.push(Line::from(Span::styled(
            chunk,
            Style::default().fg(Color::Magenta).add_modifier(Modifier::UNDERLINED),
        )));
    }
    lines
}

fn message_lines(msg: &ChatMessage, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (label, color) = match msg.role {
        ChatRole::User => ("You:", Color::Cyan),
        ChatRole::Assistant => ("AI:", Color::Yellow),
    };
    lines.push(Line::from(vec![
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!(" {}", msg.timestamp.with_timezone(&chrono::Local).format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ),
    ]));

    for line in msg.content.lines() {
        if line.trim().is_empty() {
            lines.push(Line::default());
            continue;
        }
        for wrapped in wrap_text_to_width(line, width) {
            lines.push(match msg.role {
                ChatRole::User => Line::from(wrapped),
                ChatRole::Assistant => parse_markdown_line(&wrapped),
            });
        }
    }

    if let Some(payload) = &msg.structured {
        lines.extend(connect_lines(payload, width));
    }

    lines.push(Line::default());
    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area for mouse hit-testing and scroll calculations
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    let width = area.width.saturating_sub(2) as usize;

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(format!(" {} ", app.agent_url));

    let mut lines: Vec<Line> = Vec::new();
    for msg in app.messages() {
        // The streaming placeholder is drawn as the thinking indicator below
        if msg.role == ChatRole::Assistant && msg.content.is_empty() && msg.structured.is_none() {
            continue;
        }
        lines.extend(message_lines(msg, width));
    }

    let waiting_for_text = app.loading
        && app
            .messages()
            .last()
            .map(|m| m.role == ChatRole::User || m.content.is_empty())
            .unwrap_or(true);
    if waiting_for_text {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat_text = if lines.is_empty() {
        Text::from(Span::styled(
            "INSERT COIN... ask the agent about your files",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(lines)
    };

    app.total_chat_lines = u16::try_from(chat_text.lines.len()).unwrap_or(u16::MAX);
    if app.follow_bottom {
        app.scroll = app.max_scroll();
    } else {
        app.scroll = app.scroll.min(app.max_scroll());
    }

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = if app.loading {
        " Message (waiting for reply) "
    } else {
        " Message (Enter to send) "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Get the visible slice of the input
    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing && !app.show_history {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    let hints = match app.input_mode {
        InputMode::Normal => " i:type  n:new chat  h:history  c:connect  j/k:scroll  q:quit ",
        InputMode::Editing => " Enter:send  Esc:stop typing  Ctrl-C:quit ",
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ];
    if let Some(status) = &app.status {
        spans.push(Span::styled(
            format!(" {status}"),
            Style::default().fg(Color::Green),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_history(app: &mut App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 64.min(area.width.saturating_sub(4));
    let rows = app.history.len().max(1) as u16;
    let popup_height = (rows * 2 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat History (Enter load, d delete, Esc close) ");

    if app.history.is_empty() {
        let empty = Paragraph::new(Span::styled(
            " No saved chats yet ",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(empty, popup_area);
        return;
    }

    let items: Vec<ListItem> = app
        .history
        .iter()
        .map(|session| {
            let when = session
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%b %d %H:%M");
            ListItem::new(Text::from(vec![
                Line::from(vec![
                    Span::styled(session.title.clone(), Style::default().bold()),
                    Span::styled(format!("  {when}"), Style::default().fg(Color::DarkGray)),
                ]),
                Line::from(Span::styled(
                    format!("  {}", session.preview.replace('\n', " ")),
                    Style::default().fg(Color::DarkGray),
                )),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.history_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap_text_to_width("the quick brown fox jumps", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn test_wrap_splits_long_urls() {
        let lines = wrap_text_to_width("see https://example.com/abcdef", 10);
        assert_eq!(lines, vec!["see", "https://ex", "ample.com/", "abcdef"]);
    }

    #[test]
    fn test_wrap_empty_text() {
        assert_eq!(wrap_text_to_width("", 10), vec![String::new()]);
    }

    #[test]
    fn test_markdown_bold() {
        let line = parse_markdown_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(plain(&line), "a b c");
    }

    #[test]
    fn test_markdown_unclosed_bold_is_literal() {
        let line = parse_markdown_line("**Error: oops");
        assert_eq!(plain(&line), "**Error: oops");
    }

    #[test]
    fn test_message_lines_include_connect_action() {
        let mut msg = ChatMessage::assistant_placeholder();
        msg.content = "Sure, here's your link:".to_string();
        msg.structured = Some(StructuredPayload {
            url: "https://x".to_string(),
            integration: "googledrive".to_string(),
        });
        let lines = message_lines(&msg, 40);
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert!(text.iter().any(|l| l.starts_with("[ CONNECT GOOGLEDRIVE ]")));
        assert!(text.iter().any(|l| l == "https://x"));
    }
}
