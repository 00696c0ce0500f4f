use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use changi_core::{segments, Message, Role, Segment};
use crate::app::{App, NOTICE};

/// Convert message text into styled lines: links underlined, `**strong**`
/// spans bold, newlines kept.
fn content_lines(text: &str) -> Vec<Line<'static>> {
    let mut lines: Vec<Vec<Span<'static>>> = vec![Vec::new()];
    for segment in segments(text) {
        push_segment(&segment, Style::default(), &mut lines);
    }
    lines.into_iter().map(Line::from).collect()
}

fn push_segment(segment: &Segment<'_>, style: Style, lines: &mut Vec<Vec<Span<'static>>>) {
    match segment {
        Segment::Plain(text) => push_text(text, style, lines),
        Segment::Link(url) => push_text(
            url,
            style.fg(Color::LightBlue).add_modifier(Modifier::UNDERLINED),
            lines,
        ),
        Segment::Strong(children) => {
            for child in children {
                push_segment(child, style.add_modifier(Modifier::BOLD), lines);
            }
        }
    }
}

fn push_text(text: &str, style: Style, lines: &mut Vec<Vec<Span<'static>>>) {
    for (i, part) in text.split('\n').enumerate() {
        if i > 0 {
            lines.push(Vec::new());
        }
        if part.is_empty() {
            continue;
        }
        if let Some(line) = lines.last_mut() {
            line.push(Span::styled(part.to_string(), style));
        }
    }
}

/// Wrap a styled line to `width` columns at word boundaries, keeping each
/// span's style. Whitespace is kept except where a row breaks; a word wider
/// than a whole row is split across rows.
fn wrap_line_to_width(line: &Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 {
        return vec![line.clone()];
    }

    let mut rows: Vec<Vec<Span<'static>>> = vec![Vec::new()];
    let mut current_len = 0;

    for span in &line.spans {
        for (is_space, word) in words(&span.content) {
            let word_len = word.chars().count();

            if current_len + word_len <= width {
                // Fits on the current row
                push_span(&mut rows, word, span.style);
                current_len += word_len;
            } else if is_space {
                // The row breaks here and the whitespace is dropped
                rows.push(Vec::new());
                current_len = 0;
            } else if word_len <= width {
                rows.push(Vec::new());
                push_span(&mut rows, word, span.style);
                current_len = word_len;
            } else {
                // Too long for any row: fill the current row, then whole rows
                let mut piece = String::new();
                for c in word.chars() {
                    if current_len == width {
                        push_span(&mut rows, &piece, span.style);
                        piece.clear();
                        rows.push(Vec::new());
                        current_len = 0;
                    }
                    piece.push(c);
                    current_len += 1;
                }
                push_span(&mut rows, &piece, span.style);
            }
        }
    }

    rows.into_iter().map(Line::from).collect()
}

/// Split text into alternating runs of whitespace and non-whitespace.
fn words(text: &str) -> Vec<(bool, &str)> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut in_space = None;
    for (i, c) in text.char_indices() {
        let is_space = c.is_whitespace();
        match in_space {
            Some(prev) if prev != is_space => {
                runs.push((prev, &text[start..i]));
                start = i;
            }
            _ => {}
        }
        in_space = Some(is_space);
    }
    if let Some(prev) = in_space {
        runs.push((prev, &text[start..]));
    }
    runs
}

fn push_span(rows: &mut [Vec<Span<'static>>], text: &str, style: Style) {
    if text.is_empty() {
        return;
    }
    if let Some(row) = rows.last_mut() {
        row.push(Span::styled(text.to_string(), style));
    }
}

fn message_lines(msg: &Message) -> Vec<Line<'static>> {
    let color = match msg.role() {
        Role::User => Color::Cyan,
        Role::Assistant => Color::Yellow,
    };
    let label = Span::styled(
        format!("{}:", msg.role().as_str()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    );

    let mut lines = vec![Line::from(vec![
        label,
        Span::raw(" "),
        Span::styled(msg.timestamp().to_string(), Style::default().fg(Color::DarkGray)),
    ])];
    lines.extend(content_lines(msg.content()));
    lines.push(Line::default());
    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, input, footer
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

    if app.show_notice {
        render_notice(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Changi Airport Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", app.endpoint), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let transcript = app.transcript();
    let mut lines: Vec<Line> = transcript.iter().flat_map(message_lines).collect();

    if app.is_busy() {
        lines.push(Line::from(Span::styled(
            format!("{}:", Role::Assistant.as_str()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Typing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    // Pre-wrap so the row count used for scrolling is exactly what is drawn
    let width = app.chat_width as usize;
    let rows: Vec<Line> = lines
        .iter()
        .flat_map(|line| wrap_line_to_width(line, width))
        .collect();
    app.fit_scroll(u16::try_from(rows.len()).unwrap_or(u16::MAX));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let chat = Paragraph::new(Text::from(rows))
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.is_busy();
    let (title, border_color) = if busy {
        (" Waiting for answer... ", Color::DarkGray)
    } else {
        (" Ask (Enter to send) ", Color::Yellow)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else {
        (app.cursor + 1).saturating_sub(inner_width)
    };

    let visible_text: String = app.draft
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_color = if busy { Color::DarkGray } else { Color::Cyan };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(block);

    frame.render_widget(input, area);

    if !app.show_notice {
        let cursor_x = (app.cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Ctrl-L ", key_style),
        Span::styled(" new chat ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ];
    if app.is_busy() {
        hints.push(Span::styled(" sending ", Style::default().fg(Color::Yellow)));
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_notice(frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 9.min(area.height.saturating_sub(2));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Before you start ");

    let text = Text::from(vec![
        Line::from(NOTICE),
        Line::default(),
        Line::from(Span::styled(
            "Press Enter to continue",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ]);

    let notice = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(notice, popup_area);
}
