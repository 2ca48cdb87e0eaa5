use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use stacks_core::ChatRole;
use crate::app::{App, FocusPane, InputMode, Screen, SESSION_TITLE_CHARS};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Login => render_login_screen(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let subtitle = match (&app.profile, app.controller.as_ref()) {
        (Some(profile), Some(c)) if !c.view().is_empty() => format!("Chat with {}", profile.name),
        (Some(_), _) => "New Conversation".to_string(),
        (None, _) => String::new(),
    };

    let title = Line::from(vec![
        Span::styled(" Stacks AI ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(subtitle, Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match (app.screen, app.input_mode) {
        (Screen::Login, _) => " LOGIN ",
        (Screen::Chat, InputMode::Normal) => " CHAT ",
        (Screen::Chat, InputMode::Editing) => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = match (app.screen, app.input_mode) {
        (Screen::Login, _) => vec![(" Enter ", " continue "), (" Esc ", " quit ")],
        (Screen::Chat, InputMode::Editing) => vec![
            (" Enter ", if app.is_sending() { " waiting " } else { " send " }),
            (" Alt+Enter ", " newline "),
            (" Tab ", " sessions "),
            (" Esc ", " normal "),
        ],
        (Screen::Chat, InputMode::Normal) => {
            let mut pairs = match app.focus {
                FocusPane::Sessions => vec![(" j/k ", " nav "), (" Enter ", " open ")],
                FocusPane::Messages => vec![(" j/k ", " scroll "), (" g/G ", " top/bottom ")],
                FocusPane::Input => vec![(" i ", " edit ")],
            };
            pairs.extend([
                (" Tab ", " focus "),
                (" n ", " new chat "),
                (" L ", " logout "),
                (" q ", " quit "),
            ]);
            pairs
        }
    };

    let mut spans = vec![Span::styled(mode_text, mode_style)];
    for (key, label) in pairs {
        spans.push(Span::styled(key, key_style));
        spans.push(Span::styled(label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_login_screen(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = 9;
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height.min(area.height));

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Welcome To Stacks AI ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let [prompt_area, _, input_area, _, error_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(inner);

    frame.render_widget(
        Paragraph::new("Enter your username to continue").style(Style::default().fg(Color::DarkGray)),
        prompt_area,
    );

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Username ");
    let (visible, cursor_x) = visible_input(&app.username_input, app.username_cursor, input_area);
    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)).block(input_block),
        input_area,
    );
    frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));

    if let Some(error) = &app.login_error {
        frame.render_widget(
            Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red)),
            error_area,
        );
    }
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [sessions_area, main_area] = Layout::horizontal([
        Constraint::Length(36),
        Constraint::Min(0),
    ])
    .areas(area);

    let notification_height = if app.notification.is_some() { 3 } else { 0 };
    let [chat_area, notification_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(notification_height),
        Constraint::Length(3),
    ])
    .areas(main_area);

    // Store areas for mouse hit-testing
    app.sessions_area = Some(sessions_area);
    app.chat_area = Some(chat_area);

    // Inner size minus borders, for scroll calculations
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    render_sessions(app, frame, sessions_area);
    render_messages(app, frame, chat_area);

    if let Some(notification) = &app.notification {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Error (Esc to dismiss) ");
        frame.render_widget(
            Paragraph::new(notification.as_str())
                .style(Style::default().fg(Color::Red))
                .block(block),
            notification_area,
        );
    }

    render_input(app, frame, input_area);
}

fn render_sessions(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sessions;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }))
        .title(" Chat History ");

    let Some(controller) = app.controller.as_ref() else {
        frame.render_widget(block, area);
        return;
    };

    if controller.sessions().is_empty() {
        let empty = Paragraph::new("No chat history yet")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let active = controller.active_session();
    let items: Vec<ListItem> = controller
        .sessions()
        .iter()
        .map(|session| {
            let is_active = active == Some(session.session_id.as_str());
            let title_style = if is_active {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let date = session
                .started_at()
                .map(|ts| ts.with_timezone(&Local).format("%Y-%m-%d").to_string())
                .unwrap_or_default();

            ListItem::new(Text::from(vec![
                Line::from(Span::styled(session.title(SESSION_TITLE_CHARS), title_style)),
                Line::from(Span::styled(date, Style::default().fg(Color::DarkGray))),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.sessions_state);
}

fn render_messages(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Messages;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));

    let (Some(controller), Some(profile)) = (app.controller.as_ref(), app.profile.as_ref()) else {
        frame.render_widget(block, area);
        return;
    };

    let view = controller.view();
    let text = if view.is_empty() && !controller.is_sending() {
        Text::from(vec![
            Line::default(),
            Line::from(Span::styled(
                format!("Welcome, {}", profile.name),
                Style::default().add_modifier(Modifier::BOLD),
            ))
            .centered(),
            Line::from(Span::styled(
                "Start a new conversation by typing a message below.",
                Style::default().fg(Color::DarkGray),
            ))
            .centered(),
        ])
    } else {
        let pending_id = view.pending().map(|m| m.id.as_str());
        let mut lines: Vec<Line> = Vec::new();

        for msg in view.messages() {
            let (label, label_color) = match msg.role {
                ChatRole::User => ("You:", Color::Cyan),
                ChatRole::Assistant => ("AI:", Color::Yellow),
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default().fg(label_color).add_modifier(Modifier::BOLD),
            )));

            // Unanswered question is dimmed until its reply lands
            let body_style = if Some(msg.id.as_str()) == pending_id {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            for line in msg.content.lines() {
                lines.push(Line::from(Span::styled(line.to_string(), body_style)));
            }
            lines.push(Line::default());
        }

        if controller.is_sending() {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat(app.animation_frame as usize + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let sending = app.is_sending();
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if sending {
        Color::DarkGray
    } else if app.focus == FocusPane::Input || editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let title = if sending { " Sending... " } else { " Type a message... " };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Multi-line input is shown on one row with newlines as a visible marker
    let flattened = app.input.replace('\n', "⏎");
    let (visible, cursor_x) = visible_input(&flattened, app.input_cursor, area);
    let text_style = if sending {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };

    frame.render_widget(Paragraph::new(visible).style(text_style).block(block), area);

    if editing && !sending {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// Slice of `text` that fits inside a bordered `area`, scrolled so the cursor
/// stays visible, plus the cursor's column within that slice.
fn visible_input(text: &str, cursor: usize, area: Rect) -> (String, u16) {
    let inner_width = area.width.saturating_sub(2) as usize;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor >= inner_width {
        cursor - inner_width + 1
    } else {
        0
    };

    let visible: String = text.chars().skip(scroll_offset).take(inner_width).collect();
    (visible, (cursor - scroll_offset) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_input_scrolls_with_cursor() {
        let area = Rect::new(0, 0, 7, 3); // 5 columns inside the border
        assert_eq!(visible_input("abc", 3, area), ("abc".to_string(), 3));
        assert_eq!(visible_input("abcdefgh", 8, area), ("efgh".to_string(), 4));
    }
}
