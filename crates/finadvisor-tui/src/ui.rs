use finadvisor_core::{format_agent_message, ChatRole, JobPhase};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, EditTarget, InputMode, ProfileField, Screen};

/// Parse a line of text with **bold** markdown into styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        if end > 0 {
            spans.push(Span::styled(
                after[..end].to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

/// Rows a set of lines occupies once wrapped to `width` columns
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    rows.min(u16::MAX as usize) as u16
}

/// Clamp a scroll offset to the content, pinning it to the bottom when following.
fn clamp_scroll(scroll: &mut u16, follow: bool, content: u16, visible: u16) -> u16 {
    let max = content.saturating_sub(visible);
    *scroll = if follow { max } else { (*scroll).min(max) };
    *scroll
}

/// Short job state for the agents pane title
fn phase_label(phase: &JobPhase, status: Option<&str>) -> String {
    match phase {
        JobPhase::Idle => "idle".to_string(),
        JobPhase::Submitted => "submitted".to_string(),
        JobPhase::Polling => status.unwrap_or("processing").to_string(),
        JobPhase::Completed => "completed".to_string(),
        JobPhase::Failed(reason) => format!("failed: {}", reason),
        JobPhase::Cancelled => "cancelled".to_string(),
    }
}

fn working_dots(app: &App) -> String {
    ".".repeat(app.animation_frame as usize + 1)
}

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
        Screen::Profile => render_profile_screen(app, frame, body_area),
        Screen::Advisor => render_advisor_screen(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(
        " FinAdvisor ",
        Style::default().fg(Color::Cyan).bold(),
    )];

    for (i, screen) in Screen::ALL.iter().enumerate() {
        let label = format!(" {} {} ", i + 1, screen.title());
        if *screen == app.screen {
            spans.push(Span::styled(
                label,
                Style::default().bg(Color::Cyan).fg(Color::Black).bold(),
            ));
        } else {
            spans.push(Span::styled(label, Style::default().fg(Color::White)));
        }
    }

    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Profile => " PROFILE ",
        Screen::Advisor => " ADVISOR ",
        Screen::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let keys: &[(&str, &str)] = match (app.screen, app.input_mode) {
        (_, InputMode::Editing) => &[("Enter", "save"), ("Esc", "cancel")],
        (Screen::Profile, InputMode::Normal) => &[
            ("j/k", "field"),
            ("Enter", "edit"),
            ("h/l", "risk"),
            ("x", "drop goal"),
            ("Tab", "screen"),
            ("q", "quit"),
        ],
        (Screen::Advisor, InputMode::Normal) => &[
            ("e", "data"),
            ("i", "query"),
            ("Enter", "run"),
            ("c", "cancel"),
            ("r", "report"),
            ("j/k", "scroll"),
            ("q", "quit"),
        ],
        (Screen::Chat, InputMode::Normal) => &[
            ("i", "type"),
            ("j/k", "scroll"),
            ("G", "latest"),
            ("Tab", "screen"),
            ("q", "quit"),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style)];
    for (key, label) in keys {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    if let Some(status) = &app.status_message {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Yellow)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Single-line input box with horizontal scrolling; shows the cursor while
/// `target` is being edited.
fn render_input(app: &App, frame: &mut Frame, area: Rect, title: &str, value: &str, target: EditTarget) {
    let editing = app.input_mode == InputMode::Editing && app.edit_target == Some(target);
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", title));

    let inner_width = area.width.saturating_sub(2) as usize;
    let (text, cursor_pos) = if editing {
        (app.input.as_str(), app.input_cursor)
    } else {
        (value, 0)
    };

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Newlines would break cursor placement, so show them as spaces
    let visible_text: String = text
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_profile_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [form_area, preview_area] = Layout::horizontal([
        Constraint::Percentage(55),
        Constraint::Percentage(45),
    ])
    .areas(area);

    let [list_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(form_area);

    let items: Vec<ListItem> = app
        .profile_fields
        .iter()
        .map(|field| {
            let label = field.label();
            match field {
                ProfileField::AddGoal | ProfileField::Submit => ListItem::new(Line::from(
                    Span::styled(label, Style::default().fg(Color::Green).bold()),
                )),
                _ => ListItem::new(Line::from(vec![
                    Span::styled(format!("{:<28}", label), Style::default().fg(Color::Gray)),
                    Span::styled(app.field_value(*field), Style::default().fg(Color::White)),
                ])),
            }
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Financial details "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, list_area, &mut app.profile_state);

    let selected = app.selected_field();
    let (title, target) = match selected {
        Some(field) if field.is_text() => (field.label(), EditTarget::Profile(field)),
        _ => ("Value".to_string(), EditTarget::Profile(ProfileField::Salary)),
    };
    let value = selected.map(|f| app.field_value(f)).unwrap_or_default();
    render_input(app, frame, input_area, &title, &value, target);

    // Right side: goals added so far and the summary the advisor will get
    let [goals_area, summary_area] = Layout::vertical([
        Constraint::Length((app.profile.life_goals.len().clamp(1, 6) + 2) as u16),
        Constraint::Min(0),
    ])
    .areas(preview_area);

    let goals: Vec<ListItem> = if app.profile.life_goals.is_empty() {
        vec![ListItem::new(Span::styled(
            "No goals yet",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        app.profile
            .life_goals
            .iter()
            .map(|goal| {
                ListItem::new(format!(
                    "{} in {} years, ₹{}",
                    goal.name, goal.timeline_years, goal.cost
                ))
            })
            .collect()
    };
    frame.render_widget(
        List::new(goals).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta))
                .title(" Life goals "),
        ),
        goals_area,
    );

    let summary = Paragraph::new(app.profile.summary())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Summary preview "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(summary, summary_area);
}

fn render_advisor_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [results_area, data_area, query_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(3),
    ])
    .areas(area);

    let [agents_area, response_area] = Layout::horizontal([
        Constraint::Percentage(50),
        Constraint::Percentage(50),
    ])
    .areas(results_area);

    let tracker = app.advisor.tracker();

    // Agent conversation
    let mut lines: Vec<Line> = Vec::new();
    for message in tracker.results() {
        lines.push(Line::from(Span::styled(
            format!("{}:", message.display_name()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        for line in format_agent_message(message).lines() {
            lines.push(parse_markdown_line(line));
        }
        lines.push(Line::default());
    }
    if app.advisor.is_busy() {
        lines.push(Line::from(Span::styled(
            format!("Agents are working{}", working_dots(app)),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "Agent messages appear here once a query is running.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let inner_height = agents_area.height.saturating_sub(2);
    let inner_width = agents_area.width.saturating_sub(2);
    let content = wrapped_height(&lines, inner_width);

    let agents_title = match tracker.job_id() {
        Some(id) => format!(" Agents: {} ({}) ", id, phase_label(tracker.phase(), tracker.status())),
        None => " Agents ".to_string(),
    };

    // Final response, or the submission acknowledgement until then
    let mut response_lines: Vec<Line> = match tracker.display_output() {
        Some(text) => text.lines().map(parse_markdown_line).collect(),
        None => vec![Line::from(Span::styled(
            "Fill in your data and ask a question.",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    if let JobPhase::Failed(reason) = tracker.phase() {
        response_lines.push(Line::default());
        response_lines.push(Line::from(Span::styled(
            format!("Job failed: {}", reason),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }
    if let Some(error) = &app.advisor_error {
        response_lines.push(Line::default());
        response_lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }
    let response_border = if tracker.phase() == &JobPhase::Completed {
        Color::Green
    } else {
        Color::DarkGray
    };

    let scroll = clamp_scroll(&mut app.advisor_scroll, app.advisor_follow, content, inner_height);

    let agents = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(agents_title),
        )
        .wrap(Wrap { trim: true })
        .scroll((scroll, 0));
    frame.render_widget(agents, agents_area);

    let response = Paragraph::new(Text::from(response_lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(response_border))
                .title(" Response "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(response, response_area);

    let data = app.advisor_data.clone();
    let query = app.advisor_query.clone();
    render_input(app, frame, data_area, "Your data (e)", &data, EditTarget::AdvisorData);
    render_input(app, frame, query_area, "Query (i)", &query, EditTarget::AdvisorQuery);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.chat_messages {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(msg.content.clone()));
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    "Advisor:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                for line in msg.content.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }
        }
        lines.push(Line::default());
    }

    if app.chat_loading {
        lines.push(Line::from(Span::styled(
            "Advisor:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", working_dots(app)),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    if let Some(error) = &app.chat_error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }

    let inner_height = chat_area.height.saturating_sub(2);
    let content = wrapped_height(&lines, chat_area.width.saturating_sub(2));
    let scroll = clamp_scroll(&mut app.chat_scroll, app.chat_follow, content, inner_height);

    let chat = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(format!(" {}: {} ", app.provider.display_name(), app.model)),
        )
        .wrap(Wrap { trim: true })
        .scroll((scroll, 0));
    frame.render_widget(chat, chat_area);

    render_input(app, frame, input_area, "Ask (i)", "", EditTarget::ChatInput);
}
