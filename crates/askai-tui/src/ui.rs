use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use askai_core::{ChatMessage, ChatRole};
use crate::app::{App, FocusPane, InputMode, Theme};
use crate::markdown::{render_markdown, MarkdownStyles};

/// Most lines the input box grows to before it scrolls
const MAX_INPUT_LINES: u16 = 5;

/// Colours for one theme
struct Palette {
    bg: Color,
    fg: Color,
    muted: Color,
    border: Color,
    border_focused: Color,
    user: Color,
    assistant: Color,
    highlight_bg: Color,
    highlight_fg: Color,
    code: Color,
    bar_bg: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Dark => Palette {
            bg: Color::Black,
            fg: Color::White,
            muted: Color::DarkGray,
            border: Color::DarkGray,
            border_focused: Color::Cyan,
            user: Color::Cyan,
            assistant: Color::Yellow,
            highlight_bg: Color::Blue,
            highlight_fg: Color::White,
            code: Color::Green,
            bar_bg: Color::DarkGray,
        },
        Theme::Light => Palette {
            bg: Color::White,
            fg: Color::Black,
            muted: Color::Gray,
            border: Color::Gray,
            border_focused: Color::Blue,
            user: Color::Blue,
            assistant: Color::Magenta,
            highlight_bg: Color::LightBlue,
            highlight_fg: Color::Black,
            code: Color::Red,
            bar_bg: Color::Gray,
        },
    }
}

impl Palette {
    fn markdown(&self) -> MarkdownStyles {
        MarkdownStyles {
            text: Style::default().fg(self.fg),
            heading: Style::default().fg(self.assistant),
            code: Style::default().fg(self.code),
            bullet: Style::default().fg(self.assistant),
            rule: Style::default().fg(self.muted),
        }
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let colors = palette(app.theme);

    frame.render_widget(Block::default().style(Style::default().bg(colors.bg).fg(colors.fg)), area);

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, &colors, frame, header_area);

    if app.show_sidebar {
        let [sidebar_area, main_area] = Layout::horizontal([
            Constraint::Length(32),
            Constraint::Min(0),
        ])
        .areas(body_area);
        render_sidebar(app, &colors, frame, sidebar_area);
        render_conversation(app, &colors, frame, main_area);
    } else {
        app.sidebar_area = None;
        render_conversation(app, &colors, frame, body_area);
    }

    render_footer(app, &colors, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, &colors, frame, area);
    } else if app.show_rename_input {
        render_rename_input(app, &colors, frame, area);
    }
}

fn render_header(app: &App, colors: &Palette, frame: &mut Frame, area: Rect) {
    let key_status = if app.exchange.service().has_api_key() {
        Span::styled("", Style::default())
    } else {
        Span::styled("  no API key (K to set) ", Style::default().fg(Color::Red).bold())
    };

    let title = Line::from(vec![
        Span::styled(" AskAi ", Style::default().fg(colors.user).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(colors.fg),
        ),
        Span::raw("  "),
        Span::styled(app.exchange.service().model().to_string(), Style::default().fg(colors.fg)),
        Span::styled(format!("  [{}]", app.theme.as_str()), Style::default().fg(colors.fg)),
        key_status,
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(colors.bar_bg));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, colors: &Palette, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = if let Some(message) = &app.status_message {
        vec![Span::styled(format!(" {} ", message), Style::default().bg(Color::Black).fg(Color::Red))]
    } else if app.show_rename_input || app.show_api_key_input {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" save ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else {
        match (app.input_mode, app.focus) {
            (InputMode::Editing, _) => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Alt+Enter ", key_style),
                Span::styled(" newline ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" stop typing ", label_style),
            ],
            (InputMode::Normal, FocusPane::Sidebar) => vec![
                Span::styled(" j/k ", key_style),
                Span::styled(" nav ", label_style),
                Span::styled(" Enter ", key_style),
                Span::styled(" open ", label_style),
                Span::styled(" r ", key_style),
                Span::styled(" rename ", label_style),
                Span::styled(" d ", key_style),
                Span::styled(" delete ", label_style),
                Span::styled(" n ", key_style),
                Span::styled(" new ", label_style),
                Span::styled(" Tab ", key_style),
                Span::styled(" focus ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
            (InputMode::Normal, _) => vec![
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" i ", key_style),
                Span::styled(" type ", label_style),
                Span::styled(" n ", key_style),
                Span::styled(" new ", label_style),
                Span::styled(" b ", key_style),
                Span::styled(" sidebar ", label_style),
                Span::styled(" t ", key_style),
                Span::styled(" theme ", label_style),
                Span::styled(" K ", key_style),
                Span::styled(" API key ", label_style),
                Span::styled(" Tab ", key_style),
                Span::styled(" focus ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(colors.bar_bg));
    frame.render_widget(footer, area);
}

fn render_sidebar(app: &mut App, colors: &Palette, frame: &mut Frame, area: Rect) {
    app.sidebar_area = Some(area);

    let focused = app.focus == FocusPane::Sidebar;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { colors.border_focused } else { colors.border }))
        .title(format!(" Chats ({}) ", app.store.conversations().len()));

    if app.store.conversations().is_empty() {
        let empty = Paragraph::new("No chats yet.\nPress n to start one.")
            .style(Style::default().fg(colors.muted))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let inner_width = area.width.saturating_sub(4) as usize;
    let active = app.store.active_id().cloned();
    let items: Vec<ListItem> = app
        .store
        .conversations()
        .iter()
        .map(|conversation| {
            let is_active = active.as_ref() == Some(&conversation.id);
            let title_style = if is_active {
                Style::default().fg(colors.user).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.fg).add_modifier(Modifier::BOLD)
            };
            let preview = single_line(conversation.preview());
            ListItem::new(vec![
                Line::from(Span::styled(truncate(&conversation.title, inner_width), title_style)),
                Line::from(Span::styled(truncate(&preview, inner_width), Style::default().fg(colors.muted))),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(colors.highlight_bg)
                .fg(colors.highlight_fg),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.sidebar_state);
}

fn render_conversation(app: &mut App, colors: &Palette, frame: &mut Frame, area: Rect) {
    let input_lines = (app.input.split('\n').count() as u16).clamp(1, MAX_INPUT_LINES);
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(input_lines + 2),
    ])
    .areas(area);

    render_chat(app, colors, frame, chat_area);
    render_input(app, colors, frame, input_area);
}

/// Lines for one message; the role picks how its content is rendered
fn message_lines(message: &ChatMessage, colors: &Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match message.role {
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(colors.user).add_modifier(Modifier::BOLD),
            )));
            for line in message.content.lines() {
                lines.push(Line::from(Span::styled(line.to_string(), Style::default().fg(colors.fg))));
            }
        }
        ChatRole::Assistant => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(colors.assistant).add_modifier(Modifier::BOLD),
            )));
            lines.extend(render_markdown(&message.content, &colors.markdown()));
        }
    }
    lines.push(Line::default());
    lines
}

/// Shown in place of an empty conversation
fn welcome_lines(colors: &Palette) -> Vec<Line<'static>> {
    let muted = Style::default().fg(colors.muted);
    vec![
        Line::from(Span::styled(
            "Welcome to AskAi",
            Style::default().fg(colors.fg).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled("How can I help you with your code today?", muted)),
        Line::default(),
        Line::from(Span::styled("💡 Example", Style::default().fg(colors.assistant))),
        Line::from(Span::styled("   Paste your JavaScript code to get a detailed explanation", muted)),
        Line::default(),
        Line::from(Span::styled("🔧 Debug", Style::default().fg(colors.assistant))),
        Line::from(Span::styled("   Share problematic code for debugging assistance", muted)),
    ]
}

fn render_chat(app: &mut App, colors: &Palette, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let focused = app.focus == FocusPane::Chat;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { colors.border_focused } else { colors.border }))
        .title(format!(" {} ", app.active_title()));

    let sending = app.is_sending();
    let messages = app.active_messages();
    let chat_text = if messages.is_empty() && !sending {
        Text::from(welcome_lines(colors))
    } else {
        let mut lines: Vec<Line> = messages
            .iter()
            .flat_map(|message| message_lines(message, colors))
            .collect();

        if sending {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(colors.assistant).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(colors.muted).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let max_scroll = wrapped_height(&chat_text, app.chat_width).saturating_sub(app.chat_height);
    if app.follow_tail || app.chat_scroll > max_scroll {
        app.chat_scroll = max_scroll;
    }

    let chat = Paragraph::new(chat_text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, colors: &Palette, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let input_border_color = if editing || app.focus == FocusPane::Input {
        Color::Yellow
    } else {
        colors.border
    };

    let title = if app.is_sending() { " Waiting for reply... " } else { " Message AskAi " };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(title)
        .title_bottom(Line::from(" AskAi can make mistakes. Consider checking important information. ").fg(colors.muted));

    // Cursor row and column, in chars
    let before_cursor: String = app.input.chars().take(app.input_cursor).collect();
    let cursor_row = before_cursor.matches('\n').count();
    let cursor_col = before_cursor.rsplit('\n').next().unwrap_or("").chars().count();

    // Scroll offsets that keep the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let col_offset = if inner_width > 0 && cursor_col >= inner_width {
        cursor_col - inner_width + 1
    } else {
        0
    };
    let row_offset = if inner_height > 0 && cursor_row >= inner_height {
        cursor_row - inner_height + 1
    } else {
        0
    };

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(colors.user))
        .block(input_block)
        .scroll((row_offset as u16, col_offset as u16));

    frame.render_widget(input, area);

    // Show cursor when editing and no popup has focus
    if editing && !app.show_rename_input && !app.show_api_key_input {
        frame.set_cursor_position((
            area.x + (cursor_col - col_offset) as u16 + 1,
            area.y + (cursor_row - row_offset) as u16 + 1,
        ));
    }
}

fn render_rename_input(app: &App, colors: &Palette, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 60, 5);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(colors.bg))
        .title(" Rename Chat ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Enter to save, Esc to cancel.")
        .style(Style::default().fg(colors.muted));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let width = input_area.width as usize;
    let offset = if width > 0 && app.rename_cursor >= width {
        app.rename_cursor - width + 1
    } else {
        0
    };
    let visible: String = app.rename_input.chars().skip(offset).take(width).collect();
    frame.render_widget(Paragraph::new(visible).style(Style::default().fg(colors.user)), input_area);

    frame.set_cursor_position((input_area.x + (app.rename_cursor - offset) as u16, input_area.y));
}

fn render_api_key_input(app: &App, colors: &Palette, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 60, 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(colors.bg))
        .title(" Enter Gemini API Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    // Instructions
    let instructions = Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
        .style(Style::default().fg(colors.muted));

    let instructions_area = Rect::new(inner.x, inner.y, inner.width, 1);
    frame.render_widget(instructions, instructions_area);

    // Input field
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);

    let input = Paragraph::new(mask_key(&app.api_key_input))
        .style(Style::default().fg(colors.user));

    frame.render_widget(input, input_area);

    // Show cursor
    let cursor_x = app.api_key_input_cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    // Status line
    let source = match app.config.key_source() {
        Some("env") => "current key from GEMINI_API_KEY",
        Some(_) => "current key from config file",
        None => "no key configured",
    };
    let status = Paragraph::new(format!("{} characters, {}", app.api_key_input.chars().count(), source))
        .style(Style::default().fg(colors.muted));

    let status_area = Rect::new(inner.x, inner.y + 4, inner.width, 1);
    frame.render_widget(status, status_area);
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height);

    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;

    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

/// Mask the key with asterisks, showing only the last 4 chars
fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len == 0 {
        String::new()
    } else if len <= 4 {
        "*".repeat(len)
    } else {
        let masked_len = len - 4;
        let last_four: String = key.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    }
}

/// Rows `text` takes up when wrapped to `width` columns
fn wrapped_height(text: &Text, width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = text
        .lines
        .iter()
        .map(|line| {
            // Use character count, not byte length, for proper UTF-8 handling
            let char_count: usize = line.spans.iter().map(|s| s.content.chars().count()).sum();
            char_count.max(1).div_ceil(width)
        })
        .sum();
    rows.min(u16::MAX as usize) as u16
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("abc"), "***");
        assert_eq!(mask_key("abcdefgh"), "****...efgh");
    }

    #[test]
    fn test_wrapped_height_counts_wrapped_rows() {
        let text = Text::from(vec![Line::from("a".repeat(25)), Line::default(), Line::from("short")]);
        assert_eq!(wrapped_height(&text, 10), 3 + 1 + 1);
    }

    #[test]
    fn test_truncate_and_single_line() {
        assert_eq!(truncate("hello world", 5), "hell…");
        assert_eq!(truncate("hi", 5), "hi");
        assert_eq!(single_line("one\n two\tthree"), "one two three");
    }

    #[test]
    fn test_roles_render_differently() {
        let colors = palette(Theme::Dark);
        let user = message_lines(&ChatMessage::user("**raw**"), &colors);
        let assistant = message_lines(&ChatMessage::assistant("**raw**"), &colors);

        let text = |line: &Line| line.spans.iter().map(|s| s.content.to_string()).collect::<String>();
        assert_eq!(text(&user[1]), "**raw**");
        assert_eq!(text(&assistant[1]), "raw");
    }

    #[test]
    fn test_render_draws_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let store = askai_core::ConversationStore::open(askai_core::JsonFileRepository::new(
            dir.path().join("conversations.json"),
        ));
        let mut app = App::from_parts(askai_core::Config::new(), store);
        app.store
            .append_messages(None, vec![ChatMessage::user("what is rust"), ChatMessage::assistant("A language")])
            .unwrap();

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(content.contains("what is rust"));
        assert!(content.contains("A language"));
        assert!(content.contains("Chats (1)"));
        assert!(app.chat_area.is_some());
        assert!(app.sidebar_area.is_some());
    }

    #[test]
    fn test_empty_chat_shows_welcome() {
        let dir = tempfile::tempdir().unwrap();
        let store = askai_core::ConversationStore::open(askai_core::JsonFileRepository::new(
            dir.path().join("conversations.json"),
        ));
        let mut app = App::from_parts(askai_core::Config::new(), store);

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(content.contains("Welcome to AskAi"));
        assert!(content.contains("How can I help you with your code today?"));
        assert!(content.contains("Paste your JavaScript code"));
        assert!(content.contains("Share problematic code"));
    }
}
