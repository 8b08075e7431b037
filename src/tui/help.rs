use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line<'a>(key: &'a str, pad: usize, action: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(action),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit (a running execution keeps running)"),
        ]),
        key_line("s", 11, "Start execution (visible browser)"),
        key_line("h", 11, "Start execution (headless)"),
        key_line("x", 11, "Stop current execution"),
        key_line("r", 11, "Refresh keywords, history and stats"),
        key_line("tab", 9, "Switch tabs"),
        key_line("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Execution tab (keywords):"),
        key_line("↑/↓ or j/k", 2, "Navigate"),
        key_line("a", 11, "Add comma-separated keywords (Enter submits, Esc cancels)"),
        key_line("t / space", 3, "Toggle selected keyword"),
        key_line("d", 11, "Delete selected keyword"),
        Line::from(""),
        Line::from("History tab:"),
        key_line("↑/↓ or j/k", 2, "Navigate"),
        Line::from(""),
        Line::from("Calendar legend:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("■", Style::default().fg(Color::DarkGray)),
            Span::raw(" none  "),
            Span::styled("■", Style::default().fg(Color::LightGreen)),
            Span::raw(" 1-2  "),
            Span::styled("■", Style::default().fg(Color::Green)),
            Span::raw(" 3-4  "),
            Span::styled("■", Style::default().fg(Color::Yellow)),
            Span::raw(" 5+"),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
