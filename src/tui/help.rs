use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame, log_path: &str) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("↑/↓", Style::default().fg(Color::Magenta)),
            Span::raw(" or "),
            Span::styled("j/k", Style::default().fg(Color::Magenta)),
            Span::raw("  Navigate"),
        ]),
        key_line("enter", 7, "Open category / launch script"),
        key_line("esc", 9, "Back to categories"),
        key_line("tab", 9, "Switch tabs"),
        key_line("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Launches run in the background; the status bar shows the latest update."),
        Line::from("Several scripts may run at once. A launch that outlives its timeout is stopped."),
        Line::from(""),
        Line::from("Configuration:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("SCRIPTS_LIST", Style::default().fg(Color::Cyan)),
            Span::raw(" or "),
            Span::styled("--registry-file", Style::default().fg(Color::Cyan)),
            Span::raw("  JSON: {\"category\": [{\"name\": \"...\", \"module\": \"...\"}]}"),
        ]),
        Line::from(""),
        Line::from("Log file:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(log_path.to_string(), Style::default().fg(Color::Cyan)),
        ]),
    ])
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
