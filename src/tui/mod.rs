mod help;
mod state;

use crate::cli::{build_config, Cli};
use crate::engine::LaunchEngine;
use crate::registry::{category_label, ConfigError, Registry};
use crate::status::{self, StatusSlot};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{output_tail, phase_color, Screen, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::runtime::Handle;

pub async fn run(args: Cli, registry: Registry, config_err: Option<ConfigError>) -> Result<()> {
    let cfg = Arc::new(build_config(&args)?);
    let (sink, slot) = status::channel();
    // Workers run on the Tokio runtime; the UI thread only hands them requests.
    let engine = LaunchEngine::new(cfg, sink, Handle::current());
    let log_path = args
        .log_file
        .clone()
        .unwrap_or_else(crate::logging::default_log_path)
        .display()
        .to_string();

    let mut state = UiState::new(registry, config_err.map(|e| e.to_string()));
    state.info = format!("Logging to {log_path}");

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(state, engine, slot, log_path));

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    match join_res {
        Ok(Ok(res)) => res,
        Ok(Err(_)) => Err(anyhow::anyhow!("TUI thread panicked")),
        Err(e) => Err(anyhow::anyhow!("TUI join failed: {e}")),
    }
}

/// Run the TUI loop on a dedicated thread. This thread is the only one that
/// touches `UiState`.
fn run_threaded(
    mut state: UiState,
    engine: LaunchEngine,
    mut slot: StatusSlot,
    log_path: String,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        // Status updates from workers are applied here, never from the workers.
        for update in slot.drain() {
            state.apply_update(update);
            dirty = true;
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state, &log_path)).ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                dirty = true;
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        if state.in_flight > 0 {
                            tracing::info!(
                                in_flight = state.in_flight,
                                "quitting with launches still running"
                            );
                        }
                        break Ok(());
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % 2;
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = 1;
                    }
                    _ if state.tab != 0 => {
                        if k.code == KeyCode::Esc {
                            state.tab = 0;
                        }
                    }
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => state.select_prev(),
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => state.select_next(),
                    (_, KeyCode::Enter) | (_, KeyCode::Right) | (_, KeyCode::Char('l')) => {
                        if let Some(item) = state.activate() {
                            // Non-blocking: Launching arrives on the next drain.
                            engine.launch(&item);
                        }
                    }
                    (_, KeyCode::Esc)
                    | (_, KeyCode::Backspace)
                    | (_, KeyCode::Left)
                    | (_, KeyCode::Char('h')) => state.back(),
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState, log_path: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3), // Tabs
                Constraint::Min(0),    // Menu or help
                Constraint::Length(3), // Status bar
            ]
            .as_ref(),
        )
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Launcher"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("script-launcher"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_menu(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f, log_path),
    }

    draw_status(chunks[2], f, state);
}

fn draw_menu(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    // Output pane only once something has finished.
    let output_height = if state.last_output.is_some() { 10 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(output_height)].as_ref())
        .split(area);

    match &state.screen {
        Screen::Categories => draw_categories(rows[0], f, state),
        Screen::Items { key } => draw_items(rows[0], f, state, key),
    }

    if output_height > 0 {
        draw_output(rows[1], f, state);
    }
}

fn highlight() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Gray)
        .add_modifier(Modifier::BOLD)
}

fn draw_categories(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let keys = state.category_keys();
    let block = Block::default().borders(Borders::ALL).title(state.title());

    if keys.is_empty() {
        let mut lines = vec![Line::from(Span::styled(
            "No categories configured.",
            Style::default().fg(Color::Red),
        ))];
        if let Some(err) = &state.config_error {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("Configuration error: {err}"),
                Style::default().fg(Color::Red),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(
            "Set SCRIPTS_LIST (environment or .env) or pass --registry-file (press ? for the format).",
        ));
        let p = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
        f.render_widget(p, area);
        return;
    }

    let items: Vec<ListItem> = keys
        .iter()
        .map(|key| {
            let count = state.registry.categories(key).len();
            ListItem::new(Line::from(vec![
                Span::raw(category_label(key)),
                Span::styled(format!("  ({count})"), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(highlight())
        .highlight_symbol("> ");
    let mut list_state = ListState::default().with_selected(Some(state.category_selected));
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_items(area: Rect, f: &mut ratatui::Frame, state: &UiState, key: &str) {
    let title = Line::from(vec![
        Span::styled("← ", Style::default().fg(Color::DarkGray)),
        Span::raw(state.title()),
    ]);
    let block = Block::default().borders(Borders::ALL).title(title);
    let scripts = state.current_items();

    if scripts.is_empty() {
        let p = Paragraph::new(vec![
            Line::from(Span::styled(
                format!("No scripts found for {}", category_label(key)),
                Style::default().fg(Color::Red),
            )),
            Line::from("Please configure SCRIPTS_LIST."),
        ])
        .block(block);
        f.render_widget(p, area);
        return;
    }

    let items: Vec<ListItem> = scripts
        .iter()
        .map(|item| {
            ListItem::new(Line::from(vec![
                Span::raw(item.display_name.clone()),
                Span::styled(
                    format!("  {}", item.target.describe()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(highlight())
        .highlight_symbol("> ");
    let mut list_state = ListState::default().with_selected(Some(state.item_selected));
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_output(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let Some(last) = &state.last_output else {
        return;
    };
    let max = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = output_tail(&last.output, max)
        .into_iter()
        .map(|(is_err, text)| {
            if is_err {
                Line::from(Span::styled(text, Style::default().fg(Color::Red)))
            } else {
                Line::from(text)
            }
        })
        .collect();
    let code = last
        .output
        .code
        .map(|c| format!("exit {c}"))
        .unwrap_or_else(|| "no exit code".into());
    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Output: {} ({code})", last.label)),
    );
    f.render_widget(p, area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let color = phase_color(state.status.as_ref().map(|u| u.phase()));
    let mut spans = vec![Span::styled(state.status_text(), Style::default().fg(color))];
    if state.in_flight > 0 {
        spans.push(Span::styled(
            format!("  [{} running]", state.in_flight),
            Style::default().fg(Color::Yellow),
        ));
    }
    if !state.info.is_empty() && state.status.is_none() {
        spans.push(Span::styled(
            format!("  {}", state.info),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let p = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}
