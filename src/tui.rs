use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::history::{self, StatusClass};
use crate::models::ApplicationRecord;
use crate::store::{self, StoragePort};

struct AppState {
    records: Vec<ApplicationRecord>,
    selected: usize,
    scroll_offset: u16,
}

impl AppState {
    fn new(records: Vec<ApplicationRecord>) -> Self {
        Self {
            records,
            selected: 0,
            scroll_offset: 0,
        }
    }

    fn current(&self) -> Option<&ApplicationRecord> {
        self.records.get(self.selected)
    }

    fn next(&mut self) {
        if !self.records.is_empty() && self.selected < self.records.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn remove_current(&mut self) {
        if self.selected < self.records.len() {
            self.records.remove(self.selected);
            if self.selected >= self.records.len() && self.selected > 0 {
                self.selected -= 1;
            }
            self.scroll_offset = 0;
        }
    }
}

// Counts chars, not bytes: titles come from the backend and can be non-ASCII.
fn list_title(title: &str) -> String {
    if title.chars().count() > 30 {
        let head: String = title.chars().take(27).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

fn status_color(status: &str) -> Color {
    match history::classify(status) {
        StatusClass::Positive => Color::Green,
        StatusClass::Negative => Color::Red,
        StatusClass::Warning => Color::Yellow,
        StatusClass::Neutral => Color::DarkGray,
    }
}

fn status_icon(status: &str) -> &'static str {
    match history::classify(status) {
        StatusClass::Positive => "+",
        StatusClass::Negative => "x",
        StatusClass::Warning => "*",
        StatusClass::Neutral => "?",
    }
}

pub fn run_browse(store: &dyn StoragePort, search: &str, status: &str) -> Result<()> {
    let mut records = store::load_history(store)?;
    history::sort_newest_first(&mut records);
    let records: Vec<ApplicationRecord> = history::filter(&records, search, status)
        .into_iter()
        .cloned()
        .collect();

    if records.is_empty() {
        println!("No applications found.");
        return Ok(());
    }

    let mut state = AppState::new(records);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, store);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    store: &dyn StoragePort,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('d') => {
                    if let Some(record) = state.current() {
                        store::delete_history_entry(store, record.id)?;
                        state.remove_current();
                        if state.records.is_empty() {
                            break;
                        }
                    }
                }
                _ => {}
            }
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(frame.area());

    // Left panel: application list
    let items: Vec<ListItem> = state
        .records
        .iter()
        .map(|record| {
            let title = list_title(&record.job_title);
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{} ", status_icon(&record.status)),
                    Style::default().fg(status_color(&record.status)),
                ),
                Span::raw(format!("#{:<4} {} | {}", record.id, title, record.company_name)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Applications ({}) ",
            state.records.len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: application detail
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer help
    let help_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let help = Paragraph::new(" j/k:navigate  J/K:scroll  d:delete  q:quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area[1]);
}

fn build_detail<'a>(state: &'a AppState) -> Text<'a> {
    let Some(record) = state.current() else {
        return Text::raw("No application selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        &record.job_title,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", record.company_name)));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", record.status),
        Style::default().fg(status_color(&record.status)),
    )));
    lines.push(Line::from(format!("URL: {}", record.job_url)));
    lines.push(Line::from(format!("Applied: {}", record.applied_at)));
    lines.push(Line::from(""));

    if let Some(message) = &record.error_message {
        lines.push(Line::from(Span::styled(
            "Error",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        for line in textwrap::fill(message, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
        lines.push(Line::from(""));
    }

    if !record.missing_fields.is_empty() {
        lines.push(Line::from(Span::styled(
            "Missing Fields",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(format!("  {}", record.missing_fields.join(", "))));
        lines.push(Line::from(""));
    }

    if !record.questions_and_answers.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Questions Answered ({})", record.questions_answered),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
        for qa in &record.questions_and_answers {
            lines.push(Line::from(Span::styled(
                format!("  {}", qa.question),
                Style::default().fg(Color::Cyan),
            )));
            for line in textwrap::fill(&qa.answer, 66).lines() {
                lines.push(Line::from(format!("    {}", line)));
            }
        }
    } else {
        lines.push(Line::from(Span::styled(
            "(No questions were answered for this application)",
            Style::default().fg(Color::DarkGray),
        )));
    }

    Text::from(lines)
}
