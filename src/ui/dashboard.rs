use crate::error::CoinWatchError;
use crate::market::alerts::Alert;
use crate::market::refresh::{DisplaySink, MarketSnapshot, SharedSelection, Trigger};
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use num_format::{Locale, ToFormattedString};
use parking_lot::Mutex;
use ratatui::layout::Alignment;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const PAGE_JUMP: usize = 20;

/// Alerts kept in the history view; the oldest is dropped first.
const MAX_ALERT_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardView {
    Market,
    Alerts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    EditingTarget,
}

#[derive(Debug, Clone)]
pub struct AlertEntry {
    pub alert: Alert,
    pub raised_at: DateTime<Local>,
}

#[derive(Clone)]
pub struct Dashboard {
    pub snapshot: Arc<Mutex<Option<Arc<MarketSnapshot>>>>,
    pub selection: SharedSelection,
    pub selected: Arc<Mutex<usize>>,
    pub alerts: Arc<Mutex<VecDeque<AlertEntry>>>,
    pub popup: Arc<Mutex<Option<Alert>>>,
    pub current_view: Arc<Mutex<DashboardView>>,
    pub running: Arc<Mutex<bool>>,
    input_mode: Arc<Mutex<InputMode>>,
    triggers: mpsc::Sender<Trigger>,
}

impl DisplaySink for Dashboard {
    fn publish(&self, snapshot: Arc<MarketSnapshot>) {
        let rows = snapshot.table.len();
        *self.snapshot.lock() = Some(snapshot);
        let mut selected = self.selected.lock();
        *selected = (*selected).min(rows.saturating_sub(1));
    }

    fn alert(&self, alert: &Alert) {
        let mut alerts = self.alerts.lock();
        alerts.push_back(AlertEntry {
            alert: alert.clone(),
            raised_at: Local::now(),
        });
        if alerts.len() > MAX_ALERT_HISTORY {
            alerts.pop_front();
        }
        drop(alerts);
        *self.popup.lock() = Some(alert.clone());
    }
}

/// Rows of a `len`-row table that fit in `height` lines with `selected` visible.
fn visible_window(selected: usize, len: usize, height: usize) -> Range<usize> {
    if height == 0 || len == 0 {
        return 0..0;
    }
    let start = selected.min(len - 1).saturating_sub(height - 1);
    start..(start + height).min(len)
}

impl Dashboard {
    pub fn new(selection: SharedSelection, triggers: mpsc::Sender<Trigger>) -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(None)),
            selection,
            selected: Arc::new(Mutex::new(0)),
            alerts: Arc::new(Mutex::new(VecDeque::new())),
            popup: Arc::new(Mutex::new(None)),
            current_view: Arc::new(Mutex::new(DashboardView::Market)),
            running: Arc::new(Mutex::new(true)),
            input_mode: Arc::new(Mutex::new(InputMode::Normal)),
            triggers,
        }
    }

    /// Draws until the user quits. Blocks the calling thread.
    pub fn run(&self) -> Result<(), CoinWatchError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    fn event_loop(&self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<(), CoinWatchError> {
        while *self.running.lock() {
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_input(key);
                    }
                }
            }

            terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Length(3),
                        Constraint::Min(5),
                        Constraint::Length(3),
                        Constraint::Length(3),
                    ])
                    .split(f.size());

                self.render_header(f, chunks[0]);
                self.render_summary(f, chunks[1]);
                self.render_main_content(f, chunks[2]);
                self.render_watch_bar(f, chunks[3]);
                self.render_footer(f, chunks[4]);
                self.render_popup(f, f.size());
            })?;
        }
        Ok(())
    }

    fn request(&self, trigger: Trigger) {
        if let Err(e) = self.triggers.try_send(trigger) {
            debug!("Dropped {:?} request: {}", trigger, e);
        }
    }

    fn handle_key_input(&self, key: KeyEvent) {
        if self.popup.lock().take().is_some() {
            return;
        }

        if *self.input_mode.lock() == InputMode::EditingTarget {
            let mut selection = self.selection.lock();
            match key.code {
                KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => selection.target_text.push(c),
                KeyCode::Backspace => {
                    selection.target_text.pop();
                }
                KeyCode::Enter | KeyCode::Esc => *self.input_mode.lock() = InputMode::Normal,
                _ => (),
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => *self.running.lock() = false,
            KeyCode::Char('v') => *self.current_view.lock() = DashboardView::Market,
            KeyCode::Char('a') => *self.current_view.lock() = DashboardView::Alerts,
            KeyCode::Char('r') => self.request(Trigger::Manual),
            KeyCode::Char('c') => {
                {
                    let mut selection = self.selection.lock();
                    selection.currency = selection.currency.next();
                }
                self.request(Trigger::CurrencyChanged);
            }
            KeyCode::Char('w') => {
                let mut selection = self.selection.lock();
                selection.watch_enabled = !selection.watch_enabled;
            }
            KeyCode::Char('d') => {
                let mut selection = self.selection.lock();
                selection.direction = selection.direction.toggle();
            }
            KeyCode::Char('t') => *self.input_mode.lock() = InputMode::EditingTarget,
            KeyCode::Enter => {
                let snapshot = self.snapshot.lock().clone();
                let selected = *self.selected.lock();
                if let Some(record) = snapshot.as_ref().and_then(|s| s.table.rows().get(selected)) {
                    self.selection.lock().watch_currency = record.name.clone();
                }
            }
            KeyCode::Up => {
                let mut selected = self.selected.lock();
                *selected = selected.saturating_sub(1);
            }
            KeyCode::Down => self.move_selection(1),
            KeyCode::PageUp => {
                let mut selected = self.selected.lock();
                *selected = selected.saturating_sub(PAGE_JUMP);
            }
            KeyCode::PageDown => self.move_selection(PAGE_JUMP),
            _ => (),
        }
    }

    fn move_selection(&self, by: usize) {
        let rows = self
            .snapshot
            .lock()
            .as_ref()
            .map_or(0, |s| s.table.len());
        let mut selected = self.selected.lock();
        *selected = selected.saturating_add(by).min(rows.saturating_sub(1));
    }

    fn render_header(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let snapshot = self.snapshot.lock().clone();
        let currency = self.selection.lock().currency;

        let status = match &snapshot {
            Some(s) if s.currency == currency => {
                Span::styled("LIVE", Style::default().fg(Color::Green))
            }
            Some(_) => Span::styled("SWITCHING", Style::default().fg(Color::Yellow)),
            None => Span::styled("WAITING FOR DATA", Style::default().fg(Color::Red)),
        };

        let details = match &snapshot {
            Some(s) => format!(
                "Last update: {} | Currency: {} | Rows: {}",
                s.fetched_at.format("%H:%M:%S"),
                s.currency,
                s.table.len().to_formatted_string(&Locale::en)
            ),
            None => format!("Currency: {}", currency),
        };

        let header = Paragraph::new(Text::from(vec![
            Line::from(vec![
                Span::styled(
                    "COINWATCH ",
                    Style::default()
                        .fg(Color::LightCyan)
                        .add_modifier(Modifier::BOLD),
                ),
                status,
            ]),
            Line::from(Span::styled(details, Style::default().fg(Color::Gray))),
        ]))
        .block(Block::default().borders(Borders::BOTTOM));

        f.render_widget(header, area);
    }

    fn render_summary(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let snapshot = self.snapshot.lock().clone();
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(25),
                Constraint::Percentage(25),
                Constraint::Percentage(25),
                Constraint::Percentage(25),
            ])
            .split(area);

        let lines: [String; 4] = match &snapshot {
            Some(s) => s.summary.as_array().map(str::to_string),
            None => Default::default(),
        };

        for (text, column) in lines.into_iter().zip(columns.iter()) {
            let cell = Paragraph::new(text)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(cell, *column);
        }
    }

    fn render_market_view(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let snapshot = self.snapshot.lock().clone();
        let selected = *self.selected.lock();
        let watched = self.selection.lock().watch_currency.clone();

        let block = Block::default().borders(Borders::ALL).title("Market");
        let inner_area = block.inner(area);
        f.render_widget(block, area);

        let Some(snapshot) = snapshot else {
            let waiting = Paragraph::new("Waiting for the first refresh...")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Gray));
            f.render_widget(waiting, inner_area);
            return;
        };

        if inner_area.height < 3 || inner_area.width < 30 {
            return;
        }

        let rows_data = snapshot.table.rows();
        let window = visible_window(
            selected,
            rows_data.len(),
            inner_area.height.saturating_sub(1) as usize,
        );

        let rows = rows_data[window.clone()]
            .iter()
            .zip(window)
            .map(|(record, i)| {
                let change_color = if record.change_24h.trim_start().starts_with('-') {
                    Color::Red
                } else {
                    Color::Green
                };
                let cells = record.cells();

                let style = if i == selected {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else if record.name == watched {
                    Style::default().fg(Color::Magenta)
                } else {
                    Style::default()
                };

                Row::new(vec![
                    Cell::from(cells[0].to_string()),
                    Cell::from(cells[1].to_string()),
                    Cell::from(cells[2].to_string()),
                    Cell::from(cells[3].to_string()),
                    Cell::from(Span::styled(
                        cells[4].to_string(),
                        Style::default().fg(change_color),
                    )),
                    Cell::from(cells[5].to_string()),
                ])
                .style(style)
            });

        let table = Table::new(rows)
            .header(
                Row::new(snapshot.headers.to_vec())
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .widths(&[
                Constraint::Percentage(20),
                Constraint::Percentage(14),
                Constraint::Percentage(18),
                Constraint::Percentage(16),
                Constraint::Percentage(14),
                Constraint::Percentage(18),
            ]);

        f.render_widget(table, inner_area);
    }

    fn render_alerts_view(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let alerts = self.alerts.lock();

        let block = Block::default().borders(Borders::ALL).title("Alerts");
        let inner_area = block.inner(area);
        f.render_widget(block, area);

        if inner_area.height < 3 || inner_area.width < 30 {
            return;
        }

        let rows = alerts.iter().rev().map(|entry| {
            Row::new(vec![
                Cell::from(entry.raised_at.format("%H:%M:%S").to_string()),
                Cell::from(entry.alert.currency_name.clone()),
                Cell::from(entry.alert.price.clone()),
                Cell::from(format!(
                    "{} {}",
                    entry.alert.direction.symbol(),
                    entry.alert.target_value
                )),
                Cell::from(Span::styled(
                    "TRIGGERED",
                    Style::default().fg(Color::Green),
                )),
            ])
        });

        let table = Table::new(rows)
            .header(
                Row::new(vec!["Time", "Currency", "Price", "Condition", "Status"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .widths(&[
                Constraint::Length(10),
                Constraint::Length(20),
                Constraint::Length(16),
                Constraint::Length(14),
                Constraint::Length(12),
            ]);

        f.render_widget(table, inner_area);
    }

    fn render_main_content(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        match *self.current_view.lock() {
            DashboardView::Market => self.render_market_view(f, area),
            DashboardView::Alerts => self.render_alerts_view(f, area),
        }
    }

    fn render_watch_bar(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let selection = self.selection.lock().clone();
        let editing = *self.input_mode.lock() == InputMode::EditingTarget;

        let state = if selection.watch_enabled {
            Span::styled("ON ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        } else {
            Span::styled("OFF", Style::default().fg(Color::Red))
        };
        let name = if selection.watch_currency.is_empty() {
            "<none>".to_string()
        } else {
            selection.watch_currency.clone()
        };
        let target_style = if editing {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else if selection.watch_config().enabled || !selection.watch_enabled {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Red)
        };

        let watch = Paragraph::new(Line::from(vec![
            Span::raw("Watch: "),
            state,
            Span::raw(format!("  {} {} ", name, selection.direction.symbol())),
            Span::styled(format!("{}{}", selection.target_text, if editing { "_" } else { "" }), target_style),
        ]))
        .block(Block::default().borders(Borders::TOP));

        f.render_widget(watch, area);
    }

    fn render_footer(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let controls = if *self.input_mode.lock() == InputMode::EditingTarget {
            vec![
                Span::raw("Target: "),
                Span::styled("0-9", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Type  "),
                Span::styled("Backspace", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Delete  "),
                Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Done"),
            ]
        } else {
            vec![
                Span::raw("Controls: "),
                Span::styled("↑/↓", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Navigate  "),
                Span::styled("r", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Refresh  "),
                Span::styled("c", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Currency  "),
                Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Watch row  "),
                Span::styled("w", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Watch on/off  "),
                Span::styled("t", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Target  "),
                Span::styled("d", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Direction  "),
                Span::styled("v/a", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Market/Alerts  "),
                Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" Quit"),
            ]
        };

        let footer = Paragraph::new(Line::from(controls))
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::TOP));

        f.render_widget(footer, area);
    }

    fn render_popup(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let popup = self.popup.lock().clone();
        let Some(alert) = popup else {
            return;
        };

        let width = 50.min(area.width);
        let height = 5.min(area.height);
        let rect = Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        );

        let message = Paragraph::new(Text::from(vec![
            Line::from(Span::styled(
                alert.message,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Press any key to dismiss",
                Style::default().fg(Color::Gray),
            )),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Watch"));

        f.render_widget(Clear, rect);
        f.render_widget(message, rect);
    }
}
