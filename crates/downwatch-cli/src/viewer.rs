use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use downwatch_core::{Monitor, MonitorEvent, MonitorInfo};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, Paragraph};
use ratatui::Terminal;

use crate::fmt_ms;

struct Series {
    label: &'static str,
    color: Color,
    points: VecDeque<(f64, f64)>,
}

impl Series {
    fn new(label: &'static str, color: Color) -> Self {
        Self {
            label,
            color,
            points: VecDeque::new(),
        }
    }

    fn push(&mut self, x: f64, y: f64, window_sec: f64) {
        self.points.push_back((x, y));
        while let Some((old_x, _)) = self.points.front() {
            if x - old_x > window_sec {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    fn bounds(&self) -> [f64; 2] {
        let max = self
            .points
            .iter()
            .map(|(_, y)| *y)
            .fold(0.0_f64, f64::max);
        [0.0, (max * 1.15).max(1.0)]
    }
}

struct ViewerState {
    start: Instant,
    info: Option<MonitorInfo>,
    last_event: Option<String>,
    ping: Series,
    availability: Series,
}

impl ViewerState {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            info: None,
            last_event: None,
            ping: Series::new("Ping (ms)", Color::Cyan),
            availability: Series::new("Available (1 = up)", Color::Green),
        }
    }

    fn update(&mut self, event: &MonitorEvent, window_sec: f64) {
        let t = self.start.elapsed().as_secs_f64();
        match event {
            MonitorEvent::Up(up) => {
                if let Some(ping) = up.ping {
                    self.ping.push(t, ping as f64, window_sec);
                }
                self.availability.push(t, 1.0, window_sec);
            }
            MonitorEvent::Outage(_) => self.availability.push(t, 0.0, window_sec),
            _ => {}
        }
        self.last_event = Some(format!("{} at {t:.0}s", event.kind()));
    }
}

pub async fn run_viewer(monitor: &Monitor, window_sec: f64) -> Result<()> {
    let mut events = monitor.subscribe();
    monitor.start()?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = ViewerState::new();

    let run_result = async {
        loop {
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Char('r') => monitor.restart()?,
                        _ => {}
                    }
                }
            }

            while let Some(event) = events.try_recv() {
                state.update(&event, window_sec);
            }
            state.info = Some(monitor.infos());

            terminal.draw(|frame| draw_ui(frame.size(), frame, &state, window_sec))?;
            tokio::task::yield_now().await;
        }

        Ok::<(), anyhow::Error>(())
    }
    .await;

    monitor.stop();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}

fn draw_ui(area: Rect, frame: &mut ratatui::Frame<'_>, state: &ViewerState, window_sec: f64) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Percentage(60),
            Constraint::Min(0),
        ])
        .split(area);

    frame.render_widget(render_header(state, window_sec), rows[0]);

    let now_sec = state.start.elapsed().as_secs_f64();
    render_chart(frame, rows[1], &state.ping, now_sec, window_sec);
    render_chart(frame, rows[2], &state.availability, now_sec, window_sec);
}

fn render_header(state: &ViewerState, window_sec: f64) -> Paragraph<'static> {
    let mut lines = Vec::new();
    if let Some(info) = &state.info {
        let status = match info.available {
            Some(true) => Span::styled("UP", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Some(false) => Span::styled("DOWN", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            None => Span::styled("UNKNOWN", Style::default().fg(Color::Gray)),
        };
        let metrics = format!(
            "  ping={} uptime={} unavailability={} failures={}/{}",
            fmt_ms(info.ping),
            fmt_ms(info.uptime),
            fmt_ms(info.unavailability),
            info.consecutive_failures,
            info.retries
        );
        lines.push(Line::from(vec![
            Span::styled("downwatch  ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            status,
            Span::raw(metrics),
        ]));
        lines.push(Line::from(format!(
            "{}  interval={}ms timeout={}ms  window={}s  last={}  ('q' quit, 'r' restart)",
            info.url,
            info.interval,
            info.timeout,
            window_sec as u64,
            state.last_event.as_deref().unwrap_or("none")
        )));
    } else {
        lines.push(Line::from("Waiting for first check..."));
    }

    Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"))
}

fn render_chart(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    series: &Series,
    now_sec: f64,
    window_sec: f64,
) {
    let points: Vec<(f64, f64)> = series.points.iter().copied().collect();

    let x_min = (now_sec - window_sec).max(0.0);
    let x_max = now_sec.max(window_sec);
    let x_mid = (x_min + x_max) / 2.0;
    let y_bounds = series.bounds();

    let dataset = Dataset::default()
        .name(series.label)
        .marker(symbols::Marker::Braille)
        .graph_type(ratatui::widgets::GraphType::Line)
        .style(Style::default().fg(series.color))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(Block::default().borders(Borders::ALL).title(series.label))
        .x_axis(
            Axis::default()
                .title("time (s)")
                .style(Style::default().fg(Color::Gray))
                .bounds([x_min, x_max])
                .labels(vec![
                    Span::raw(format!("{x_min:.0}")),
                    Span::raw(format!("{x_mid:.0}")),
                    Span::raw(format!("{x_max:.0}")),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(vec![
                    Span::raw(format!("{:.0}", y_bounds[0])),
                    Span::raw(format!("{:.0}", y_bounds[1] / 2.0)),
                    Span::raw(format!("{:.0}", y_bounds[1])),
                ]),
        );

    frame.render_widget(chart, area);
}
