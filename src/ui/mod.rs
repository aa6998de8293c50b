pub mod dashboard;

use std::time::{Duration, Instant};

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::widgets::Clear;
use ratatui::Frame;

use crate::analyzer::{ClassifiedTick, Summary};
use crate::event::{AlertSeverity, RenderEvent};
use crate::input::InstrumentPrompt;

use dashboard::{
    AnalysisPanel, BreakdownPanel, KeybindBar, MetricsPanel, PromptPopup, StatusBar, TradeLogPanel,
};

const FLASH_DURATION: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct Flash {
    pub message: String,
    pub severity: AlertSeverity,
    /// `None` keeps the message until the session recovers.
    pub expires_at: Option<Instant>,
}

pub struct AppState {
    pub instrument: String,
    pub summary: Option<Summary>,
    pub detail: Vec<ClassifiedTick>,
    pub status: String,
    pub flash: Option<Flash>,
    pub paused: bool,
    pub terminated: bool,
    pub prompt: Option<InstrumentPrompt>,
    pub log_rows: usize,
    /// Set when a strong high-confidence signal arrives; the analysis border flashes.
    pub highlight_until: Option<Instant>,
}

impl AppState {
    pub fn new(instrument: &str, log_rows: usize) -> Self {
        Self {
            instrument: instrument.to_string(),
            summary: None,
            detail: Vec::new(),
            status: "waiting for data...".to_string(),
            flash: None,
            paused: false,
            terminated: false,
            prompt: None,
            log_rows,
            highlight_until: None,
        }
    }

    pub fn apply(&mut self, event: RenderEvent) {
        self.apply_at(event, Instant::now());
    }

    pub fn apply_at(&mut self, event: RenderEvent, now: Instant) {
        match event {
            RenderEvent::Analysis { summary, detail } => {
                self.summary = summary.map(|s| *s);
                self.detail = detail;
            }
            RenderEvent::Alert { message, severity } => {
                if severity == AlertSeverity::Signal {
                    self.highlight_until = Some(now + Duration::from_secs(1));
                }
                let expires_at = match severity {
                    AlertSeverity::Error => None,
                    _ => Some(now + FLASH_DURATION),
                };
                // A sticky error is only replaced by another error.
                if self.has_sticky_error() && severity != AlertSeverity::Error {
                    return;
                }
                self.flash = Some(Flash {
                    message,
                    severity,
                    expires_at,
                });
            }
            RenderEvent::Status(text) => {
                // A completed poll means the store is reachable again.
                if self.has_sticky_error() && !self.paused {
                    self.flash = None;
                }
                self.status = text;
            }
            RenderEvent::InstrumentChanged(code) => {
                self.instrument = code;
                self.summary = None;
                self.detail.clear();
                if self.has_sticky_error() {
                    self.flash = None;
                }
            }
            RenderEvent::Paused(paused) => {
                self.paused = paused;
            }
            RenderEvent::Terminated => {
                self.terminated = true;
            }
        }
    }

    /// Drop an expired flash message.
    pub fn tick(&mut self, now: Instant) {
        if self
            .flash
            .as_ref()
            .and_then(|f| f.expires_at)
            .is_some_and(|t| now >= t)
        {
            self.flash = None;
        }
        if self.highlight_until.is_some_and(|t| now >= t) {
            self.highlight_until = None;
        }
    }

    fn has_sticky_error(&self) -> bool {
        self.flash
            .as_ref()
            .is_some_and(|f| f.severity == AlertSeverity::Error)
    }
}

pub fn render(frame: &mut Frame, state: &AppState) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(10),   // log + analysis
            Constraint::Length(1), // keybinds
        ])
        .split(frame.area());

    frame.render_widget(
        StatusBar {
            instrument: &state.instrument,
            paused: state.paused,
            status: &state.status,
            flash: state.flash.as_ref(),
        },
        outer[0],
    );

    let main_area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
        .split(outer[1]);

    frame.render_widget(
        TradeLogPanel::new(&state.detail, &state.instrument, state.log_rows),
        main_area[0],
    );

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(8)])
        .split(main_area[1]);

    frame.render_widget(
        AnalysisPanel::new(state.summary.as_ref(), state.highlight_until.is_some()),
        right[0],
    );

    if let Some(summary) = state.summary.as_ref() {
        let lower = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(32), Constraint::Min(40)])
            .split(right[1]);
        frame.render_widget(MetricsPanel::new(&summary.metrics), lower[0]);
        frame.render_widget(BreakdownPanel::new(summary), lower[1]);
    }

    frame.render_widget(KeybindBar, outer[2]);

    if let Some(prompt) = state.prompt.as_ref() {
        let area = centered_rect(50, 7, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(PromptPopup::new(prompt), area);
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
