use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::analyzer::{Summary, TradeAnalyzer};
use crate::burst::{buy_fraction, BurstConfig, BurstDetector};
use crate::config::Config;
use crate::error::AppError;
use crate::event::{AlertSeverity, Renderer};
use crate::instrument::InstrumentCode;
use crate::supervisor::Supervisor;
use crate::tick_store::{StoreConnector, TickReader};
use crate::window::AnalysisWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Paused,
    SwappingInstrument,
    Terminated,
}

/// Intents sent by the control surface. Instrument codes are validated before
/// they get here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlIntent {
    TogglePause,
    Pause,
    Resume,
    ChangeInstrument(InstrumentCode),
    Quit,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub retention: usize,
    pub window_size: usize,
    pub time_window_secs: u64,
    /// Strong signals at or above this confidence are raised as alerts.
    pub alert_confidence: u8,
    pub burst: BurstConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            settle_delay: Duration::from_secs(3),
            retention: 10_000,
            window_size: 5_000,
            time_window_secs: 300,
            alert_confidence: 7,
            burst: BurstConfig::default(),
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            settle_delay: config.settle_delay(),
            retention: config.session.retention,
            window_size: config.analyzer.window_size,
            time_window_secs: config.analyzer.time_window_secs,
            alert_confidence: config.session.alert_confidence,
            burst: config.burst.to_burst_config(),
        }
    }
}

/// Outcome of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not eligible: paused, swapping, terminated, or disconnected.
    Skipped,
    Polled { new_ticks: usize },
    StoreFailed,
}

/// Owns all mutable session state: the store reader, the cursor and window, and the
/// burst baseline. The renderer and control surface only see snapshots and send intents.
pub struct SessionController<C: StoreConnector, R, S> {
    config: SessionConfig,
    connector: C,
    reader: Option<C::Reader>,
    renderer: R,
    supervisor: S,
    instrument: InstrumentCode,
    window: AnalysisWindow,
    analyzer: TradeAnalyzer,
    burst: BurstDetector,
    state: SessionState,
    has_summary: bool,
}

impl<C, R, S> SessionController<C, R, S>
where
    C: StoreConnector,
    R: Renderer,
    S: Supervisor,
{
    pub fn new(
        config: SessionConfig,
        connector: C,
        renderer: R,
        supervisor: S,
        instrument: InstrumentCode,
    ) -> Self {
        let window = AnalysisWindow::new(&instrument.to_string(), config.retention);
        let analyzer = TradeAnalyzer::new(config.window_size, config.time_window_secs);
        let burst = BurstDetector::new(config.burst);
        Self {
            config,
            connector,
            reader: None,
            renderer,
            supervisor,
            instrument,
            window,
            analyzer,
            burst,
            state: SessionState::Running,
            has_summary: false,
        }
    }

    pub fn with_analyzer(mut self, analyzer: TradeAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn instrument(&self) -> &InstrumentCode {
        &self.instrument
    }

    pub fn window(&self) -> &AnalysisWindow {
        &self.window
    }

    pub fn cursor(&self) -> i64 {
        self.window.last_seen_sequence_id()
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    /// Open the store connection. On failure the session stays alive with polling
    /// disabled and a persistent error on screen.
    pub fn connect(&mut self) -> bool {
        match self.connector.connect() {
            Ok(reader) => {
                info!(instrument = %self.instrument, "Store connection established");
                self.reader = Some(reader);
                true
            }
            Err(e) => {
                self.reader = None;
                self.report_store_error("store connection failed", &e);
                false
            }
        }
    }

    /// read -> burst check -> window -> analyze -> render. Runs to completion.
    pub fn poll_once(&mut self) -> PollOutcome {
        if self.state != SessionState::Running {
            return PollOutcome::Skipped;
        }
        let Some(reader) = self.reader.as_ref() else {
            return PollOutcome::Skipped;
        };

        let cursor = self.window.last_seen_sequence_id();
        let batch = match reader.read_since(&self.instrument.to_string(), cursor) {
            Ok(batch) => batch,
            Err(e) => {
                self.reader = None;
                self.report_store_error("store read failed", &e);
                return PollOutcome::StoreFailed;
            }
        };
        let new_ticks = batch.len();
        self.renderer.render_status(&format!(
            "last check {} | new ticks: {}",
            chrono::Local::now().format("%H:%M:%S"),
            new_ticks
        ));

        if !batch.is_empty() && self.has_summary {
            if let Some(alert) = self.burst.observe(new_ticks, buy_fraction(&batch.ticks)) {
                warn!(
                    instrument = %self.instrument,
                    batch_size = alert.batch_size,
                    baseline = alert.baseline_mean,
                    kind = ?alert.kind,
                    "Burst detected"
                );
                self.renderer
                    .render_alert(&alert.to_string(), AlertSeverity::Burst);
            }
        }

        let high_water = batch.high_water;
        self.window.extend(batch.ticks);
        if let Some(id) = high_water {
            self.window.advance_cursor(id);
        }
        if self.window.is_empty() {
            self.renderer.render(None, &[]);
            return PollOutcome::Polled { new_ticks };
        }

        match self.analyzer.analyze(&self.window) {
            Some(analysis) => {
                self.has_summary = true;
                self.renderer
                    .render(Some(&analysis.summary), &analysis.detail);
                self.maybe_signal_alert(&analysis.summary);
            }
            None => {
                self.has_summary = false;
                self.renderer.render(None, &[]);
            }
        }
        PollOutcome::Polled { new_ticks }
    }

    pub fn pause(&mut self) {
        if self.state == SessionState::Running {
            self.state = SessionState::Paused;
            info!(instrument = %self.instrument, "Session paused");
            self.renderer.paused(true);
            self.renderer.render_status("paused");
        }
    }

    /// Resume and poll immediately. A disconnected session retries the connection first.
    pub fn resume(&mut self) -> PollOutcome {
        match self.state {
            SessionState::Paused => {
                self.state = SessionState::Running;
                info!(instrument = %self.instrument, "Session resumed");
                self.renderer.paused(false);
            }
            SessionState::Running => {}
            SessionState::SwappingInstrument | SessionState::Terminated => {
                return PollOutcome::Skipped
            }
        }
        if self.reader.is_none() && !self.connect() {
            return PollOutcome::StoreFailed;
        }
        self.poll_once()
    }

    pub fn toggle_pause(&mut self) -> PollOutcome {
        match self.state {
            // Degraded: the toggle key doubles as a reconnect.
            SessionState::Running if self.reader.is_none() => self.resume(),
            SessionState::Running => {
                self.pause();
                PollOutcome::Skipped
            }
            SessionState::Paused => self.resume(),
            _ => PollOutcome::Skipped,
        }
    }

    /// Tear down, reset cursor and window, restart ingestion for `instrument`, wait
    /// for it to settle, then reconnect. Ends in `Running` even when started from
    /// `Paused`, degraded if the reconnect fails.
    pub async fn swap_instrument(&mut self, instrument: InstrumentCode) {
        if self.state == SessionState::Terminated {
            return;
        }
        info!(from = %self.instrument, to = %instrument, "Instrument swap started");
        let was_paused = self.state == SessionState::Paused;
        self.state = SessionState::SwappingInstrument;
        self.renderer.render_alert(
            &format!("switching instrument to {}...", instrument),
            AlertSeverity::Info,
        );

        self.reader = None;
        self.instrument = instrument;
        self.window.reset(&self.instrument.to_string());
        self.burst.reset();
        self.has_summary = false;
        self.renderer.instrument_changed(&self.instrument);
        self.renderer.render(None, &[]);

        if let Err(e) = self.supervisor.restart(&self.instrument) {
            error!(instrument = %self.instrument, error = %e, "Failed to restart ingestion");
            self.renderer
                .render_alert(&format!("ingestion restart failed: {}", e), AlertSeverity::Error);
        }

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        self.state = SessionState::Running;
        if was_paused {
            self.renderer.paused(false);
        }
        if self.connect() {
            self.renderer.render_alert(
                &format!("instrument changed to {}", self.instrument),
                AlertSeverity::Info,
            );
        }
    }

    pub fn terminate(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.state = SessionState::Terminated;
        self.reader = None;
        if let Err(e) = self.supervisor.stop() {
            warn!(error = %e, "Failed to stop ingestion job");
        }
        info!(instrument = %self.instrument, "Session terminated");
        self.renderer.terminated();
    }

    /// Drive the session until `Quit` or until the control channel closes.
    /// Polls never overlap; an instrument swap holds the loop, so no poll can race
    /// the teardown.
    pub async fn run(mut self, mut control_rx: mpsc::Receiver<ControlIntent>) -> Self {
        if self.reader.is_none() {
            self.connect();
        }
        self.poll_once();

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();

        loop {
            let polling = self.state == SessionState::Running && self.reader.is_some();
            tokio::select! {
                _ = ticker.tick(), if polling => {
                    self.poll_once();
                }
                intent = control_rx.recv() => {
                    let Some(intent) = intent else {
                        self.terminate();
                        break;
                    };
                    match intent {
                        ControlIntent::TogglePause => {
                            self.toggle_pause();
                        }
                        ControlIntent::Pause => self.pause(),
                        ControlIntent::Resume => {
                            self.resume();
                        }
                        ControlIntent::ChangeInstrument(code) => {
                            self.swap_instrument(code).await;
                            self.poll_once();
                        }
                        ControlIntent::Quit => {
                            self.terminate();
                            break;
                        }
                    }
                    ticker.reset();
                }
            }
        }
        self
    }

    fn maybe_signal_alert(&mut self, summary: &Summary) {
        if summary.signal.is_strong() && summary.confidence >= self.config.alert_confidence {
            info!(
                instrument = %self.instrument,
                signal = %summary.signal,
                confidence = summary.confidence,
                condition = %summary.condition,
                "High-confidence signal"
            );
            self.renderer.render_alert(
                &format!(
                    "{} ({}/10): {}",
                    summary.signal, summary.confidence, summary.condition
                ),
                AlertSeverity::Signal,
            );
        }
    }

    fn report_store_error(&mut self, what: &str, e: &AppError) {
        error!(instrument = %self.instrument, error = %e, "{}", what);
        self.renderer.render_alert(
            &format!("!!! {}: {} (press p to retry)", what, e),
            AlertSeverity::Error,
        );
    }
}
