use tokio::sync::mpsc;
use tracing::warn;

use crate::analyzer::{ClassifiedTick, Summary};
use crate::instrument::InstrumentCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Info,
    Burst,
    Signal,
    /// Stays on screen until the session recovers.
    Error,
}

/// Immutable snapshots the session hands to whatever draws them.
#[derive(Debug, Clone)]
pub enum RenderEvent {
    Analysis {
        summary: Option<Box<Summary>>,
        detail: Vec<ClassifiedTick>,
    },
    Alert {
        message: String,
        severity: AlertSeverity,
    },
    Status(String),
    InstrumentChanged(String),
    Paused(bool),
    Terminated,
}

/// Display side of the session. Implementations own all presentation concerns.
pub trait Renderer {
    fn render(&mut self, summary: Option<&Summary>, detail: &[ClassifiedTick]);
    fn render_alert(&mut self, message: &str, severity: AlertSeverity);
    fn render_status(&mut self, text: &str);

    fn instrument_changed(&mut self, _instrument: &InstrumentCode) {}
    fn paused(&mut self, _paused: bool) {}
    fn terminated(&mut self) {}
}

/// Forwards render calls to the UI loop over a bounded channel.
pub struct ChannelRenderer {
    tx: mpsc::Sender<RenderEvent>,
    max_detail: usize,
}

impl ChannelRenderer {
    pub fn new(tx: mpsc::Sender<RenderEvent>, max_detail: usize) -> Self {
        Self { tx, max_detail }
    }

    fn send(&self, event: RenderEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!(error = %e, "Render event dropped");
        }
    }
}

impl Renderer for ChannelRenderer {
    fn render(&mut self, summary: Option<&Summary>, detail: &[ClassifiedTick]) {
        let skip = detail.len().saturating_sub(self.max_detail);
        self.send(RenderEvent::Analysis {
            summary: summary.cloned().map(Box::new),
            detail: detail[skip..].to_vec(),
        });
    }

    fn render_alert(&mut self, message: &str, severity: AlertSeverity) {
        self.send(RenderEvent::Alert {
            message: message.to_string(),
            severity,
        });
    }

    fn render_status(&mut self, text: &str) {
        self.send(RenderEvent::Status(text.to_string()));
    }

    fn instrument_changed(&mut self, instrument: &InstrumentCode) {
        self.send(RenderEvent::InstrumentChanged(instrument.to_string()));
    }

    fn paused(&mut self, paused: bool) {
        self.send(RenderEvent::Paused(paused));
    }

    fn terminated(&mut self) {
        self.send(RenderEvent::Terminated);
    }
}
