use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::direction::infer_sides;
use crate::error::{AppError, AppResult};
use crate::instrument::InstrumentCode;
use crate::model::tick::RawRow;
use crate::tick_store::TickStore;

/// Yields the raw rows currently visible for the configured instrument.
/// Successive pulls may overlap; the store deduplicates.
pub trait TickSource {
    fn pull(&mut self) -> AppResult<Vec<RawRow>>;
}

/// Reads a delimited text export (comma or tab separated) of the time-and-sales tape:
/// `timestamp, price, volume[, side_code]`, one trade per line.
#[derive(Debug, Clone)]
pub struct DelimitedFileSource {
    path: PathBuf,
}

impl DelimitedFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TickSource for DelimitedFileSource {
    fn pull(&mut self) -> AppResult<Vec<RawRow>> {
        if !self.path.exists() {
            return Err(AppError::Source(format!(
                "source file not found: {}",
                self.path.display()
            )));
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(parse_delimited(&content))
    }
}

/// Rows with fewer than three columns are skipped; everything else is passed through
/// uncoerced for the direction inferrer to validate.
pub fn parse_delimited(content: &str) -> Vec<RawRow> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let sep = if line.contains('\t') { '\t' } else { ',' };
            let cols: Vec<&str> = line.split(sep).map(str::trim).collect();
            if cols.len() < 3 {
                return None;
            }
            let side = cols.get(3).copied().filter(|s| !s.is_empty());
            Some(RawRow::new(cols[0], cols[1], cols[2], side))
        })
        .collect()
}

/// One ingestion cycle: pull, infer sides, append.
pub struct IngestWorker<S> {
    source: S,
    store: TickStore,
    instrument: InstrumentCode,
}

impl<S: TickSource> IngestWorker<S> {
    pub fn new(source: S, store: TickStore, instrument: InstrumentCode) -> Self {
        Self {
            source,
            store,
            instrument,
        }
    }

    pub fn store(&self) -> &TickStore {
        &self.store
    }

    /// Returns the number of newly stored ticks.
    pub fn run_cycle(&mut self) -> AppResult<usize> {
        let rows = self.source.pull()?;
        let ticks = infer_sides(&rows);
        if ticks.is_empty() {
            return Ok(0);
        }
        let dropped = rows.len() - ticks.len();
        if dropped > 0 {
            debug!(dropped, "Dropped malformed source rows");
        }
        let inserted = self.store.append(&self.instrument.to_string(), &ticks)?;
        if inserted > 0 {
            info!(instrument = %self.instrument, inserted, "Stored new ticks");
        }
        Ok(inserted)
    }

    /// Cycle every `interval` until `shutdown` flips to true. Source errors are
    /// transient and only logged; store errors end the loop.
    pub async fn run(
        mut self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle() {
                        Ok(_) => {}
                        Err(AppError::Source(msg)) => warn!(error = %msg, "Tick source unavailable"),
                        Err(AppError::Io(e)) => warn!(error = %e, "Tick source read failed"),
                        Err(e) => return Err(e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(instrument = %self.instrument, "Ingestion stopping");
                        return Ok(());
                    }
                }
            }
        }
    }
}
