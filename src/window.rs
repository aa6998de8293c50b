use std::collections::VecDeque;

use crate::model::tick::Tick;

/// Bounded in-memory tail of one instrument's ticks plus the incremental read cursor.
#[derive(Debug, Clone)]
pub struct AnalysisWindow {
    instrument: String,
    ticks: VecDeque<Tick>,
    retention: usize,
    last_seen_sequence_id: i64,
}

impl AnalysisWindow {
    pub fn new(instrument: &str, retention: usize) -> Self {
        let retention = retention.max(1);
        Self {
            instrument: instrument.to_string(),
            ticks: VecDeque::with_capacity(retention.min(1024)),
            retention,
            last_seen_sequence_id: 0,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn last_seen_sequence_id(&self) -> i64 {
        self.last_seen_sequence_id
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn ticks(&self) -> impl DoubleEndedIterator<Item = &Tick> + ExactSizeIterator {
        self.ticks.iter()
    }

    /// Append a freshly polled batch, evicting the oldest ticks past the retention
    /// bound, and advance the cursor to the batch's highest sequence id.
    /// Ticks at or below the current cursor are ignored.
    pub fn extend(&mut self, batch: Vec<Tick>) {
        for tick in batch {
            if tick.sequence_id <= self.last_seen_sequence_id {
                continue;
            }
            self.last_seen_sequence_id = tick.sequence_id;
            self.ticks.push_back(tick);
        }
        while self.ticks.len() > self.retention {
            self.ticks.pop_front();
        }
    }

    /// Move the cursor past ids that were read but not kept, such as stored rows
    /// that failed to decode. Never moves it backwards.
    pub fn advance_cursor(&mut self, sequence_id: i64) {
        self.last_seen_sequence_id = self.last_seen_sequence_id.max(sequence_id);
    }

    /// Drop all history and rewind the cursor, switching to `instrument`.
    pub fn reset(&mut self, instrument: &str) {
        self.instrument = instrument.to_string();
        self.ticks.clear();
        self.last_seen_sequence_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tick::Side;

    fn tick(id: i64) -> Tick {
        Tick {
            sequence_id: id,
            instrument_code: "7203".to_string(),
            timestamp: "09:00:00".to_string(),
            price: 100.0,
            volume: 1,
            side: Side::Buy,
        }
    }

    #[test]
    fn extend_trims_oldest_and_advances_cursor() {
        let mut w = AnalysisWindow::new("7203", 3);
        w.extend((1..=5).map(tick).collect());
        assert_eq!(w.len(), 3);
        assert_eq!(w.last_seen_sequence_id(), 5);
        let ids: Vec<i64> = w.ticks().map(|t| t.sequence_id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn extend_skips_already_seen_ticks() {
        let mut w = AnalysisWindow::new("7203", 10);
        w.extend(vec![tick(1), tick(2)]);
        w.extend(vec![tick(2), tick(3)]);
        assert_eq!(w.len(), 3);
        assert_eq!(w.last_seen_sequence_id(), 3);
    }

    #[test]
    fn advance_cursor_only_moves_forward() {
        let mut w = AnalysisWindow::new("7203", 10);
        w.extend(vec![tick(3)]);
        w.advance_cursor(5);
        assert_eq!(w.last_seen_sequence_id(), 5);
        w.advance_cursor(4);
        assert_eq!(w.last_seen_sequence_id(), 5);
        w.extend(vec![tick(5), tick(6)]);
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn reset_clears_history_and_cursor() {
        let mut w = AnalysisWindow::new("7203", 10);
        w.extend(vec![tick(7)]);
        w.reset("6758");
        assert!(w.is_empty());
        assert_eq!(w.last_seen_sequence_id(), 0);
        assert_eq!(w.instrument(), "6758");
    }
}
