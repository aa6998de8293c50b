use std::collections::VecDeque;
use std::fmt;

use crate::model::tick::{Side, Tick};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstConfig {
    /// Number of recent batch sizes kept as the baseline.
    pub capacity: usize,
    /// A batch is a burst when it exceeds `multiplier` x the baseline mean...
    pub multiplier: f64,
    /// ...and is strictly larger than this absolute floor.
    pub min_batch: usize,
    pub buy_skew: f64,
    pub sell_skew: f64,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            capacity: 30,
            multiplier: 5.0,
            min_batch: 5,
            buy_skew: 0.8,
            sell_skew: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstKind {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BurstAlert {
    pub kind: BurstKind,
    pub batch_size: usize,
    pub baseline_mean: f64,
    pub buy_fraction: f64,
}

impl fmt::Display for BurstAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            BurstKind::Buy => "buy burst",
            BurstKind::Sell => "sell burst",
        };
        write!(
            f,
            "!! {} detected: {} ticks (baseline {:.1}, buy {:.0}%)",
            label,
            self.batch_size,
            self.baseline_mean,
            self.buy_fraction * 100.0
        )
    }
}

/// Flags batches that are both abnormally large and one-sided relative to recent polls.
#[derive(Debug, Clone)]
pub struct BurstDetector {
    config: BurstConfig,
    sizes: VecDeque<usize>,
}

impl BurstDetector {
    pub fn new(config: BurstConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            config: BurstConfig { capacity, ..config },
            sizes: VecDeque::with_capacity(capacity),
        }
    }

    pub fn observe(&mut self, batch_size: usize, buy_fraction: f64) -> Option<BurstAlert> {
        let baseline = self.baseline_mean();

        self.sizes.push_back(batch_size);
        while self.sizes.len() > self.config.capacity {
            self.sizes.pop_front();
        }

        let baseline = baseline?;
        let size = batch_size as f64;
        if size <= baseline * self.config.multiplier || batch_size <= self.config.min_batch {
            return None;
        }
        let kind = if buy_fraction > self.config.buy_skew {
            BurstKind::Buy
        } else if buy_fraction < self.config.sell_skew {
            BurstKind::Sell
        } else {
            return None;
        };
        Some(BurstAlert {
            kind,
            batch_size,
            baseline_mean: baseline,
            buy_fraction,
        })
    }

    /// Mean of the batch sizes observed before the current one.
    pub fn baseline_mean(&self) -> Option<f64> {
        if self.sizes.is_empty() {
            return None;
        }
        Some(self.sizes.iter().sum::<usize>() as f64 / self.sizes.len() as f64)
    }

    pub fn samples(&self) -> usize {
        self.sizes.len()
    }

    pub fn reset(&mut self) {
        self.sizes.clear();
    }
}

/// Share of trades in `batch` that were buys, by count. Zero for an empty batch.
pub fn buy_fraction(batch: &[Tick]) -> f64 {
    if batch.is_empty() {
        return 0.0;
    }
    let buys = batch.iter().filter(|t| t.side == Side::Buy).count();
    buys as f64 / batch.len() as f64
}
