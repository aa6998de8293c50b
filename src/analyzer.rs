use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};

use crate::model::signal::{Condition, Signal};
use crate::model::tick::{parse_timestamp, Side, Tick};
use crate::window::AnalysisWindow;

/// Notional thresholds used when no volume baseline is available.
pub const FALLBACK_THRESHOLDS: Thresholds = Thresholds {
    medium: 1_000_000.0,
    large: 10_000_000.0,
    extra_large: 50_000_000.0,
};

const MEDIUM_MULTIPLE: f64 = 5.0;
const LARGE_MULTIPLE: f64 = 20.0;
const EXTRA_LARGE_MULTIPLE: f64 = 100.0;
const DOMINANCE_RATIO: f64 = 1.5;
const MAX_CONFIDENCE: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LotBucket {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl LotBucket {
    pub const ALL: [LotBucket; 4] = [
        LotBucket::Small,
        LotBucket::Medium,
        LotBucket::Large,
        LotBucket::ExtraLarge,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Small => "Small",
            Self::Medium => "Medium",
            Self::Large => "Large",
            Self::ExtraLarge => "XLarge",
        }
    }

    pub fn is_large(self) -> bool {
        matches!(self, Self::Large | Self::ExtraLarge)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Lower bounds (inclusive) of the Medium, Large and ExtraLarge buckets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub medium: f64,
    pub large: f64,
    pub extra_large: f64,
}

impl Thresholds {
    /// Scale the bucket boundaries to the typical trade notional of the sub-window.
    pub fn from_metrics(metrics: &MetricsSnapshot) -> Self {
        let base = metrics.avg_volume_per_trade;
        if !(base.is_finite() && base > 0.0) {
            return FALLBACK_THRESHOLDS;
        }
        let unit = base * metrics.vwap;
        Self {
            medium: unit * MEDIUM_MULTIPLE,
            large: unit * LARGE_MULTIPLE,
            extra_large: unit * EXTRA_LARGE_MULTIPLE,
        }
    }

    pub fn classify(&self, notional: f64) -> LotBucket {
        if notional < self.medium {
            LotBucket::Small
        } else if notional < self.large {
            LotBucket::Medium
        } else if notional < self.extra_large {
            LotBucket::Large
        } else {
            LotBucket::ExtraLarge
        }
    }

    /// Notional range `[lower, upper)` covered by `bucket`; `None` upper means unbounded.
    pub fn bounds(&self, bucket: LotBucket) -> (f64, Option<f64>) {
        match bucket {
            LotBucket::Small => (0.0, Some(self.medium)),
            LotBucket::Medium => (self.medium, Some(self.large)),
            LotBucket::Large => (self.large, Some(self.extra_large)),
            LotBucket::ExtraLarge => (self.extra_large, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub vwap: f64,
    /// Population standard deviation of trade price.
    pub volatility: f64,
    pub trade_density_per_min: f64,
    pub avg_volume_per_trade: f64,
    pub price_open: f64,
    pub price_close: f64,
    pub trade_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketFlow {
    pub bucket: LotBucket,
    pub buy_volume: i64,
    pub sell_volume: i64,
}

impl BucketFlow {
    fn empty(bucket: LotBucket) -> Self {
        Self {
            bucket,
            buy_volume: 0,
            sell_volume: 0,
        }
    }

    pub fn net(&self) -> i64 {
        self.buy_volume - self.sell_volume
    }

    pub fn total(&self) -> i64 {
        self.buy_volume.saturating_add(self.sell_volume)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTick {
    pub sequence_id: i64,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub volume: i64,
    pub side: Side,
    pub notional: f64,
    pub bucket: LotBucket,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_volume: i64,
    pub breakdown: [BucketFlow; 4],
    pub signal: Signal,
    pub confidence: u8,
    pub condition: Condition,
    pub metrics: MetricsSnapshot,
    pub thresholds: Thresholds,
    pub buy_ratio: f64,
}

impl Summary {
    pub fn flow(&self, bucket: LotBucket) -> &BucketFlow {
        &self.breakdown[bucket.index()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub summary: Summary,
    /// Cleaned, classified history, most recent last.
    pub detail: Vec<ClassifiedTick>,
}

#[derive(Debug, Clone)]
pub struct TradeAnalyzer {
    window_size: usize,
    time_window: TimeDelta,
    anchor_date: NaiveDate,
}

impl TradeAnalyzer {
    pub fn new(window_size: usize, time_window_secs: u64) -> Self {
        Self {
            window_size: window_size.max(1),
            time_window: i64::try_from(time_window_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            anchor_date: Local::now().date_naive(),
        }
    }

    /// Date that time-of-day timestamps are placed on.
    pub fn with_anchor_date(mut self, date: NaiveDate) -> Self {
        self.anchor_date = date;
        self
    }

    pub fn analyze(&self, window: &AnalysisWindow) -> Option<Analysis> {
        self.analyze_ticks(window.ticks())
    }

    /// Returns `None` while there is not enough clean data for a reading.
    pub fn analyze_ticks<'a>(&self, ticks: impl IntoIterator<Item = &'a Tick>) -> Option<Analysis> {
        let cleaned = self.clean(ticks);
        if cleaned.len() < 2 {
            return None;
        }
        let metrics = self.metrics(&cleaned)?;
        let thresholds = Thresholds::from_metrics(&metrics);

        let mut breakdown = LotBucket::ALL.map(BucketFlow::empty);
        let mut large_buy_volume = 0i64;
        let mut large_sell_volume = 0i64;
        let mut large_buy_pv = 0.0;
        let mut large_sell_pv = 0.0;

        let detail: Vec<ClassifiedTick> = cleaned
            .into_iter()
            .map(|c| {
                let notional = c.price * c.volume as f64;
                let bucket = thresholds.classify(notional);
                let flow = &mut breakdown[bucket.index()];
                match c.side {
                    Side::Buy => flow.buy_volume = flow.buy_volume.saturating_add(c.volume),
                    Side::Sell => flow.sell_volume = flow.sell_volume.saturating_add(c.volume),
                }
                if bucket.is_large() {
                    match c.side {
                        Side::Buy => {
                            large_buy_volume = large_buy_volume.saturating_add(c.volume);
                            large_buy_pv += notional;
                        }
                        Side::Sell => {
                            large_sell_volume = large_sell_volume.saturating_add(c.volume);
                            large_sell_pv += notional;
                        }
                    }
                }
                ClassifiedTick {
                    sequence_id: c.sequence_id,
                    timestamp: c.timestamp,
                    price: c.price,
                    volume: c.volume,
                    side: c.side,
                    notional,
                    bucket,
                }
            })
            .collect();

        // Volumes are untrusted input; totals saturate instead of overflowing.
        let total_buy = saturating_total(breakdown.iter().map(|f| f.buy_volume));
        let total_sell = saturating_total(breakdown.iter().map(|f| f.sell_volume));
        let buy_ratio = if total_buy > 0 || total_sell > 0 {
            total_buy as f64 / (total_buy as f64 + total_sell as f64)
        } else {
            0.0
        };

        let flow = LargeLotFlow {
            buy_volume: large_buy_volume,
            sell_volume: large_sell_volume,
            buy_vwap: vwap_or_zero(large_buy_pv, large_buy_volume),
            sell_vwap: vwap_or_zero(large_sell_pv, large_sell_volume),
        };
        let bucket_net = saturating_total(breakdown.iter().map(BucketFlow::net));
        let (signal, confidence, condition) = derive_signal(&metrics, &flow, bucket_net)
            .unwrap_or((Signal::Neutral, 0, Condition::WaitAndSee));

        let skip = detail.len().saturating_sub(self.window_size);
        let detail = detail.into_iter().skip(skip).collect();

        Some(Analysis {
            summary: Summary {
                total_volume: total_buy.saturating_add(total_sell),
                breakdown,
                signal,
                confidence: confidence.min(MAX_CONFIDENCE),
                condition,
                metrics,
                thresholds,
                buy_ratio,
            },
            detail,
        })
    }

    fn clean<'a>(&self, ticks: impl IntoIterator<Item = &'a Tick>) -> Vec<CleanTick> {
        ticks
            .into_iter()
            .filter_map(|t| {
                let timestamp = parse_timestamp(&t.timestamp, self.anchor_date)?;
                if !(t.price.is_finite() && t.price > 0.0) || t.volume <= 0 {
                    return None;
                }
                Some(CleanTick {
                    sequence_id: t.sequence_id,
                    timestamp,
                    price: t.price,
                    volume: t.volume,
                    side: t.side,
                })
            })
            .collect()
    }

    /// Metrics over the trailing time window, measured back from the latest tick.
    fn metrics(&self, cleaned: &[CleanTick]) -> Option<MetricsSnapshot> {
        let now = cleaned.last()?.timestamp;
        let cutoff = now.checked_sub_signed(self.time_window);
        let window: Vec<&CleanTick> = cleaned
            .iter()
            .filter(|c| cutoff.map_or(true, |cut| c.timestamp > cut))
            .collect();
        if window.len() < 2 {
            return None;
        }

        let n = window.len() as f64;
        let total_volume = saturating_total(window.iter().map(|c| c.volume));
        if total_volume <= 0 {
            return None;
        }
        let pv: f64 = window.iter().map(|c| c.price * c.volume as f64).sum();
        let vwap = pv / total_volume as f64;

        let mean_price = window.iter().map(|c| c.price).sum::<f64>() / n;
        let variance = window
            .iter()
            .map(|c| (c.price - mean_price).powi(2))
            .sum::<f64>()
            / n;

        let first = window.first()?;
        let last = window.last()?;
        let span_min = (last.timestamp - first.timestamp).num_seconds() as f64 / 60.0;
        let trade_density_per_min = if span_min > 0.0 { n / span_min } else { 0.0 };

        Some(MetricsSnapshot {
            vwap,
            volatility: variance.sqrt(),
            trade_density_per_min,
            avg_volume_per_trade: total_volume as f64 / n,
            price_open: first.price,
            price_close: last.price,
            trade_count: window.len(),
        })
    }
}

struct CleanTick {
    sequence_id: i64,
    timestamp: NaiveDateTime,
    price: f64,
    volume: i64,
    side: Side,
}

struct LargeLotFlow {
    buy_volume: i64,
    sell_volume: i64,
    buy_vwap: f64,
    sell_vwap: f64,
}

fn saturating_total(volumes: impl Iterator<Item = i64>) -> i64 {
    volumes.fold(0, i64::saturating_add)
}

fn vwap_or_zero(pv: f64, volume: i64) -> f64 {
    if volume > 0 {
        pv / volume as f64
    } else {
        0.0
    }
}

/// First matching rule wins; the order below is part of the contract.
/// `None` means a numeric degeneracy, reported as neutral by the caller.
fn derive_signal(
    metrics: &MetricsSnapshot,
    large: &LargeLotFlow,
    bucket_net: i64,
) -> Option<(Signal, u8, Condition)> {
    let large_buy = large.buy_volume as f64;
    let large_sell = large.sell_volume as f64;
    let large_net = large.buy_volume - large.sell_volume;

    let denom = metrics.avg_volume_per_trade * 10.0;
    if !(denom.is_finite() && denom > 0.0) {
        return None;
    }
    let score = large_net.unsigned_abs() as f64 / denom;
    if !score.is_finite() {
        return None;
    }

    let price_up = metrics.price_close >= metrics.price_open;
    let price_down = metrics.price_close < metrics.price_open;
    let reversal_confidence = clamp_confidence((score * 1.5).round() + 3.0);
    let trend_confidence = clamp_confidence(score.round() + 1.0);

    let out = if large_sell > large_buy * DOMINANCE_RATIO && price_up {
        (Signal::StrongBuy, reversal_confidence, Condition::AbsorptionOfSelling)
    } else if large_buy > large_sell * DOMINANCE_RATIO && price_down {
        (Signal::StrongSell, reversal_confidence, Condition::BuyingExhaustion)
    } else if large_net > 0 && score > 1.0 {
        let condition = if large.buy_vwap > metrics.vwap {
            Condition::AggressiveBuyingAboveVwap
        } else {
            Condition::LargeLotAccumulation
        };
        (Signal::StrongBuy, trend_confidence, condition)
    } else if large_net < 0 && score > 1.0 {
        let condition = if large.sell_vwap < metrics.vwap {
            Condition::SellingBelowVwap
        } else {
            Condition::LargeLotDistribution
        };
        (Signal::StrongSell, trend_confidence, condition)
    } else if bucket_net > 0 {
        (Signal::BuyLean, 3, Condition::SmallLotLedBuying)
    } else if bucket_net < 0 {
        (Signal::SellLean, 3, Condition::SmallLotLedSelling)
    } else {
        (Signal::Neutral, 0, Condition::WaitAndSee)
    };
    Some(out)
}

fn clamp_confidence(raw: f64) -> u8 {
    if raw.is_nan() {
        0
    } else {
        raw.clamp(0.0, MAX_CONFIDENCE as f64) as u8
    }
}
