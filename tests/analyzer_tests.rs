use chrono::NaiveDate;

use tickflow::analyzer::{LotBucket, TradeAnalyzer, FALLBACK_THRESHOLDS};
use tickflow::model::signal::{Condition, Signal};
use tickflow::model::tick::{Side, Tick};
use tickflow::window::AnalysisWindow;

fn analyzer() -> TradeAnalyzer {
    TradeAnalyzer::new(5_000, 300).with_anchor_date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
}

fn t(id: i64, ts: &str, price: f64, volume: i64, side: Side) -> Tick {
    Tick {
        sequence_id: id,
        instrument_code: "5721".to_string(),
        timestamp: ts.to_string(),
        price,
        volume,
        side,
    }
}

fn at(second: i64) -> String {
    format!("09:{:02}:{:02}", second / 60, second % 60)
}

/// 40 alternating small trades of 10 shares at 100 plus one large trade in the middle.
/// The final small trade prints at `last_price`.
fn tape_with_large_trade(large_price: f64, large_side: Side, last_price: f64) -> Vec<Tick> {
    (1..=41)
        .map(|i| {
            if i == 21 {
                t(i, &at(i), large_price, 2_000, large_side)
            } else {
                let price = if i == 41 { last_price } else { 100.0 };
                let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                t(i, &at(i), price, 10, side)
            }
        })
        .collect()
}

#[test]
/// Verifies the two-trade baseline: flat prices give VWAP 10 and zero
/// volatility, and balanced small-lot flow reads as neutral.
fn two_flat_trades_read_neutral() {
    let ticks = vec![
        t(1, "09:00:00", 10.0, 100, Side::Buy),
        t(2, "09:00:01", 10.0, 100, Side::Sell),
    ];
    let summary = analyzer().analyze_ticks(&ticks).expect("summary").summary;

    assert!((summary.metrics.vwap - 10.0).abs() < 1e-9);
    assert_eq!(summary.metrics.volatility, 0.0);
    assert_eq!(summary.signal, Signal::Neutral);
    assert_eq!(summary.confidence, 0);
    assert_eq!(summary.condition, Condition::WaitAndSee);
}

#[test]
/// Verifies that one-sided small-lot flow without large lots only leans:
/// two small buys read as BuyLean with confidence 3.
fn two_small_buys_lean_buy() {
    let ticks = vec![
        t(1, "09:00:00", 10.0, 100, Side::Buy),
        t(2, "09:00:01", 10.0, 100, Side::Buy),
    ];
    let summary = analyzer().analyze_ticks(&ticks).expect("summary").summary;

    assert_eq!(summary.signal, Signal::BuyLean);
    assert_eq!(summary.confidence, 3);
    assert_eq!(summary.condition, Condition::SmallLotLedBuying);
    assert_eq!(summary.flow(LotBucket::Small).buy_volume, 200);
}

#[test]
fn small_lot_selling_leans_sell() {
    let ticks = vec![
        t(1, "09:00:00", 10.0, 100, Side::Sell),
        t(2, "09:00:01", 10.0, 100, Side::Sell),
        t(3, "09:00:02", 10.0, 50, Side::Buy),
    ];
    let summary = analyzer().analyze_ticks(&ticks).expect("summary").summary;
    assert_eq!(summary.signal, Signal::SellLean);
    assert_eq!(summary.confidence, 3);
    assert_eq!(summary.condition, Condition::SmallLotLedSelling);
}

#[test]
/// Verifies absorption: large selling dominates while price holds, which reads
/// as a strong buy.
fn large_selling_into_flat_price_is_absorption() {
    let summary = analyzer()
        .analyze_ticks(&tape_with_large_trade(100.0, Side::Sell, 100.0))
        .expect("summary")
        .summary;
    assert_eq!(summary.flow(LotBucket::Large).sell_volume, 2_000);
    assert_eq!(summary.signal, Signal::StrongBuy);
    assert_eq!(summary.condition, Condition::AbsorptionOfSelling);
    assert_eq!(summary.confidence, 8);
}

#[test]
/// Verifies exhaustion: large buying dominates while price falls.
fn large_buying_into_falling_price_is_exhaustion() {
    let summary = analyzer()
        .analyze_ticks(&tape_with_large_trade(100.0, Side::Buy, 99.0))
        .expect("summary")
        .summary;
    assert_eq!(summary.signal, Signal::StrongSell);
    assert_eq!(summary.condition, Condition::BuyingExhaustion);
    assert_eq!(summary.confidence, 8);
}

#[test]
/// Verifies the large-lot trend branch on the buy side, split by where the
/// large buys printed relative to VWAP.
fn large_net_buying_is_strong_buy() {
    let above = analyzer()
        .analyze_ticks(&tape_with_large_trade(105.0, Side::Buy, 100.0))
        .expect("summary")
        .summary;
    assert_eq!(above.signal, Signal::StrongBuy);
    assert_eq!(above.condition, Condition::AggressiveBuyingAboveVwap);
    assert_eq!(above.confidence, 4);

    let at_vwap = analyzer()
        .analyze_ticks(&tape_with_large_trade(100.0, Side::Buy, 100.0))
        .expect("summary")
        .summary;
    assert_eq!(at_vwap.signal, Signal::StrongBuy);
    assert_eq!(at_vwap.condition, Condition::LargeLotAccumulation);
}

#[test]
/// Verifies the large-lot trend branch on the sell side.
fn large_net_selling_is_strong_sell() {
    let below = analyzer()
        .analyze_ticks(&tape_with_large_trade(95.0, Side::Sell, 99.0))
        .expect("summary")
        .summary;
    assert_eq!(below.signal, Signal::StrongSell);
    assert_eq!(below.condition, Condition::SellingBelowVwap);
    assert_eq!(below.confidence, 4);

    let at_vwap = analyzer()
        .analyze_ticks(&tape_with_large_trade(100.0, Side::Sell, 99.0))
        .expect("summary")
        .summary;
    assert_eq!(at_vwap.signal, Signal::StrongSell);
    assert_eq!(at_vwap.condition, Condition::LargeLotDistribution);
}

#[test]
/// Verifies bucket completeness: every cleaned trade lands in exactly one
/// bucket, so bucket totals add up to the total volume.
fn bucket_totals_cover_all_volume() {
    let ticks = tape_with_large_trade(105.0, Side::Buy, 100.0);
    let summary = analyzer().analyze_ticks(&ticks).expect("summary").summary;

    let expected: i64 = ticks.iter().map(|t| t.volume).sum();
    let bucketed: i64 = summary.breakdown.iter().map(|f| f.total()).sum();
    assert_eq!(summary.total_volume, expected);
    assert_eq!(bucketed, expected);
    for (flow, bucket) in summary.breakdown.iter().zip(LotBucket::ALL) {
        assert_eq!(flow.bucket, bucket);
    }
    let buys: i64 = ticks.iter().filter(|t| t.side == Side::Buy).map(|t| t.volume).sum();
    assert!((summary.buy_ratio - buys as f64 / expected as f64).abs() < 1e-9);
}

#[test]
fn thresholds_are_monotonic() {
    for large in [100, 500, 2_000, 50_000] {
        let mut ticks = tape_with_large_trade(100.0, Side::Buy, 100.0);
        ticks[20].volume = large;
        let th = analyzer().analyze_ticks(&ticks).expect("summary").summary.thresholds;
        assert!(th.medium > 0.0);
        assert!(th.medium <= th.large && th.large <= th.extra_large);
    }
    assert!(FALLBACK_THRESHOLDS.medium < FALLBACK_THRESHOLDS.large);
    assert!(FALLBACK_THRESHOLDS.large < FALLBACK_THRESHOLDS.extra_large);
}

#[test]
/// Verifies confidence never leaves 0..=10, even for extreme large-lot imbalance.
fn confidence_stays_in_range() {
    for (volume, side, last) in [
        (1_000_000, Side::Sell, 100.0),
        (1_000_000, Side::Buy, 99.0),
        (1_000_000, Side::Buy, 100.0),
        (400, Side::Sell, 99.0),
        (10, Side::Buy, 100.0),
    ] {
        let mut ticks = tape_with_large_trade(100.0, side, last);
        ticks[20].volume = volume;
        let summary = analyzer().analyze_ticks(&ticks).expect("summary").summary;
        assert!(summary.confidence <= 10, "confidence {}", summary.confidence);
        if summary.signal == Signal::Neutral {
            assert_eq!(summary.confidence, 0);
        }
    }
}

#[test]
/// Verifies the metrics sub-window: only trades strictly newer than five
/// minutes before the latest trade count.
fn metrics_use_trailing_time_window() {
    let ticks = vec![
        t(1, "09:00:00", 50.0, 100, Side::Buy),
        t(2, "09:10:00", 100.0, 100, Side::Buy),
        t(3, "09:10:30", 102.0, 100, Side::Sell),
    ];
    let summary = analyzer().analyze_ticks(&ticks).expect("summary").summary;
    assert_eq!(summary.metrics.trade_count, 2);
    assert!((summary.metrics.vwap - 101.0).abs() < 1e-9);
    assert!((summary.metrics.volatility - 1.0).abs() < 1e-9);
    assert!((summary.metrics.trade_density_per_min - 4.0).abs() < 1e-9);
    assert_eq!(summary.metrics.price_open, 100.0);
    assert_eq!(summary.metrics.price_close, 102.0);
    // Bucketing still covers the whole window.
    assert_eq!(summary.total_volume, 300);

    let boundary = vec![
        t(1, "09:00:00", 100.0, 100, Side::Buy),
        t(2, "09:04:00", 100.0, 100, Side::Buy),
        t(3, "09:05:00", 100.0, 100, Side::Buy),
    ];
    let summary = analyzer().analyze_ticks(&boundary).expect("summary").summary;
    assert_eq!(summary.metrics.trade_count, 2);
}

#[test]
/// Verifies sparse data yields no reading rather than a fabricated one.
fn sparse_data_yields_no_summary() {
    assert!(analyzer().analyze_ticks(&Vec::<Tick>::new()).is_none());
    assert!(analyzer()
        .analyze_ticks(&[t(1, "09:00:00", 100.0, 10, Side::Buy)])
        .is_none());

    let lonely_latest = vec![
        t(1, "09:00:00", 100.0, 10, Side::Buy),
        t(2, "09:00:01", 100.0, 10, Side::Buy),
        t(3, "09:30:00", 100.0, 10, Side::Buy),
    ];
    assert!(analyzer().analyze_ticks(&lonely_latest).is_none());
}

#[test]
/// Verifies cleaning: unparseable timestamps and non-positive values are ignored.
fn dirty_ticks_are_ignored() {
    let ticks = vec![
        t(1, "09:00:00", 100.0, 10, Side::Buy),
        t(2, "not a time", 100.0, 10, Side::Sell),
        t(3, "09:00:02", 0.0, 10, Side::Sell),
        t(4, "09:00:03", 100.0, -5, Side::Sell),
        t(5, "2024-01-15 09:00:04", 100.0, 10, Side::Buy),
    ];
    let analysis = analyzer().analyze_ticks(&ticks).expect("summary");
    assert_eq!(analysis.summary.total_volume, 20);
    let ids: Vec<i64> = analysis.detail.iter().map(|c| c.sequence_id).collect();
    assert_eq!(ids, vec![1, 5]);
}

#[test]
/// Verifies the detail history is bounded to the most recent trades.
fn detail_is_bounded_by_window_size() {
    let ticks: Vec<Tick> = (1..=10)
        .map(|i| t(i, &at(i), 100.0, 10, Side::Buy))
        .collect();
    let analysis = TradeAnalyzer::new(3, 300)
        .with_anchor_date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        .analyze_ticks(&ticks)
        .expect("summary");
    let ids: Vec<i64> = analysis.detail.iter().map(|c| c.sequence_id).collect();
    assert_eq!(ids, vec![8, 9, 10]);
    assert_eq!(analysis.summary.total_volume, 100);
    assert!(analysis.detail.iter().all(|c| (c.notional - 1_000.0).abs() < 1e-9));
}

#[test]
fn analyze_reads_from_window() {
    let mut window = AnalysisWindow::new("5721", 100);
    window.extend(tape_with_large_trade(100.0, Side::Sell, 100.0));
    let analysis = analyzer().analyze(&window).expect("summary");
    assert_eq!(analysis.detail.len(), 41);
    assert_eq!(analysis.summary.signal, Signal::StrongBuy);
}

#[test]
/// Verifies extreme volumes saturate the totals instead of overflowing.
fn extreme_volumes_saturate_totals() {
    let ticks = vec![
        t(1, "09:00:00", 10.0, i64::MAX, Side::Buy),
        t(2, "09:00:01", 10.0, i64::MAX, Side::Buy),
        t(3, "09:00:02", 10.0, i64::MAX, Side::Sell),
    ];
    let summary = analyzer().analyze_ticks(&ticks).expect("summary").summary;

    assert_eq!(summary.total_volume, i64::MAX);
    assert!(summary.breakdown.iter().any(|f| f.total() == i64::MAX));
    assert!(summary.buy_ratio > 0.0 && summary.buy_ratio <= 1.0);
    assert!(summary.confidence <= 10);
}
