use tickflow::burst::{buy_fraction, BurstConfig, BurstDetector, BurstKind};
use tickflow::model::tick::{Side, Tick};

fn warmed(sizes: &[usize]) -> BurstDetector {
    let mut detector = BurstDetector::new(BurstConfig::default());
    for &size in sizes {
        assert!(detector.observe(size, 0.5).is_none());
    }
    detector
}

#[test]
/// Verifies a batch ten times the recent average with 90% buys raises exactly
/// one buy-burst alert for that batch.
fn large_buy_skewed_batch_is_a_buy_burst() {
    let mut detector = warmed(&[4, 4, 4, 4]);

    let alert = detector.observe(40, 0.9).expect("burst alert");
    assert_eq!(alert.kind, BurstKind::Buy);
    assert_eq!(alert.batch_size, 40);
    assert!((alert.baseline_mean - 4.0).abs() < 1e-9);
    assert!(alert.to_string().contains("buy burst"));

    // The next ordinary batch is compared against a baseline that now includes the burst.
    assert!(detector.observe(4, 0.9).is_none());
}

#[test]
fn large_sell_skewed_batch_is_a_sell_burst() {
    let mut detector = warmed(&[3, 3, 3]);
    let alert = detector.observe(30, 0.1).expect("burst alert");
    assert_eq!(alert.kind, BurstKind::Sell);
    assert!(alert.to_string().contains("sell burst"));
}

#[test]
/// Verifies that size alone is not enough: a balanced batch raises nothing.
fn balanced_batch_is_not_a_burst() {
    let mut detector = warmed(&[3, 3, 3]);
    assert!(detector.observe(30, 0.5).is_none());
    assert!(detector.observe(300, 0.8).is_none());
    assert!(detector.observe(3000, 0.2).is_none());
}

#[test]
/// Verifies the absolute floor: a quiet tape cannot turn a handful of trades
/// into a burst.
fn batch_must_exceed_absolute_floor() {
    assert!(warmed(&[1, 1, 1]).observe(5, 1.0).is_none());
    assert!(warmed(&[1, 1, 1]).observe(6, 1.0).is_some());
}

#[test]
/// Verifies the baseline is always updated, alert or not, and capped at capacity.
fn baseline_window_always_updates() {
    let mut detector = BurstDetector::new(BurstConfig {
        capacity: 3,
        ..BurstConfig::default()
    });
    assert!(detector.observe(2, 1.0).is_none());
    assert_eq!(detector.samples(), 1);

    assert!(detector.observe(50, 1.0).is_some());
    assert_eq!(detector.samples(), 2);

    detector.observe(2, 0.5);
    detector.observe(2, 0.5);
    assert_eq!(detector.samples(), 3);
    assert_eq!(detector.baseline_mean(), Some(18.0));

    detector.reset();
    assert_eq!(detector.samples(), 0);
    assert_eq!(detector.baseline_mean(), None);
}

#[test]
fn first_batch_has_no_baseline() {
    let mut detector = BurstDetector::new(BurstConfig::default());
    assert!(detector.observe(1_000, 1.0).is_none());
}

#[test]
fn buy_fraction_counts_trades() {
    let tick = |side| Tick {
        sequence_id: 1,
        instrument_code: "5721".to_string(),
        timestamp: "09:00:00".to_string(),
        price: 100.0,
        volume: 100,
        side,
    };
    let batch = vec![tick(Side::Buy), tick(Side::Buy), tick(Side::Buy), tick(Side::Sell)];
    assert!((buy_fraction(&batch) - 0.75).abs() < 1e-9);
    assert_eq!(buy_fraction(&[]), 0.0);
}
