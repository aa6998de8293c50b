use tracing::debug;

use crate::model::tick::{normalize_timestamp, NewTick, RawRow, Side};

/// Assign a side to every well-formed row of a raw batch.
///
/// Explicit side codes are kept as-is. Rows without a usable code are filled by the
/// tick rule: an uptick is a buy, a downtick a sell, and a zero tick carries the last
/// determined side forward. A leading run with nothing to carry defaults to buy.
/// Rows with a non-numeric or non-positive price or volume are dropped before the
/// rule runs, so they never act as a price reference.
pub fn infer_sides(rows: &[RawRow]) -> Vec<NewTick> {
    let mut out = Vec::with_capacity(rows.len());
    let mut prev_price: Option<f64> = None;
    let mut carried: Option<Side> = None;

    for row in rows {
        let Some((price, volume)) = coerce(row) else {
            debug!(
                timestamp = %row.timestamp,
                price = %row.price,
                volume = %row.volume,
                "Dropping malformed raw row"
            );
            continue;
        };

        let tick_side = match prev_price {
            Some(prev) if price > prev => Some(Side::Buy),
            Some(prev) if price < prev => Some(Side::Sell),
            _ => carried,
        };
        if let Some(side) = tick_side {
            carried = Some(side);
        }
        prev_price = Some(price);

        let explicit = row.side_code.as_deref().and_then(Side::from_raw_code);
        let side = explicit.or(tick_side).unwrap_or(Side::Buy);

        out.push(NewTick {
            timestamp: normalize_timestamp(&row.timestamp),
            price,
            volume,
            side,
        });
    }
    out
}

fn coerce(row: &RawRow) -> Option<(f64, i64)> {
    let price: f64 = row.price.trim().replace(',', "").parse().ok()?;
    let volume = parse_volume(&row.volume)?;
    if !price.is_finite() || price <= 0.0 || volume <= 0 {
        return None;
    }
    Some((price, volume))
}

fn parse_volume(raw: &str) -> Option<i64> {
    let raw = raw.trim().replace(',', "");
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    // Spreadsheet exports often render integer counts as "100.0".
    let v: f64 = raw.parse().ok()?;
    if v.is_finite() && v.fract() == 0.0 {
        Some(v as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(price: &str, side: Option<&str>) -> RawRow {
        RawRow::new("09:00:00", price, "100", side)
    }

    fn sides(rows: &[RawRow]) -> Vec<Side> {
        infer_sides(rows).into_iter().map(|t| t.side).collect()
    }

    #[test]
    fn tick_rule_with_zero_ticks_carries_forward() {
        let rows: Vec<RawRow> = ["100", "100", "101", "101", "99"]
            .iter()
            .map(|p| row(p, None))
            .collect();
        assert_eq!(
            sides(&rows),
            vec![Side::Buy, Side::Buy, Side::Buy, Side::Buy, Side::Sell]
        );
    }

    #[test]
    fn explicit_codes_are_never_overwritten() {
        let rows = vec![
            row("100", Some("1")),
            row("101", None),
            row("102", Some("01")),
            row("102", None),
            row("101", Some("2")),
        ];
        assert_eq!(
            sides(&rows),
            vec![Side::Sell, Side::Buy, Side::Sell, Side::Buy, Side::Buy]
        );
    }

    #[test]
    fn leading_zero_ticks_default_to_buy_until_a_move() {
        let rows: Vec<RawRow> = ["50", "50", "49", "49"].iter().map(|p| row(p, None)).collect();
        assert_eq!(
            sides(&rows),
            vec![Side::Buy, Side::Buy, Side::Sell, Side::Sell]
        );
    }

    #[test]
    fn malformed_rows_are_dropped_not_fatal() {
        let rows = vec![
            RawRow::new("09:00:00", "100", "10", None),
            RawRow::new("09:00:01", "abc", "10", None),
            RawRow::new("09:00:02", "101", "0", None),
            RawRow::new("09:00:03", "101", "-5", None),
            RawRow::new("09:00:04", "99", "1,000", None),
        ];
        let ticks = infer_sides(&rows);
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[1].volume, 1000);
        assert_eq!(ticks[1].side, Side::Sell);
        assert_eq!(ticks[1].timestamp, "09:00:04");
    }
}
