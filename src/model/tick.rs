use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const TIME_FORMAT: &str = "%H:%M:%S";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Map a raw side code from the tick source. Unknown codes count as missing.
    pub fn from_raw_code(code: &str) -> Option<Self> {
        let code = code.trim();
        match code {
            "2" | "02" => Some(Side::Buy),
            "1" | "01" => Some(Side::Sell),
            _ if code.eq_ignore_ascii_case("BUY") => Some(Side::Buy),
            _ if code.eq_ignore_ascii_case("SELL") => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row as yielded by a tick source, before any coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub timestamp: String,
    pub price: String,
    pub volume: String,
    pub side_code: Option<String>,
}

impl RawRow {
    pub fn new(timestamp: &str, price: &str, volume: &str, side_code: Option<&str>) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            price: price.to_string(),
            volume: volume.to_string(),
            side_code: side_code.map(str::to_string),
        }
    }
}

/// A sided trade ready to be appended to the store. The store assigns the sequence id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTick {
    pub timestamp: String,
    pub price: f64,
    pub volume: i64,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub sequence_id: i64,
    pub instrument_code: String,
    pub timestamp: String,
    pub price: f64,
    pub volume: i64,
    pub side: Side,
}

impl Tick {
    pub fn notional(&self) -> f64 {
        self.price * self.volume as f64
    }
}

/// Normalize raw timestamp text to `HH:MM:SS` or `YYYY-MM-DD HH:MM:SS`.
/// Text that parses as neither is kept verbatim (trimmed).
pub fn normalize_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(time) = parse_time_of_day(raw) {
        return time.format(TIME_FORMAT).to_string();
    }
    if let Some(dt) = parse_datetime(raw) {
        return dt.format(DATETIME_FORMAT).to_string();
    }
    raw.to_string()
}

/// Coerce stored timestamp text. Time-of-day values are anchored to `anchor`.
pub fn parse_timestamp(text: &str, anchor: NaiveDate) -> Option<NaiveDateTime> {
    let text = text.trim();
    parse_time_of_day(text)
        .map(|t| anchor.and_time(t))
        .or_else(|| parse_datetime(text))
}

fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .ok()
        .map(truncate_subsecond)
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y/%m/%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date().and_time(truncate_subsecond(dt.time())))
}

fn truncate_subsecond(t: NaiveTime) -> NaiveTime {
    t.with_nanosecond(0).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_side_codes_map_to_sides() {
        assert_eq!(Side::from_raw_code("2"), Some(Side::Buy));
        assert_eq!(Side::from_raw_code("02"), Some(Side::Buy));
        assert_eq!(Side::from_raw_code(" 1 "), Some(Side::Sell));
        assert_eq!(Side::from_raw_code("01"), Some(Side::Sell));
        assert_eq!(Side::from_raw_code("sell"), Some(Side::Sell));
        assert_eq!(Side::from_raw_code("3"), None);
        assert_eq!(Side::from_raw_code(""), None);
    }

    #[test]
    fn normalize_timestamp_keeps_second_resolution() {
        assert_eq!(normalize_timestamp(" 09:00:01 "), "09:00:01");
        assert_eq!(normalize_timestamp("09:00:01.250"), "09:00:01");
        assert_eq!(
            normalize_timestamp("2024-03-01T09:00:01"),
            "2024-03-01 09:00:01"
        );
        assert_eq!(normalize_timestamp(" garbage "), "garbage");
    }

    #[test]
    fn parse_timestamp_anchors_time_of_day() {
        let anchor = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let dt = parse_timestamp("09:30:00", anchor).unwrap();
        assert_eq!(dt.to_string(), "2024-03-01 09:30:00");
        let full = parse_timestamp("2023-12-29 15:00:00", anchor).unwrap();
        assert_eq!(full.to_string(), "2023-12-29 15:00:00");
        assert!(parse_timestamp("n/a", anchor).is_none());
    }
}
