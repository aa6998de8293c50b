use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::burst::BurstConfig;
use crate::instrument::InstrumentCode;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    pub session: SessionSettings,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub burst: BurstSettings,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/market_data.db"),
            busy_timeout_ms: 10_000,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub instrument: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_retention")]
    pub retention: usize,
    #[serde(default = "default_alert_confidence")]
    pub alert_confidence: u8,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_settle_delay_ms() -> u64 {
    3_000
}

fn default_retention() -> usize {
    10_000
}

fn default_alert_confidence() -> u8 {
    7
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub window_size: usize,
    pub time_window_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            window_size: 5_000,
            time_window_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BurstSettings {
    pub capacity: usize,
    pub multiplier: f64,
    pub min_batch: usize,
    pub buy_skew: f64,
    pub sell_skew: f64,
}

impl Default for BurstSettings {
    fn default() -> Self {
        let d = BurstConfig::default();
        Self {
            capacity: d.capacity,
            multiplier: d.multiplier,
            min_batch: d.min_batch,
            buy_skew: d.buy_skew,
            sell_skew: d.sell_skew,
        }
    }
}

impl BurstSettings {
    pub fn to_burst_config(&self) -> BurstConfig {
        BurstConfig {
            capacity: self.capacity,
            multiplier: self.multiplier,
            min_batch: self.min_batch,
            buy_skew: self.buy_skew,
            sell_skew: self.sell_skew,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub poll_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/ticks.csv"),
            poll_interval_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub refresh_rate_ms: u64,
    pub log_rows: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            refresh_rate_ms: 100,
            log_rows: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load `config/default.toml`, or the file named by `TICKFLOW_CONFIG`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("TICKFLOW_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse config toml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.instrument().context("session.instrument is invalid")?;
        if self.session.poll_interval_ms == 0 {
            bail!("session.poll_interval_ms must be > 0");
        }
        if self.session.retention == 0 {
            bail!("session.retention must be > 0");
        }
        if self.session.alert_confidence > 10 {
            bail!("session.alert_confidence must be within 0..=10");
        }
        if self.analyzer.window_size == 0 {
            bail!("analyzer.window_size must be > 0");
        }
        if self.analyzer.time_window_secs == 0 {
            bail!("analyzer.time_window_secs must be > 0");
        }
        if self.burst.capacity == 0 {
            bail!("burst.capacity must be > 0");
        }
        if !(self.burst.multiplier.is_finite() && self.burst.multiplier > 0.0) {
            bail!("burst.multiplier must be a positive number");
        }
        if !(0.0..=1.0).contains(&self.burst.sell_skew)
            || !(0.0..=1.0).contains(&self.burst.buy_skew)
            || self.burst.sell_skew >= self.burst.buy_skew
        {
            bail!(
                "burst skews must satisfy 0 <= sell_skew ({}) < buy_skew ({}) <= 1",
                self.burst.sell_skew,
                self.burst.buy_skew
            );
        }
        if self.source.poll_interval_ms == 0 {
            bail!("source.poll_interval_ms must be > 0");
        }
        Ok(())
    }

    pub fn instrument(&self) -> Result<InstrumentCode> {
        Ok(InstrumentCode::parse(&self.session.instrument)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.session.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.session.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
[session]
instrument = "7203"
"#,
        )
        .unwrap();
        assert_eq!(config.session.poll_interval_ms, 2_000);
        assert_eq!(config.session.retention, 10_000);
        assert_eq!(config.analyzer.window_size, 5_000);
        assert_eq!(config.analyzer.time_window_secs, 300);
        assert_eq!(config.burst.capacity, 30);
        assert_eq!(config.store.path, PathBuf::from("data/market_data.db"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn invalid_instrument_is_rejected_at_load() {
        let err = Config::from_toml_str(
            r#"
[session]
instrument = "TOYOTA"
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("session.instrument"));
    }

    #[test]
    fn inverted_burst_skews_are_rejected() {
        let res = Config::from_toml_str(
            r#"
[session]
instrument = "7203"

[burst]
buy_skew = 0.3
sell_skew = 0.6
"#,
        );
        assert!(res.is_err());
    }
}
