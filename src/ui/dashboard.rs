use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::analyzer::{ClassifiedTick, LotBucket, MetricsSnapshot, Summary};
use crate::event::AlertSeverity;
use crate::input::InstrumentPrompt;
use crate::model::tick::Side;

use super::Flash;

const RATIO_BAR_WIDTH: usize = 30;

/// Compact yen formatting: 億 (1e8) and 万 (1e4) units.
pub fn format_yen(value: f64) -> String {
    if value >= 1e8 {
        format!("{:.1}億円", value / 1e8)
    } else if value >= 1e4 {
        format!("{}万円", group_thousands((value / 1e4).round() as i64))
    } else {
        format!("{}円", group_thousands(value.round() as i64))
    }
}

pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

pub fn bucket_range_label(summary: &Summary, bucket: LotBucket) -> String {
    match summary.thresholds.bounds(bucket) {
        (_, Some(upper)) if bucket == LotBucket::Small => format!("~ {}", format_yen(upper)),
        (lower, Some(upper)) => format!("{} ~ {}", format_yen(lower), format_yen(upper)),
        (lower, None) => format!("{} ~", format_yen(lower)),
    }
}

fn side_color(side: Side) -> Color {
    match side {
        Side::Buy => Color::Green,
        Side::Sell => Color::Red,
    }
}

fn net_color(val: i64) -> Color {
    if val > 0 {
        Color::Green
    } else if val < 0 {
        Color::Red
    } else {
        Color::White
    }
}

fn panel(title: String) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
}

pub struct TradeLogPanel<'a> {
    detail: &'a [ClassifiedTick],
    instrument: &'a str,
    max_rows: usize,
}

impl<'a> TradeLogPanel<'a> {
    pub fn new(detail: &'a [ClassifiedTick], instrument: &'a str, max_rows: usize) -> Self {
        Self {
            detail,
            instrument,
            max_rows,
        }
    }
}

impl Widget for TradeLogPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let visible = (area.height.saturating_sub(3) as usize).min(self.max_rows);
        let mut lines = vec![Line::from(Span::styled(
            format!("{:<9}{:>10}{:>10} {:<5}{:<7}", "time", "price", "volume", "side", "lot"),
            Style::default().fg(Color::DarkGray),
        ))];

        for t in self.detail.iter().rev().take(visible) {
            let mut style = Style::default().fg(side_color(t.side));
            match t.bucket {
                LotBucket::Large => style = style.add_modifier(Modifier::BOLD),
                LotBucket::ExtraLarge => {
                    let fg = match t.side {
                        Side::Buy => Color::LightMagenta,
                        Side::Sell => Color::Yellow,
                    };
                    style = Style::default().fg(fg).add_modifier(Modifier::BOLD);
                }
                _ => {}
            }
            lines.push(Line::from(Span::styled(
                format!(
                    "{:<9}{:>10}{:>10} {:<5}{:<7}",
                    t.timestamp.format("%H:%M:%S").to_string(),
                    format!("{:.1}", t.price),
                    group_thousands(t.volume),
                    t.side.as_str(),
                    t.bucket.label()
                ),
                style,
            )));
        }

        Paragraph::new(lines)
            .block(panel(format!(" Trade Log [{}] ", self.instrument)))
            .render(area, buf);
    }
}

pub struct AnalysisPanel<'a> {
    summary: Option<&'a Summary>,
    highlight: bool,
}

impl<'a> AnalysisPanel<'a> {
    pub fn new(summary: Option<&'a Summary>, highlight: bool) -> Self {
        Self { summary, highlight }
    }
}

impl Widget for AnalysisPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(summary) = self.summary else {
            Paragraph::new(Line::from(Span::styled(
                "waiting for analysis data...",
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )))
            .block(panel(" Signal ".to_string()))
            .render(area, buf);
            return;
        };

        let signal_color = if summary.signal.is_buy() {
            Color::Green
        } else if summary.signal.is_sell() {
            Color::Red
        } else {
            Color::White
        };
        let conf = summary.confidence.min(10) as usize;
        let lines = vec![
            Line::from(vec![
                Span::styled("Signal: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    summary.signal.as_str(),
                    Style::default()
                        .fg(signal_color)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled("   confidence: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{}{}", "★".repeat(conf), "☆".repeat(10 - conf)),
                    Style::default().fg(Color::Yellow),
                ),
            ]),
            Line::from(vec![
                Span::styled("Condition: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    summary.condition.as_str(),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled("   total volume: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    group_thousands(summary.total_volume),
                    Style::default().fg(Color::White),
                ),
            ]),
        ];

        let mut block = panel(" Signal ".to_string());
        if self.highlight {
            block = block.border_style(Style::default().fg(signal_color));
        }
        Paragraph::new(lines).block(block).render(area, buf);
    }
}

pub struct MetricsPanel<'a> {
    metrics: &'a MetricsSnapshot,
}

impl<'a> MetricsPanel<'a> {
    pub fn new(metrics: &'a MetricsSnapshot) -> Self {
        Self { metrics }
    }
}

impl Widget for MetricsPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let m = self.metrics;
        let row = |label: &'static str, value: String, color: Color| {
            Line::from(vec![
                Span::styled(format!("{:<12}", label), Style::default().fg(Color::DarkGray)),
                Span::styled(value, Style::default().fg(color)),
            ])
        };
        let lines = vec![
            row("VWAP", format!("{:.2}", m.vwap), Color::Yellow),
            row("Volatility", format!("{:.2}", m.volatility), Color::Cyan),
            row(
                "Trades/min",
                format!("{:.1}", m.trade_density_per_min),
                Color::Magenta,
            ),
            row(
                "Avg volume",
                group_thousands(m.avg_volume_per_trade.round() as i64),
                Color::Green,
            ),
            row(
                "Open/Close",
                format!("{:.1} / {:.1}", m.price_open, m.price_close),
                Color::White,
            ),
        ];
        Paragraph::new(lines)
            .block(panel(" Metrics ".to_string()))
            .render(area, buf);
    }
}

pub struct BreakdownPanel<'a> {
    summary: &'a Summary,
}

impl<'a> BreakdownPanel<'a> {
    pub fn new(summary: &'a Summary) -> Self {
        Self { summary }
    }
}

impl Widget for BreakdownPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let ratio = self.summary.buy_ratio.clamp(0.0, 1.0);
        let buy_width = (ratio * RATIO_BAR_WIDTH as f64) as usize;
        let sell_width = RATIO_BAR_WIDTH - buy_width;

        let mut lines = vec![
            Line::from(vec![
                Span::styled(
                    format!("buy {:>5.1}% ", ratio * 100.0),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                ),
                Span::styled("█".repeat(buy_width), Style::default().fg(Color::Green)),
                Span::styled("█".repeat(sell_width), Style::default().fg(Color::Red)),
                Span::styled(
                    format!(" {:>5.1}% sell", (1.0 - ratio) * 100.0),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                format!(
                    "{:<8}{:<26}{:>12}{:>12}{:>12}",
                    "lot", "notional range", "buy", "sell", "net"
                ),
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            )),
        ];

        for flow in &self.summary.breakdown {
            let net = flow.net();
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{:<8}", flow.bucket.label()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:<26}", bucket_range_label(self.summary, flow.bucket)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:>12}", group_thousands(flow.buy_volume)),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!("{:>12}", group_thousands(flow.sell_volume)),
                    Style::default().fg(Color::Red),
                ),
                Span::styled(
                    format!(
                        "{:>12}",
                        format!("{}{}", if net > 0 { "+" } else { "" }, group_thousands(net))
                    ),
                    Style::default()
                        .fg(net_color(net))
                        .add_modifier(Modifier::BOLD),
                ),
            ]));
        }

        Paragraph::new(lines)
            .block(panel(" Order Flow ".to_string()))
            .render(area, buf);
    }
}

pub struct StatusBar<'a> {
    pub instrument: &'a str,
    pub paused: bool,
    pub status: &'a str,
    pub flash: Option<&'a Flash>,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let pause_status = if self.paused {
            Span::styled(
                " PAUSED ",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(" RUNNING ", Style::default().fg(Color::Green))
        };

        let message = match self.flash {
            Some(flash) => {
                let color = match flash.severity {
                    AlertSeverity::Info => Color::Yellow,
                    AlertSeverity::Burst => Color::LightMagenta,
                    AlertSeverity::Signal => Color::Cyan,
                    AlertSeverity::Error => Color::Red,
                };
                Span::styled(
                    flash.message.as_str(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )
            }
            None => Span::styled(self.status, Style::default().fg(Color::DarkGray)),
        };

        let line = Line::from(vec![
            Span::styled(
                " tickflow ",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("| ", Style::default().fg(Color::DarkGray)),
            Span::styled(self.instrument, Style::default().fg(Color::Cyan)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            pause_status,
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            message,
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}

pub struct KeybindBar;

impl Widget for KeybindBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = Line::from(vec![
            Span::styled(" [Q]", Style::default().fg(Color::Yellow)),
            Span::styled("uit  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[P]", Style::default().fg(Color::Yellow)),
            Span::styled("ause/resume  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[C]", Style::default().fg(Color::Yellow)),
            Span::styled("hange instrument  ", Style::default().fg(Color::DarkGray)),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}

pub struct PromptPopup<'a> {
    prompt: &'a InstrumentPrompt,
}

impl<'a> PromptPopup<'a> {
    pub fn new(prompt: &'a InstrumentPrompt) -> Self {
        Self { prompt }
    }
}

impl Widget for PromptPopup<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut lines = vec![
            Line::from(Span::styled(
                "New instrument code (e.g. 3350, 5721.JNX)",
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(vec![
                Span::styled("> ", Style::default().fg(Color::Yellow)),
                Span::styled(
                    self.prompt.buffer(),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
        ];
        if let Some(err) = self.prompt.error() {
            lines.push(Line::from(Span::styled(
                err,
                Style::default().fg(Color::Red),
            )));
        }
        lines.push(Line::from(Span::styled(
            "[Enter] apply  [Esc] cancel",
            Style::default().fg(Color::DarkGray),
        )));

        let border = if self.prompt.error().is_some() {
            Color::Red
        } else {
            Color::Cyan
        };
        Paragraph::new(lines)
            .block(
                Block::default()
                    .title(" Change Instrument ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border)),
            )
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_yen_uses_man_and_oku_units() {
        assert_eq!(format_yen(9_999.0), "9,999円");
        assert_eq!(format_yen(1_250_000.0), "125万円");
        assert_eq!(format_yen(350_000_000.0), "3.5億円");
    }

    #[test]
    fn group_thousands_handles_sign() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(-12_000), "-12,000");
    }
}
