//! Coarse market sentiment of a bar, used in alert bodies.
//!
//! Derived from recent price extremes, the slope of the 50-bar SMA and the
//! quarter-grid position of the close.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::SignalFrame;
use crate::indicators::Quartile;

/// Window for peak formations and the level SMA.
pub const SENTIMENT_WINDOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeakFormation {
    /// Close equals the highest high of the window.
    High,
    /// Close equals the lowest low of the window.
    Low,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Accumulation,
    Distribution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentiment {
    pub peak: PeakFormation,
    pub level: Level,
    pub quarter: Option<Quartile>,
    pub bias: Bias,
}

impl PeakFormation {
    pub fn label(&self) -> &'static str {
        match self {
            PeakFormation::High => "Peak Formation High (PFH)",
            PeakFormation::Low => "Peak Formation Low (PFL)",
            PeakFormation::None => "No new PF",
        }
    }
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Level::Accumulation => "Level 2 (Accumulation)",
            Level::Distribution => "Level 3 (Distribution)",
        }
    }
}

impl Bias {
    pub fn label(&self) -> &'static str {
        match self {
            Bias::Bullish => "Bullish bias → expect upward push",
            Bias::Bearish => "Bearish bias → expect downward push",
            Bias::Neutral => "Neutral bias",
        }
    }
}

impl Sentiment {
    pub fn quarter_label(&self) -> String {
        let quarter = self.quarter.map_or("Unknown", |q| q.as_str());
        format!("Currently in {quarter}")
    }

    /// `(key, label)` pairs in display order.
    pub fn entries(&self) -> [(&'static str, String); 4] {
        [
            ("PF", self.peak.label().to_string()),
            ("Level", self.level.label().to_string()),
            ("Quarter", self.quarter_label()),
            ("Bias", self.bias.label().to_string()),
        ]
    }
}

impl fmt::Display for Sentiment {
    /// Bullet list, one line per entry.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, label) in self.entries() {
            writeln!(f, "- {key}: {label}")?;
        }
        Ok(())
    }
}

/// Sentiment of the latest bar, `None` on an empty frame.
pub fn market_sentiment(frame: &SignalFrame) -> Option<Sentiment> {
    frame.len().checked_sub(1).and_then(|i| sentiment_at(frame, i))
}

/// Sentiment of bar `i`, from bars `..=i` only. `None` past the last bar.
pub fn sentiment_at(frame: &SignalFrame, i: usize) -> Option<Sentiment> {
    if i >= frame.len() {
        return None;
    }
    let peak = peak_formation(frame, i);
    let level = match sma_slope(frame, i) {
        Some(slope) if slope > 0.0 => Level::Accumulation,
        _ => Level::Distribution,
    };
    let bias = match peak {
        PeakFormation::Low => Bias::Bullish,
        PeakFormation::High => Bias::Bearish,
        PeakFormation::None => Bias::Neutral,
    };
    Some(Sentiment {
        peak,
        level,
        quarter: frame.helpers.qg_label.get(i).copied().flatten(),
        bias,
    })
}

fn peak_formation(frame: &SignalFrame, i: usize) -> PeakFormation {
    if i + 1 < SENTIMENT_WINDOW {
        return PeakFormation::None;
    }
    let window = &frame.bars[i + 1 - SENTIMENT_WINDOW..=i];
    let close = frame.bars[i].close;
    let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    if close == highest {
        PeakFormation::High
    } else if close == lowest {
        PeakFormation::Low
    } else {
        PeakFormation::None
    }
}

/// First difference of the window SMA of closes at bar `i`.
fn sma_slope(frame: &SignalFrame, i: usize) -> Option<f64> {
    if i < SENTIMENT_WINDOW {
        return None;
    }
    let mean = |end: usize| {
        frame.bars[end + 1 - SENTIMENT_WINDOW..=end]
            .iter()
            .map(|b| b.close)
            .sum::<f64>()
            / SENTIMENT_WINDOW as f64
    };
    let slope = mean(i) - mean(i - 1);
    slope.is_finite().then_some(slope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use crate::engine::{add_features, FeatureConfig};
    use crate::indicators::make_bars;
    use crate::spec::{StrategySpec, GENERATOR_SAMPLE};

    fn frame_of(bars: Vec<Bar>) -> SignalFrame {
        let strategy = StrategySpec::from_json(GENERATOR_SAMPLE)
            .and_then(|s| s.compile())
            .unwrap();
        add_features(bars, &strategy, &FeatureConfig::default())
    }

    #[test]
    fn empty_frame_has_no_sentiment() {
        assert_eq!(market_sentiment(&SignalFrame::default()), None);
    }

    #[test]
    fn index_past_the_end_has_no_sentiment() {
        let frame = frame_of(make_bars(&[1.1010; 10]));
        assert!(sentiment_at(&frame, 9).is_some());
        assert_eq!(sentiment_at(&frame, 10), None);
        assert_eq!(sentiment_at(&SignalFrame::default(), 0), None);
    }

    #[test]
    fn short_history_is_neutral_distribution() {
        let s = market_sentiment(&frame_of(make_bars(&[1.1010; 10]))).unwrap();
        assert_eq!(s.peak, PeakFormation::None);
        assert_eq!(s.level, Level::Distribution);
        assert_eq!(s.bias, Bias::Neutral);
        assert_eq!(s.quarter, Some(Quartile::Q1));
    }

    #[test]
    fn close_at_window_high_is_pfh() {
        let closes: Vec<f64> = (0..60).map(|i| 1.1000 + 0.0002 * i as f64).collect();
        let mut bars = make_bars(&closes);
        // Last bar closes on its own high, above every earlier high
        let last = bars.len() - 1;
        bars[last].close = 1.1200;
        bars[last].high = 1.1200;
        let s = market_sentiment(&frame_of(bars)).unwrap();
        assert_eq!(s.peak, PeakFormation::High);
        assert_eq!(s.bias, Bias::Bearish);
        assert_eq!(s.level, Level::Accumulation);
    }

    #[test]
    fn close_at_window_low_is_pfl() {
        let closes: Vec<f64> = (0..60).map(|i| 1.2000 - 0.0002 * i as f64).collect();
        let mut bars = make_bars(&closes);
        let last = bars.len() - 1;
        bars[last].close = 1.1000;
        bars[last].low = 1.1000;
        let s = market_sentiment(&frame_of(bars)).unwrap();
        assert_eq!(s.peak, PeakFormation::Low);
        assert_eq!(s.bias, Bias::Bullish);
        assert_eq!(s.level, Level::Distribution);
    }

    #[test]
    fn renders_bullet_list() {
        let s = Sentiment {
            peak: PeakFormation::None,
            level: Level::Accumulation,
            quarter: Some(Quartile::Q3),
            bias: Bias::Neutral,
        };
        assert_eq!(
            s.to_string(),
            "- PF: No new PF\n- Level: Level 2 (Accumulation)\n- Quarter: Currently in Q3\n- Bias: Neutral bias\n"
        );
    }
}
