//! Swappable sentiment analysis
//!
//! Records carry a polarity in `[-1.0, 1.0]` and a coarse label. The
//! extractor only sees the [`SentimentAnalyzer`] trait, so the neutral stub
//! and the lexicon analyzer can be swapped through configuration.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Polarity beyond which a label leaves `Neutral`
pub const LABEL_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > LABEL_THRESHOLD {
            Self::Positive
        } else if polarity < -LABEL_THRESHOLD {
            Self::Negative
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub polarity: f64,
    pub label: SentimentLabel,
}

impl Sentiment {
    pub const NEUTRAL: Self = Self {
        polarity: 0.0,
        label: SentimentLabel::Neutral,
    };

    /// Clamp, round to three decimals and derive the label
    pub fn from_polarity(polarity: f64) -> Self {
        if !polarity.is_finite() {
            return Self::NEUTRAL;
        }
        let polarity = (polarity.clamp(-1.0, 1.0) * 1000.0).round() / 1000.0;
        Self {
            polarity,
            label: SentimentLabel::from_polarity(polarity),
        }
    }
}

pub trait SentimentAnalyzer: Send + Sync {
    fn analyze(&self, hashtag: &str, text: &str) -> Sentiment;
}

/// Constant-neutral analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralSentiment;

impl SentimentAnalyzer for NeutralSentiment {
    fn analyze(&self, _hashtag: &str, _text: &str) -> Sentiment {
        Sentiment::NEUTRAL
    }
}

static LEXICON: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    [
        ("love", 0.5),
        ("happy", 0.8),
        ("best", 1.0),
        ("good", 0.7),
        ("great", 0.8),
        ("amazing", 0.6),
        ("awesome", 1.0),
        ("beautiful", 0.85),
        ("cute", 0.5),
        ("fun", 0.3),
        ("funny", 0.25),
        ("win", 0.8),
        ("perfect", 1.0),
        ("wonderful", 1.0),
        ("excited", 0.4),
        ("bad", -0.7),
        ("sad", -0.5),
        ("worst", -1.0),
        ("hate", -0.8),
        ("angry", -0.5),
        ("ugly", -0.7),
        ("fail", -0.5),
        ("terrible", -1.0),
        ("awful", -1.0),
        ("scary", -0.5),
        ("boring", -1.0),
        ("cry", -0.3),
    ]
    .into_iter()
    .collect()
});

/// Word-lexicon analyzer averaging the polarity of known words
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconSentiment;

impl SentimentAnalyzer for LexiconSentiment {
    fn analyze(&self, hashtag: &str, text: &str) -> Sentiment {
        let combined = format!("{hashtag} {text}").to_lowercase();
        let scores: Vec<f64> = combined
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter_map(|word| LEXICON.get(word).copied())
            .collect();

        if scores.is_empty() {
            return Sentiment::NEUTRAL;
        }
        Sentiment::from_polarity(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

/// Analyzer selection for configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentMode {
    #[default]
    Neutral,
    Lexicon,
}

impl SentimentMode {
    pub fn analyzer(self) -> Box<dyn SentimentAnalyzer> {
        match self {
            Self::Neutral => Box::new(NeutralSentiment),
            Self::Lexicon => Box::new(LexiconSentiment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_stub_is_constant() {
        let analyzer = NeutralSentiment;
        assert_eq!(analyzer.analyze("#test", "test text"), Sentiment::NEUTRAL);
        assert_eq!(analyzer.analyze("#viral", "worst day ever"), Sentiment::NEUTRAL);
    }

    #[test]
    fn test_lexicon_labels() {
        let analyzer = LexiconSentiment;
        let positive = analyzer.analyze("#best", "1 #best 12K Posts");
        assert_eq!(positive.label, SentimentLabel::Positive);
        assert_eq!(positive.polarity, 1.0);

        let negative = analyzer.analyze("#fail", "so sad");
        assert_eq!(negative.label, SentimentLabel::Negative);
        assert_eq!(negative.polarity, -0.5);

        let unknown = analyzer.analyze("#cooking", "2M Posts");
        assert_eq!(unknown, Sentiment::NEUTRAL);
    }

    #[test]
    fn test_label_thresholds_are_exclusive() {
        assert_eq!(SentimentLabel::from_polarity(0.1), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_polarity(0.1001), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_polarity(-0.1), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_polarity(-0.2), SentimentLabel::Negative);
    }

    #[test]
    fn test_polarity_is_rounded_and_clamped() {
        assert_eq!(Sentiment::from_polarity(0.123_456).polarity, 0.123);
        assert_eq!(Sentiment::from_polarity(3.0).polarity, 1.0);
        assert_eq!(Sentiment::from_polarity(f64::NAN), Sentiment::NEUTRAL);
    }

    #[test]
    fn test_mode_selects_analyzer() {
        let analyzer = SentimentMode::Lexicon.analyzer();
        assert_eq!(analyzer.analyze("#love", "").label, SentimentLabel::Positive);
        let analyzer = SentimentMode::default().analyzer();
        assert_eq!(analyzer.analyze("#love", "").label, SentimentLabel::Neutral);
    }
}
