//! Rules-based intent classifier.
//!
//! Categories are checked in a fixed order and the first match wins:
//!
//! | Order | Intent      | Confidence                |
//! |-------|-------------|---------------------------|
//! | 1     | `joke`      | 0.9                       |
//! | 2     | `timer`     | 0.85 with duration, else 0.6 |
//! | 3     | `time`      | 0.8                       |
//! | 4     | `weather`   | 0.8                       |
//! | 5     | `music`     | 0.7                       |
//! | 6     | `smalltalk` | 0.5                       |
//! | -     | `unknown`   | 0.1                       |
//!
//! A phrase that matches both the timer and the time pattern is a timer
//! request, because timer is checked first.

use crate::classifier::{Classification, Classifier};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

/// Label returned when no rule matches.
pub const UNKNOWN_INTENT: &str = "unknown";

const TIMER_INTENT: &str = "timer";
const TIMER_WITH_DURATION_CONFIDENCE: f64 = 0.85;
const UNKNOWN_CONFIDENCE: f64 = 0.1;

static JOKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(joke|funny|make me laugh)\b").expect("joke pattern"));
static TIMER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(set|start).*\b(timer|alarm)\b",
        r"|\b(timer|alarm).*\bfor\b",
        r"|\bin\s+[0-9]+\s*(s|sec|second|min|m|h)\b",
    ))
    .expect("timer pattern")
});
static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(time|what(?:'s| is) the time|time in)\b").expect("time pattern")
});
static WEATHER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(weather|temperature|forecast)\b").expect("weather pattern"));
static MUSIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(play|music|song|songs|playlist)\b").expect("music pattern"));
static SMALLTALK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(hi|hello|hey|thanks|bye)\b").expect("smalltalk pattern"));
static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]+)\s*(h|hr|hour|m|min|minute|s|sec|second)s?\b").expect("duration pattern")
});

struct Rule {
    intent: &'static str,
    pattern: &'static Lazy<Regex>,
    confidence: f64,
}

static RULES: [Rule; 6] = [
    Rule {
        intent: "joke",
        pattern: &JOKE,
        confidence: 0.9,
    },
    Rule {
        intent: TIMER_INTENT,
        pattern: &TIMER,
        confidence: 0.6,
    },
    Rule {
        intent: "time",
        pattern: &TIME,
        confidence: 0.8,
    },
    Rule {
        intent: "weather",
        pattern: &WEATHER,
        confidence: 0.8,
    },
    Rule {
        intent: "music",
        pattern: &MUSIC,
        confidence: 0.7,
    },
    Rule {
        intent: "smalltalk",
        pattern: &SMALLTALK,
        confidence: 0.5,
    },
];

/// Sum every `<number><unit>` token in `text`, in seconds.
///
/// Only ASCII digits count as numbers. Returns `None` when nothing parses or
/// the total is zero.
pub fn duration_seconds(text: &str) -> Option<u64> {
    let lowered = text.to_lowercase();
    let total = DURATION
        .captures_iter(&lowered)
        .filter_map(|caps| {
            let amount: u64 = caps[1].parse().ok()?;
            let unit = &caps[2];
            let scale = if unit.starts_with('h') {
                3600
            } else if unit.starts_with('m') {
                60
            } else {
                1
            };
            Some(amount.saturating_mul(scale))
        })
        .fold(0_u64, u64::saturating_add);

    (total > 0).then_some(total)
}

/// Default classifier: ordered regex rules, first match wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesClassifier;

impl RulesClassifier {
    /// Create the classifier.
    pub fn new() -> Self {
        Self
    }

    /// Classify synchronously.
    pub fn classify_text(&self, text: &str) -> Classification {
        let text = text.trim();

        let Some(rule) = RULES.iter().find(|rule| rule.pattern.is_match(text)) else {
            return Classification::new(UNKNOWN_INTENT, UNKNOWN_CONFIDENCE, text);
        };

        let mut result = Classification::new(rule.intent, rule.confidence, text);
        if rule.intent == TIMER_INTENT {
            if let Some(seconds) = duration_seconds(text) {
                result
                    .entities
                    .insert("duration".to_string(), json!({ "seconds": seconds }));
                result.confidence = TIMER_WITH_DURATION_CONFIDENCE;
            }
        }
        result
    }
}

#[async_trait]
impl Classifier for RulesClassifier {
    async fn classify(&self, text: &str) -> Classification {
        self.classify_text(text)
    }
}
