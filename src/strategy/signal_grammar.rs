//! AI Response Grammar
//!
//! Line-oriented grammar for completion responses. The prompt asks for:
//!
//! ```text
//! ACTION: BUY | SELL | HOLD
//! CONFIDENCE: 0-100
//! DIRECTION: BULLISH | BEARISH | NEUTRAL
//! TIMEFRAME: SHORT | MEDIUM | LONG
//! REASONING: one paragraph
//! INDICATORS:
//! - <name>: <value and comment>
//! SOCIAL_SENTIMENT: 0-100
//! NEWS_SENTIMENT: 0-100
//! ```
//!
//! Headers tolerate markdown decoration (`**Action:**`, `- Confidence: 80%`).
//! `ACTION` is mandatory: without it the response is an extraction failure,
//! which the signal generator treats like a provider failure. Every other
//! field falls back to its neutral default.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::signal::{clamp_score, Direction, SignalAction, TechnicalIndicator, Timeframe};

/// Fields recovered from a completion
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSignal {
    pub action: SignalAction,
    pub confidence: f64,
    pub direction: Direction,
    pub timeframe: Timeframe,
    pub reasoning: String,
    pub indicators: Vec<TechnicalIndicator>,
    pub social_sentiment: f64,
    pub news_sentiment: f64,
}

/// Result of running the grammar over a response
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Parsed(ParsedSignal),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Action,
    Confidence,
    Direction,
    Timeframe,
    Reasoning,
    Indicators,
    SocialSentiment,
    NewsSentiment,
}

impl Section {
    fn from_key(key: &str) -> Option<Self> {
        let normalized = key.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "ACTION" | "RECOMMENDATION" | "SIGNAL" => Some(Section::Action),
            "CONFIDENCE" | "CONFIDENCE_LEVEL" => Some(Section::Confidence),
            "DIRECTION" | "TREND" => Some(Section::Direction),
            "TIMEFRAME" | "TIME_FRAME" | "TIME_HORIZON" => Some(Section::Timeframe),
            "REASONING" | "ANALYSIS" | "RATIONALE" => Some(Section::Reasoning),
            "INDICATORS" | "TECHNICAL_INDICATORS" => Some(Section::Indicators),
            "SOCIAL_SENTIMENT" | "SOCIAL" => Some(Section::SocialSentiment),
            "NEWS_SENTIMENT" | "NEWS" => Some(Section::NewsSentiment),
            _ => None,
        }
    }
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*#>•]+\s*)?\**\s*([A-Za-z][A-Za-z _-]{0,30}?)\s*\**\s*:\s*\**\s*(.*?)\s*$")
            .expect("static header regex")
    })
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+?)\s*$").expect("static bullet regex"))
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(buy|sell|hold)\b").expect("static action regex"))
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("static number regex"))
}

/// Longest prefix of a value searched for an action keyword
const ACTION_WINDOW: usize = 40;

fn parse_action(value: &str) -> Option<SignalAction> {
    let window: String = value.chars().take(ACTION_WINDOW).collect();
    action_re()
        .captures(&window)
        .map(|c| match c[1].to_lowercase().as_str() {
            "buy" => SignalAction::Buy,
            "sell" => SignalAction::Sell,
            _ => SignalAction::Hold,
        })
}

fn parse_score(value: &str) -> Option<f64> {
    number_re()
        .find(value)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(clamp_score)
}

fn parse_direction(value: &str) -> Option<Direction> {
    let lower = value.to_lowercase();
    if lower.contains("bullish") {
        Some(Direction::Bullish)
    } else if lower.contains("bearish") {
        Some(Direction::Bearish)
    } else if lower.contains("neutral") {
        Some(Direction::Neutral)
    } else {
        None
    }
}

fn parse_timeframe(value: &str) -> Option<Timeframe> {
    let lower = value.to_lowercase();
    if lower.contains("short") {
        Some(Timeframe::Short)
    } else if lower.contains("medium") || lower.contains("mid") {
        Some(Timeframe::Medium)
    } else if lower.contains("long") {
        Some(Timeframe::Long)
    } else {
        None
    }
}

fn parse_indicator(item: &str) -> (String, String, Direction) {
    let signal = Direction::from_keywords(item);
    match item.split_once(':') {
        Some((name, value)) => (
            name.trim().trim_matches('*').trim().to_string(),
            value.trim().to_string(),
            signal,
        ),
        None => (item.trim().to_string(), String::new(), signal),
    }
}

/// Run the grammar over a completion response
pub fn extract_signal(response: &str) -> Extraction {
    if response.trim().is_empty() {
        return Extraction::Failed("empty response".to_string());
    }

    let mut section = Section::None;
    let mut action = None;
    let mut confidence = None;
    let mut direction = None;
    let mut timeframe = None;
    let mut reasoning: Vec<String> = Vec::new();
    let mut reasoning_done = false;
    let mut raw_indicators: Vec<(String, String, Direction)> = Vec::new();
    let mut social = None;
    let mut news = None;

    for line in response.lines() {
        if line.trim().is_empty() {
            if section == Section::Reasoning && !reasoning.is_empty() {
                reasoning_done = true;
            }
            continue;
        }

        if section == Section::Indicators {
            if let Some(item) = bullet_re().captures(line) {
                raw_indicators.push(parse_indicator(&item[1]));
                continue;
            }
        }

        let header = header_re()
            .captures(line)
            .and_then(|c| Section::from_key(&c[1]).map(|s| (s, c[2].to_string())));

        if let Some((next, value)) = header {
            if section == Section::Reasoning && !reasoning.is_empty() {
                reasoning_done = true;
            }
            section = next;
            match next {
                Section::Action => {
                    if action.is_none() {
                        action = parse_action(&value);
                    }
                }
                Section::Confidence => confidence = confidence.or_else(|| parse_score(&value)),
                Section::Direction => direction = direction.or_else(|| parse_direction(&value)),
                Section::Timeframe => timeframe = timeframe.or_else(|| parse_timeframe(&value)),
                Section::Reasoning => {
                    if !reasoning_done && !value.is_empty() {
                        reasoning.push(value);
                    }
                }
                Section::SocialSentiment => social = social.or_else(|| parse_score(&value)),
                Section::NewsSentiment => news = news.or_else(|| parse_score(&value)),
                Section::Indicators | Section::None => {}
            }
            continue;
        }

        if section == Section::Reasoning && !reasoning_done {
            reasoning.push(line.trim().to_string());
        }
    }

    let Some(action) = action else {
        return Extraction::Failed("no ACTION field with buy/sell/hold".to_string());
    };

    let timeframe = timeframe.unwrap_or(Timeframe::Medium);
    let indicators = raw_indicators
        .into_iter()
        .map(|(name, value, signal)| TechnicalIndicator {
            name,
            value,
            signal,
            timeframe,
        })
        .collect();

    let reasoning = if reasoning.is_empty() {
        "No reasoning provided".to_string()
    } else {
        reasoning.join(" ")
    };

    Extraction::Parsed(ParsedSignal {
        action,
        confidence: confidence.unwrap_or(50.0),
        direction: direction.unwrap_or(Direction::Neutral),
        timeframe,
        reasoning,
        indicators,
        social_sentiment: social.unwrap_or(50.0),
        news_sentiment: news.unwrap_or(50.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
ACTION: SELL
CONFIDENCE: 82
DIRECTION: BEARISH
TIMEFRAME: SHORT
REASONING: RSI is deep in overbought territory while volume fades.
The short average is rolling over.

INDICATORS:
- RSI (14): 78.4, overbought, sell pressure
- SMA 7/25: bullish cross still intact
- Volume: flat
SOCIAL_SENTIMENT: 64
NEWS_SENTIMENT: 41
";

    fn parsed(text: &str) -> ParsedSignal {
        match extract_signal(text) {
            Extraction::Parsed(p) => p,
            Extraction::Failed(reason) => panic!("extraction failed: {}", reason),
        }
    }

    #[test]
    fn test_well_formed_response() {
        let p = parsed(WELL_FORMED);
        assert_eq!(p.action, SignalAction::Sell);
        assert_eq!(p.confidence, 82.0);
        assert_eq!(p.direction, Direction::Bearish);
        assert_eq!(p.timeframe, Timeframe::Short);
        assert_eq!(
            p.reasoning,
            "RSI is deep in overbought territory while volume fades. The short average is rolling over."
        );
        assert_eq!(p.social_sentiment, 64.0);
        assert_eq!(p.news_sentiment, 41.0);

        assert_eq!(p.indicators.len(), 3);
        assert_eq!(p.indicators[0].name, "RSI (14)");
        assert_eq!(p.indicators[0].signal, Direction::Bearish);
        assert_eq!(p.indicators[1].signal, Direction::Bullish);
        assert_eq!(p.indicators[2].signal, Direction::Neutral);
        assert!(p.indicators.iter().all(|i| i.timeframe == Timeframe::Short));
    }

    #[test]
    fn test_markdown_decorated_headers() {
        let text = "**Action:** Buy\n**Confidence:** 70%\n- Direction: bullish\n";
        let p = parsed(text);
        assert_eq!(p.action, SignalAction::Buy);
        assert_eq!(p.confidence, 70.0);
        assert_eq!(p.direction, Direction::Bullish);
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let p = parsed("ACTION: hold");
        assert_eq!(p.action, SignalAction::Hold);
        assert_eq!(p.confidence, 50.0);
        assert_eq!(p.direction, Direction::Neutral);
        assert_eq!(p.timeframe, Timeframe::Medium);
        assert_eq!(p.social_sentiment, 50.0);
        assert_eq!(p.news_sentiment, 50.0);
        assert!(p.indicators.is_empty());
    }

    #[test]
    fn test_scores_clamped() {
        let p = parsed("ACTION: BUY\nCONFIDENCE: 180\nSOCIAL_SENTIMENT: -20\nNEWS_SENTIMENT: 101");
        assert_eq!(p.confidence, 100.0);
        assert_eq!(p.social_sentiment, 0.0);
        assert_eq!(p.news_sentiment, 100.0);
    }

    #[test]
    fn test_missing_action_is_failure() {
        let result = extract_signal("CONFIDENCE: 80\nDIRECTION: bullish\nThe market looks good.");
        assert!(matches!(result, Extraction::Failed(_)));
        assert!(matches!(extract_signal("   "), Extraction::Failed(_)));
    }

    #[test]
    fn test_action_keyword_must_be_near_header() {
        let text = format!("ACTION: {} buy", "x".repeat(60));
        assert!(matches!(extract_signal(&text), Extraction::Failed(_)));
    }

    #[test]
    fn test_first_reasoning_paragraph_only() {
        let text = "ACTION: BUY\nREASONING: first paragraph.\n\nsecond paragraph.\nREASONING: another";
        let p = parsed(text);
        assert_eq!(p.reasoning, "first paragraph.");
    }
}
