//! Confidence scoring (`spec.md` §4.3, §4.4), ported from the original's
//! `ConfidenceCalculator.calculate`.

const EXPLICIT_BOOST: f64 = 0.10;
const MULTI_MENTION_BOOST: f64 = 0.05;
const MULTI_MENTION_BOOST_CAP: f64 = 0.20;
const CONTRADICTION_PENALTY: f64 = 0.30;
const CORRECTION_CONFIDENCE: f64 = 0.80;

const MENTION_STOPWORDS: &[&str] = &["about", "using", "prefer", "prefers", "cluster", "server"];

const CORRECTION_INDICATORS: &[&str] = &[
    "actually",
    "i meant",
    "correction",
    "sorry",
    "i misspoke",
    "not ",
    "no wait",
    "let me correct",
    "to be clear",
];

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceInputs {
    pub base_confidence: f64,
    pub is_explicit: bool,
    pub mention_count: u32,
    pub has_contradiction: bool,
    pub is_correction: bool,
}

/// Final confidence from multiple factors, clamped to `[0.0, 1.0]`.
pub fn calculate(inputs: ConfidenceInputs) -> f64 {
    if inputs.is_correction {
        return CORRECTION_CONFIDENCE;
    }

    let mut confidence = inputs.base_confidence;

    if inputs.is_explicit {
        confidence += EXPLICIT_BOOST;
    }

    if inputs.mention_count > 1 {
        let boost = MULTI_MENTION_BOOST * (inputs.mention_count - 1) as f64;
        confidence += boost.min(MULTI_MENTION_BOOST_CAP);
    }

    if inputs.has_contradiction {
        confidence -= CONTRADICTION_PENALTY;
    }

    confidence.clamp(0.0, 1.0)
}

/// Counts how many conversation messages reference the memory's key terms.
/// Keyword-based by design (`spec.md` §4.3 notes semantic matching is out of
/// scope for this pass); minimum 1.
pub fn detect_multi_mentions(content: &str, conversation_messages: &[String]) -> u32 {
    let key_terms: Vec<String> = content
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 4 && !MENTION_STOPWORDS.contains(&w.as_str()))
        .collect();

    if key_terms.is_empty() {
        return 1;
    }

    let mention_count = conversation_messages
        .iter()
        .filter(|msg| {
            let lower = msg.to_lowercase();
            key_terms.iter().any(|term| lower.contains(term.as_str()))
        })
        .count() as u32;

    mention_count.max(1)
}

/// Whether text contains a correction indicator phrase.
pub fn detect_correction_patterns(text: &str) -> bool {
    let lower = text.to_lowercase();
    CORRECTION_INDICATORS.iter().any(|ind| lower.contains(ind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_overrides_everything_else() {
        let c = calculate(ConfidenceInputs {
            base_confidence: 0.5,
            is_explicit: false,
            mention_count: 1,
            has_contradiction: true,
            is_correction: true,
        });
        assert_eq!(c, 0.80);
    }

    #[test]
    fn explicit_boost_applies() {
        let c = calculate(ConfidenceInputs {
            base_confidence: 0.7,
            is_explicit: true,
            mention_count: 1,
            has_contradiction: false,
            is_correction: false,
        });
        assert!((c - 0.80).abs() < 1e-9);
    }

    #[test]
    fn multi_mention_boost_is_capped() {
        let c = calculate(ConfidenceInputs {
            base_confidence: 0.5,
            is_explicit: false,
            mention_count: 10,
            has_contradiction: false,
            is_correction: false,
        });
        assert!((c - 0.70).abs() < 1e-9);
    }

    #[test]
    fn contradiction_penalty_applies_and_clamps() {
        let c = calculate(ConfidenceInputs {
            base_confidence: 0.2,
            is_explicit: false,
            mention_count: 1,
            has_contradiction: true,
            is_correction: false,
        });
        assert_eq!(c, 0.0);
    }

    #[test]
    fn detects_correction_phrase() {
        assert!(detect_correction_patterns("Actually, I meant Docker not Podman"));
        assert!(!detect_correction_patterns("I prefer Docker"));
    }

    #[test]
    fn mention_counting_ignores_stopwords_and_short_words() {
        let msgs = vec![
            "I use Docker for everything".to_string(),
            "Docker is great".to_string(),
            "unrelated message".to_string(),
        ];
        let count = detect_multi_mentions("User prefers Docker", &msgs);
        assert_eq!(count, 2);
    }

    #[test]
    fn mention_counting_with_no_key_terms_returns_one() {
        assert_eq!(detect_multi_mentions("a b c", &[]), 1);
    }
}
