//! Response normalization
//!
//! Maps free-form provider text into the uniform response shape:
//! action hint, up to three suggestions and the research disclaimer footer.
//! The matching rules sit behind `TextClassifier` so they can be swapped
//! without touching the cascade.

use crate::models::{ActionHint, ActionType};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

pub const DISCLAIMER_FOOTER: &str =
    "Always do your own research and consider talking to a qualified professional before making financial decisions.";

const MAX_SUGGESTIONS: usize = 3;
const FALLBACK_SENTENCE_WINDOW: usize = 4;
const MAX_SUGGESTION_CHARS: usize = 120;

lazy_static! {
    /// Checked in order; first match wins.
    static ref ACTION_PATTERNS: Vec<(ActionType, Regex)> = vec![
        (
            ActionType::CreateBudget,
            Regex::new(r"(?i)\b(?:create|build|set up|make|start)\s+(?:a\s+|your\s+)?(?:monthly\s+|weekly\s+)?budget\b|\bbudget(?:ing)? plan\b").unwrap(),
        ),
        (
            ActionType::SetGoal,
            Regex::new(r"(?i)\b(?:set|create|define|establish)\s+(?:a\s+|your\s+)?(?:savings\s+|financial\s+)?goals?\b|\bsavings goal\b").unwrap(),
        ),
        (
            ActionType::TrackExpense,
            Regex::new(r"(?i)\btrack(?:ing)?\s+(?:your\s+|my\s+|all\s+)?(?:expenses|spending)\b|\bexpense track(?:er|ing)\b").unwrap(),
        ),
        (
            ActionType::LearnMore,
            Regex::new(r"(?i)\b(?:learn|read) more\b|\blearn about\b|\beducational (?:content|resources)\b").unwrap(),
        ),
    ];

    static ref ADVICE_LEAD_IN: Regex = Regex::new(
        r"(?i)\b(?:I(?:'d| would)? suggest(?: that)?|I(?:'d| would)? recommend(?: that)?|you might want to|you could|try to|consider|maybe|perhaps)\s+(.+)"
    )
    .unwrap();

    static ref ACTION_VERB: Regex = Regex::new(
        r"(?i)\b(?:start|create|open|set up|track|reduce|save|invest|review|set|build)\b"
    )
    .unwrap();

    static ref DISCLAIMER_PRESENT: Regex =
        Regex::new(r"(?i)\b(?:always\s+)?do\s+your\s+own\s+research\b").unwrap();
}

/// Swappable text-matching strategy.
pub trait TextClassifier: Send + Sync {
    fn detect_action(&self, text: &str) -> Option<ActionHint>;
    fn extract_suggestions(&self, text: &str) -> Vec<String>;
}

/// Keyword and sentence-pattern rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternClassifier;

impl TextClassifier for PatternClassifier {
    fn detect_action(&self, text: &str) -> Option<ActionHint> {
        ACTION_PATTERNS.iter().find_map(|(action, pattern)| {
            pattern.find(text).map(|m| ActionHint {
                action: *action,
                payload: serde_json::json!({ "trigger": m.as_str().to_lowercase() }),
            })
        })
    }

    fn extract_suggestions(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        let mut suggestions: Vec<String> = Vec::with_capacity(MAX_SUGGESTIONS);

        for sentence in &sentences {
            if suggestions.len() >= MAX_SUGGESTIONS {
                break;
            }
            if let Some(caps) = ADVICE_LEAD_IN.captures(sentence) {
                let s = tidy_suggestion(&caps[1]);
                if !s.is_empty() && !suggestions.contains(&s) {
                    suggestions.push(s);
                }
            }
        }

        if !suggestions.is_empty() {
            return suggestions;
        }

        sentences
            .iter()
            .take(FALLBACK_SENTENCE_WINDOW)
            .filter(|s| ACTION_VERB.is_match(s))
            .map(|s| tidy_suggestion(s))
            .filter(|s| !s.is_empty())
            .take(MAX_SUGGESTIONS)
            .collect()
    }
}

/// Output of normalization before provider metadata is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFragment {
    pub message: String,
    pub suggestions: Vec<String>,
    pub action_hint: Option<ActionHint>,
}

#[derive(Clone)]
pub struct ResponseNormalizer {
    classifier: Arc<dyn TextClassifier>,
}

impl ResponseNormalizer {
    pub fn new(classifier: Arc<dyn TextClassifier>) -> Self {
        Self { classifier }
    }

    pub fn normalize(&self, raw: &str) -> NormalizedFragment {
        NormalizedFragment {
            message: with_disclaimer(raw),
            suggestions: self.classifier.extract_suggestions(raw),
            action_hint: self.classifier.detect_action(raw),
        }
    }
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(PatternClassifier))
    }
}

/// Normalize with the default pattern rules.
pub fn normalize(raw: &str) -> NormalizedFragment {
    ResponseNormalizer::default().normalize(raw)
}

/// Append the footer unless an equivalent phrase is already there.
pub fn with_disclaimer(text: &str) -> String {
    if DISCLAIMER_PRESENT.is_match(text) {
        return text.to_string();
    }

    if text.is_empty() {
        return DISCLAIMER_FOOTER.to_string();
    }
    format!("{}\n\n{}", text, DISCLAIMER_FOOTER)
}

/// Confidence from reply length, clamped to [0.5, 0.98].
pub fn estimate_confidence(text: &str) -> f32 {
    let base_confidence: f32 = 0.9;

    let len = text.trim().len();
    let length_confidence = if len < 50 {
        0.6
    } else if len > 2000 {
        0.8
    } else {
        1.0
    };

    (base_confidence * length_confidence).clamp(0.5, 0.98)
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?', '\n'])
        .map(|s| s.trim().trim_start_matches(['-', '*', '•', '#', ' ']).trim())
        .filter(|s| !s.is_empty())
        .collect()
}

fn tidy_suggestion(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches([',', ';', ':']).trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let limited: String = if trimmed.chars().count() > MAX_SUGGESTION_CHARS {
        let cut: String = trimmed.chars().take(MAX_SUGGESTION_CHARS).collect();
        match cut.rfind(' ') {
            Some(idx) => format!("{}…", &cut[..idx]),
            None => format!("{}…", cut),
        }
    } else {
        trimmed.to_string()
    };

    let mut chars = limited.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
