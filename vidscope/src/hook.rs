//! Opening-hook classification.
//!
//! The first seconds of narration are matched against an ordered list of
//! named rules. The first rule that matches decides the category, so the
//! outcome never depends on match length and each rule can be tested alone.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::Transcript;

/// The opening window always starts at the beginning of the video.
const WINDOW_START: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookCategory {
    #[serde(rename = "question-hook")]
    Question,
    #[serde(rename = "shock-hook")]
    Shock,
    #[serde(rename = "promise-hook")]
    Promise,
    #[serde(rename = "narrative-hook")]
    Narrative,
    #[serde(rename = "statement-hook")]
    Statement,
    #[serde(rename = "none-detected")]
    NoneDetected,
}

impl HookCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookCategory::Question => "question-hook",
            HookCategory::Shock => "shock-hook",
            HookCategory::Promise => "promise-hook",
            HookCategory::Narrative => "narrative-hook",
            HookCategory::Statement => "statement-hook",
            HookCategory::NoneDetected => "none-detected",
        }
    }

    /// How much hook signal the category carries, in [0, 1].
    pub fn strength(&self) -> f64 {
        match self {
            HookCategory::NoneDetected => 0.0,
            HookCategory::Statement => 0.5,
            _ => 1.0,
        }
    }
}

impl fmt::Display for HookCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying the opening window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResult {
    pub category: HookCategory,
    /// Text of the segments inside the window.
    pub text: String,
    pub start: f64,
    /// End of the last contributing segment, measured from the window start.
    pub duration: f64,
    /// Window actually inspected, after clamping to the transcript.
    pub window_seconds: f64,
    pub segment_count: usize,
    /// Name of the rule that fired, if any.
    pub rule: Option<String>,
    pub rationale: String,
}

/// A named predicate mapping opening text to a category.
#[derive(Debug, Clone)]
pub struct HookRule {
    pub name: &'static str,
    pub category: HookCategory,
    pub pattern: Regex,
    pub description: &'static str,
}

impl HookRule {
    pub fn new(
        name: &'static str,
        category: HookCategory,
        pattern: &str,
        description: &'static str,
    ) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::InvalidOption(format!("hook rule {name}: {e}")))?;
        Ok(Self {
            name,
            category,
            pattern,
            description,
        })
    }

    /// The matched text, if this rule fires on `text`.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.pattern.find(text).map(|m| m.as_str())
    }
}

/// Built-in rules as `(name, category, pattern, description)`, in priority
/// order. Every pattern is compiled by `test_standard_patterns_compile`.
const STANDARD_PATTERNS: &[(&str, HookCategory, &str, &str)] = &[
    (
        "interrogative",
        HookCategory::Question,
        r"(?i)[?？]|^(?:what|why|how|who|when|where|which|did|do|does|is|are|was|were|can|could|would|should|have you|ever)\b|为什么|怎么|吗",
        "interrogative marker",
    ),
    (
        "surprise",
        HookCategory::Shock,
        r"(?i)[!！]|\b(?:best|worst|craziest|insane|unbelievable|shocking|shocked|incredible|never|nobody|biggest|most)\b|震惊|惊人|不敢相信|太厉害|但是|然而|不过|其实",
        "surprise or superlative marker",
    ),
    (
        "promise",
        HookCategory::Promise,
        r"(?i)\b(?:how to|secrets?|tricks?|tips?|hacks?|saves?|learn|steps?|guide|you will|you'll|let me show|i'll show)\b|秘密|方法|技巧|绝招|干货",
        "promise or benefit phrasing",
    ),
    (
        "narrative",
        HookCategory::Narrative,
        r"(?i)^(?:so i|when i|i|i'm|i've|my|we|yesterday|last (?:week|month|year|night)|once|one day)\b|^我",
        "first-person narrative opener",
    ),
];

static STANDARD_RULES: LazyLock<Vec<HookRule>> = LazyLock::new(|| {
    STANDARD_PATTERNS
        .iter()
        .filter_map(|&(name, category, pattern, description)| {
            HookRule::new(name, category, pattern, description)
                .inspect_err(|e| warn!(error = %e, "skipping hook rule"))
                .ok()
        })
        .collect()
});

/// The built-in rules, in priority order.
pub fn standard_rules() -> &'static [HookRule] {
    &STANDARD_RULES
}

/// Classify the opening `window_seconds` of `transcript` with the built-in rules.
pub fn classify_hook(transcript: &Transcript, window_seconds: f64) -> HookResult {
    classify_with_rules(transcript, window_seconds, standard_rules())
}

/// Classify with a caller-supplied rule list, evaluated in order.
///
/// Never fails: no speech in the window gives `none-detected`, and speech that
/// no rule matches gives `statement-hook`.
pub fn classify_with_rules(
    transcript: &Transcript,
    window_seconds: f64,
    rules: &[HookRule],
) -> HookResult {
    let total = transcript.duration();
    let window = window_seconds.max(0.0).min(total);
    let opening = transcript.segments_in(WINDOW_START, WINDOW_START + window);

    let Some(last) = opening.last() else {
        return HookResult {
            category: HookCategory::NoneDetected,
            text: String::new(),
            start: WINDOW_START,
            duration: 0.0,
            window_seconds: window,
            segment_count: 0,
            rule: None,
            rationale: format!("no speech in the opening {window:.1}s"),
        };
    };

    let text = opening
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let duration = (last.end - WINDOW_START).min(total);

    let matched = rules
        .iter()
        .find_map(|rule| rule.find(&text).map(|m| (rule, m.to_string())));

    let (category, rule, rationale) = match matched {
        Some((rule, m)) => (
            rule.category,
            Some(rule.name.to_string()),
            format!("{} \"{}\" in the opening {window:.1}s", rule.description, m),
        ),
        None => (
            HookCategory::Statement,
            None,
            format!("no hook rule matched the opening {window:.1}s; treated as a plain statement"),
        ),
    };

    debug!(category = %category, segments = opening.len(), "hook classified");

    HookResult {
        category,
        text,
        start: WINDOW_START,
        duration,
        window_seconds: window,
        segment_count: opening.len(),
        rule,
        rationale,
    }
}
