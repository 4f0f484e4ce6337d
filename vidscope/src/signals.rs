//! Keyword, sentiment and quality signals derived from transcript text.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{AnalysisOptions, QualityWeights};
use crate::hook::{HookCategory, HookResult};
use crate::pacing::PacingMetrics;
use crate::types::Transcript;

/// Upper bound of the quality score.
pub const QUALITY_MAX: f64 = 10.0;

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "but", "by", "can", "could", "did", "do", "does",
    "doing", "don't", "down", "each", "even", "for", "from", "get", "got", "had", "has", "have",
    "he", "her", "here", "him", "his", "how", "i'm", "if", "in", "into", "is", "isn't", "it",
    "it's", "its", "just", "know", "let", "like", "me", "more", "my", "no", "not", "now", "of",
    "off", "oh", "ok", "okay", "on", "one", "only", "or", "our", "out", "over", "really", "right",
    "see", "she", "so", "some", "than", "that", "that's", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "um", "uh", "up", "us", "very",
    "want", "was", "way", "we", "were", "what", "when", "where", "which", "who", "why", "will",
    "with", "would", "yeah", "you", "you're", "your",
];

/// Function characters that end a CJK word run.
const CJK_STOP_CHARS: &[char] = &[
    '的', '了', '是', '我', '你', '他', '她', '它', '们', '这', '那', '就', '都', '也', '和', '在',
    '有', '吗', '呢', '吧', '啊', '个', '很',
];

const POSITIVE_CUES: &[(&str, i32)] = &[
    ("amazing", 2),
    ("awesome", 2),
    ("beautiful", 1),
    ("best", 2),
    ("easy", 1),
    ("enjoy", 1),
    ("excellent", 2),
    ("fun", 1),
    ("good", 1),
    ("great", 2),
    ("happy", 1),
    ("helpful", 1),
    ("love", 2),
    ("perfect", 2),
    ("save", 1),
    ("saves", 1),
    ("simple", 1),
    ("success", 1),
    ("useful", 1),
    ("win", 1),
    ("喜欢", 1),
    ("开心", 1),
    ("厉害", 1),
    ("成功", 1),
    ("简单", 1),
];

const NEGATIVE_CUES: &[(&str, i32)] = &[
    ("angry", 1),
    ("awful", 2),
    ("bad", 1),
    ("boring", 1),
    ("broken", 1),
    ("fail", 1),
    ("failed", 1),
    ("hard", 1),
    ("hate", 2),
    ("mistake", 1),
    ("problem", 1),
    ("sad", 1),
    ("scam", 2),
    ("terrible", 2),
    ("worst", 2),
    ("wrong", 1),
    ("讨厌", 1),
    ("失败", 1),
    ("难过", 1),
    ("糟糕", 2),
    ("问题", 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Zero net score is neutral.
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s > 0 => Sentiment::Positive,
            s if s < 0 => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub term: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSignals {
    /// Most frequent content words, ties in first-occurrence order.
    pub keywords: Vec<Keyword>,
    pub sentiment: Sentiment,
    /// Net lexicon score: positive cue weights minus negative ones.
    pub sentiment_score: i32,
    /// Share of all word tokens taken by the listed keywords, in [0, 1].
    pub keyword_density: f64,
    /// Composite score in [0, 10].
    pub quality_score: f64,
}

/// Derive content signals. Keywords and sentiment read only the transcript
/// text; the quality score also folds in pacing regularity and hook strength.
pub fn extract_signals(
    transcript: &Transcript,
    hook: &HookResult,
    pacing: &PacingMetrics,
    options: &AnalysisOptions,
) -> ContentSignals {
    let text = transcript.text();
    let tokens = tokenize(&text);

    let keywords = extract_keywords(&tokens, options.top_keywords);
    let keyword_density = if tokens.is_empty() {
        0.0
    } else {
        keywords.iter().map(|k| k.count).sum::<usize>() as f64 / tokens.len() as f64
    };

    let sentiment_score = sentiment_score(&text, &tokens);
    let regularity = if pacing.segment_count == 0 {
        0.0
    } else {
        1.0 / (1.0 + pacing.rhythm_variance)
    };

    ContentSignals {
        keywords,
        sentiment: Sentiment::from_score(sentiment_score),
        sentiment_score,
        keyword_density,
        quality_score: score_quality(
            regularity,
            keyword_density,
            hook.category,
            &options.quality_weights,
        ),
    }
}

/// Lowercased word tokens. Apostrophes inside words are kept ("don't").
///
/// Chinese and Japanese text has no spaces, so runs of CJK characters are cut
/// at stop characters and the pieces emitted as overlapping bigrams
/// ("省钱方法" gives "省钱", "钱方", "方法"). Stop characters and single
/// characters left between them are emitted as one-character tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
    {
        let word = word.trim_matches('\'');
        if word.is_empty() {
            continue;
        }
        if word.chars().any(is_cjk) {
            split_mixed(word, &mut tokens);
        } else {
            tokens.push(word.to_string());
        }
    }
    tokens
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}')
}

fn split_mixed(word: &str, tokens: &mut Vec<String>) {
    let mut latin = String::new();
    let mut run: Vec<char> = Vec::new();
    for c in word.chars() {
        if !is_cjk(c) {
            push_bigrams(&mut run, tokens);
            latin.push(c);
            continue;
        }
        push_latin(&mut latin, tokens);
        if CJK_STOP_CHARS.contains(&c) {
            push_bigrams(&mut run, tokens);
            tokens.push(c.to_string());
        } else {
            run.push(c);
        }
    }
    push_latin(&mut latin, tokens);
    push_bigrams(&mut run, tokens);
}

fn push_latin(latin: &mut String, tokens: &mut Vec<String>) {
    let word = latin.trim_matches('\'');
    if !word.is_empty() {
        tokens.push(word.to_string());
    }
    latin.clear();
}

fn push_bigrams(run: &mut Vec<char>, tokens: &mut Vec<String>) {
    match run.len() {
        0 => {}
        1 => tokens.push(run[0].to_string()),
        _ => tokens.extend(run.windows(2).map(|pair| pair.iter().collect::<String>())),
    }
    run.clear();
}

/// Rank content words by frequency and keep the first `top_k`.
pub fn extract_keywords(tokens: &[String], top_k: usize) -> Vec<Keyword> {
    let mut ranked: Vec<Keyword> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for token in tokens.iter().filter(|t| is_content_word(t)) {
        match index.get(token.as_str()) {
            Some(&i) => ranked[i].count += 1,
            None => {
                index.insert(token.as_str(), ranked.len());
                ranked.push(Keyword {
                    term: token.clone(),
                    count: 1,
                });
            }
        }
    }

    // Stable sort keeps first-occurrence order among equal counts.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(top_k);
    ranked
}

fn is_content_word(token: &str) -> bool {
    token.chars().count() >= 2
        && !token.chars().all(|c| c.is_numeric())
        && !STOP_WORDS.contains(&token)
}

/// Sum of matched cue weights. Latin cues match whole tokens, CJK cues match
/// substrings of the text since those scripts are not space-delimited.
pub fn sentiment_score(text: &str, tokens: &[String]) -> i32 {
    let weigh = |cues: &[(&str, i32)]| -> i32 {
        cues.iter()
            .map(|(cue, weight)| {
                let hits = if cue.is_ascii() {
                    tokens.iter().filter(|t| t.as_str() == *cue).count()
                } else {
                    text.matches(cue).count()
                };
                hits as i32 * weight
            })
            .sum()
    };
    weigh(POSITIVE_CUES) - weigh(NEGATIVE_CUES)
}

/// Weighted mean of the three components scaled to [0, 10], rounded to two
/// decimals. Non-decreasing in each component.
pub fn score_quality(
    regularity: f64,
    keyword_density: f64,
    hook: HookCategory,
    weights: &QualityWeights,
) -> f64 {
    let total = weights.total();
    if total <= 0.0 {
        return 0.0;
    }
    let blended = weights.regularity * regularity.clamp(0.0, 1.0)
        + weights.keyword_density * keyword_density.clamp(0.0, 1.0)
        + weights.hook * hook.strength();
    let score = (QUALITY_MAX * blended / total).clamp(0.0, QUALITY_MAX);
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::classify_hook;
    use crate::pacing::analyze_pacing;
    use crate::types::VideoMetadata;

    fn tokens(text: &str) -> Vec<String> {
        tokenize(text)
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokens("Don't STOP -- it's 2024, folks!"),
            vec!["don't", "stop", "it's", "2024", "folks"]
        );
    }

    #[test]
    fn test_tokenize_cjk_runs() {
        assert_eq!(tokens("省钱方法"), vec!["省钱", "钱方", "方法"]);
        assert_eq!(tokens("我的方法"), vec!["我", "的", "方法"]);
        assert_eq!(tokens("用iPhone拍照"), vec!["用", "iphone", "拍照"]);
    }

    #[test]
    fn test_chinese_keywords() {
        let t = tokens("今天分享一个省钱的方法，这个方法真的很简单，省钱方法大家一定要学会");
        let kw = extract_keywords(&t, 10);
        assert_eq!(
            kw[..2],
            [
                Keyword {
                    term: "方法".into(),
                    count: 3
                },
                Keyword {
                    term: "省钱".into(),
                    count: 2
                },
            ]
        );
        assert!(kw.iter().all(|k| k.term.chars().count() == 2));
    }

    #[test]
    fn test_keywords_ranked_by_frequency_then_first_occurrence() {
        let t = tokens("garden tomato soil garden tomato garden water soil");
        let kw = extract_keywords(&t, 10);
        let terms: Vec<_> = kw.iter().map(|k| k.term.as_str()).collect();
        assert_eq!(terms, vec!["garden", "tomato", "soil", "water"]);
        assert_eq!(kw[0].count, 3);
    }

    #[test]
    fn test_keywords_skip_stop_words_short_and_numeric() {
        let t = tokens("the a 42 x of and rocket rocket");
        let kw = extract_keywords(&t, 10);
        assert_eq!(
            kw,
            vec![Keyword {
                term: "rocket".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_keywords_top_k() {
        let t = tokens("alpha beta gamma delta alpha");
        assert_eq!(extract_keywords(&t, 2).len(), 2);
        assert!(extract_keywords(&t, 0).is_empty());
    }

    #[test]
    fn test_sentiment() {
        let pos = "I love this simple trick";
        assert_eq!(Sentiment::from_score(sentiment_score(pos, &tokens(pos))), Sentiment::Positive);

        let neg = "This is the worst, a terrible scam";
        assert_eq!(Sentiment::from_score(sentiment_score(neg, &tokens(neg))), Sentiment::Negative);

        let tie = "good but bad";
        assert_eq!(sentiment_score(tie, &tokens(tie)), 0);
        assert_eq!(Sentiment::from_score(0), Sentiment::Neutral);
    }

    #[test]
    fn test_sentiment_cjk_substrings() {
        let text = "这个方法很简单，我很喜欢";
        assert_eq!(sentiment_score(text, &tokens(text)), 2);
    }

    #[test]
    fn test_quality_bounds() {
        let w = QualityWeights::default();
        assert_eq!(score_quality(0.0, 0.0, HookCategory::NoneDetected, &w), 0.0);
        assert_eq!(score_quality(1.0, 1.0, HookCategory::Question, &w), 10.0);
        let s = score_quality(5.0, 7.0, HookCategory::Shock, &w);
        assert!((0.0..=10.0).contains(&s));
    }

    #[test]
    fn test_quality_monotonic_in_hook() {
        let w = QualityWeights::default();
        let none = score_quality(0.5, 0.2, HookCategory::NoneDetected, &w);
        let statement = score_quality(0.5, 0.2, HookCategory::Statement, &w);
        let question = score_quality(0.5, 0.2, HookCategory::Question, &w);
        assert!(none <= statement && statement <= question);
        assert!(none < question);
    }

    #[test]
    fn test_quality_monotonic_in_regularity_and_density() {
        let w = QualityWeights::default();
        let mut prev = -1.0;
        for step in 0..=10 {
            let x = step as f64 / 10.0;
            let s = score_quality(x, 0.3, HookCategory::Promise, &w);
            assert!(s >= prev);
            prev = s;
        }
        let mut prev = -1.0;
        for step in 0..=10 {
            let x = step as f64 / 10.0;
            let s = score_quality(0.3, x, HookCategory::Promise, &w);
            assert!(s >= prev);
            prev = s;
        }
    }

    #[test]
    fn test_quality_weights_change_balance() {
        let hook_only = QualityWeights::new(0.0, 0.0, 1.0).unwrap();
        assert_eq!(score_quality(0.0, 0.0, HookCategory::Statement, &hook_only), 5.0);
    }

    #[test]
    fn test_extract_signals_end_to_end() {
        let t = Transcript::from_triples(
            [
                (0.0, 1.0, "Did you know this?"),
                (1.0, 3.0, "this simple trick saves time"),
                (3.0, 5.0, "let me show you how"),
            ],
            "en",
        )
        .unwrap();
        let meta = VideoMetadata::new("v", "t", "a", 5.0).unwrap();
        let hook = classify_hook(&t, 3.0);
        let pacing = analyze_pacing(&t, &meta);
        let signals = extract_signals(&t, &hook, &pacing, &AnalysisOptions::default());

        assert_eq!(signals.sentiment, Sentiment::Positive);
        let terms: Vec<_> = signals.keywords.iter().map(|k| k.term.as_str()).collect();
        assert_eq!(terms, vec!["simple", "trick", "saves", "time", "show"]);
        assert!(signals.keyword_density > 0.0 && signals.keyword_density <= 1.0);
        assert!(signals.quality_score > 0.0 && signals.quality_score <= 10.0);
    }

    #[test]
    fn test_extract_signals_empty_transcript() {
        let t = Transcript::empty("en");
        let meta = VideoMetadata::new("v", "t", "a", 10.0).unwrap();
        let hook = classify_hook(&t, 3.0);
        let pacing = analyze_pacing(&t, &meta);
        let signals = extract_signals(&t, &hook, &pacing, &AnalysisOptions::default());
        assert!(signals.keywords.is_empty());
        assert_eq!(signals.sentiment, Sentiment::Neutral);
        assert_eq!(signals.keyword_density, 0.0);
        assert_eq!(signals.quality_score, 0.0);
    }
}
