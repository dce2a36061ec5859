//! Smart summary: compress the older part of a chat into one message
//!
//! Once a chat exceeds the token threshold, everything except the most recent
//! messages is replaced by a single summary message. The digest is built from
//! simple heuristics over the replaced messages:
//!
//! - up to 5 keywords from user messages
//! - up to 3 question-like user messages
//! - up to 3 assistant sentences that read like a recommendation
//!
//! The wording of the digest is not stable; only its position (first), role
//! (assistant) and sentinel provider/model are.

use chrono::Duration;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::{OptimizationResult, OptimizationStrategy};
use crate::message::{make_summary_message, Message, Role};
use crate::tokens::TokenEstimator;

/// Minimum number of recent messages kept verbatim
pub const MIN_RECENT_MESSAGES: usize = 5;

/// Fraction of the chat kept verbatim when that exceeds the minimum
pub const RECENT_FRACTION: f64 = 0.3;

const MAX_KEYWORDS: usize = 5;
const KEYWORDS_PER_MESSAGE: usize = 10;
const MAX_QUESTIONS: usize = 3;
const MAX_SOLUTIONS: usize = 3;
const EXCERPT_CHARS: usize = 160;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "because", "before", "being", "below",
    "between", "could", "doing", "during", "every", "first", "other", "their", "theirs", "there",
    "these", "thing", "things", "think", "those", "through", "under", "until", "where", "which",
    "while", "would", "should", "shall", "might", "maybe", "really", "still", "something",
    "anything", "please", "thanks", "thank", "right", "going", "having", "there's", "what's",
    "image", "screenshot", "screen",
];

const SOLUTION_WORDS: &[&str] = &[
    "solution",
    "recommend",
    "suggest",
    "should",
    "try",
    "use",
    "install",
    "run",
    "execute",
];

/// Number of recent messages kept verbatim for a chat of `len` messages
pub fn recent_count(len: usize) -> usize {
    MIN_RECENT_MESSAGES.max((len as f64 * RECENT_FRACTION).floor() as usize)
}

/// Summarizes all but the most recent messages once the chat exceeds
/// `token_threshold`
///
/// Keeps `max(5, floor(len * 0.3))` recent messages and puts a synthesized
/// summary in front of them. No-op when the chat is at or below the
/// threshold, or when there is nothing older than the recent block.
///
/// # Examples
///
/// ```
/// use ctxtrim::message::Message;
/// use ctxtrim::optimizer::smart_summary;
/// use ctxtrim::tokens::TokenEstimator;
///
/// let messages: Vec<Message> = (0..20)
///     .map(|i| Message::user(1, format!("How do I configure the proxy server {}?", i)))
///     .collect();
/// let result = smart_summary(&messages, 100, &TokenEstimator::default());
/// assert!(result.messages[0].is_summary());
/// assert_eq!(result.messages.len(), 1 + 6);
/// ```
pub fn smart_summary(
    messages: &[Message],
    token_threshold: usize,
    estimator: &TokenEstimator,
) -> OptimizationResult {
    let strategy = OptimizationStrategy::SmartSummary;
    let original_tokens = estimator.estimate_chat_tokens(messages);

    if original_tokens <= token_threshold {
        return OptimizationResult::unchanged(messages, original_tokens, strategy);
    }

    let keep = recent_count(messages.len());
    if keep >= messages.len() {
        tracing::debug!(
            messages = messages.len(),
            keep,
            "Nothing older than the recent block, skipping summary"
        );
        return OptimizationResult::unchanged(messages, original_tokens, strategy);
    }

    let split = messages.len() - keep;
    let (to_summarize, recent) = messages.split_at(split);

    // split > 0 and keep > 0, so both halves are non-empty.
    // The summary must sort strictly before recent[0], even on a timestamp tie.
    let anchor = &to_summarize[to_summarize.len() - 1];
    let timestamp = anchor
        .timestamp
        .min(recent[0].timestamp - Duration::nanoseconds(1));
    let summary = make_summary_message(
        build_summary_content(to_summarize),
        anchor.chat_id,
        timestamp,
    );
    let summarized_ids: Vec<i64> = to_summarize.iter().filter_map(|m| m.id).collect();

    tracing::debug!(
        summarized = to_summarize.len(),
        kept = recent.len(),
        "Summarizing older messages"
    );

    let mut candidate = Vec::with_capacity(recent.len() + 1);
    candidate.push(summary.clone());
    candidate.extend_from_slice(recent);

    OptimizationResult::from_candidate(
        messages,
        original_tokens,
        candidate,
        Some(summary),
        summarized_ids,
        strategy,
        estimator,
    )
}

/// Builds the human-readable digest for a run of messages
pub fn build_summary_content(messages: &[Message]) -> String {
    let keywords = extract_topics(messages);
    let questions = extract_questions(messages);
    let solutions = extract_solutions(messages);

    let mut summary = String::from("Summary of earlier conversation:\n");

    if !keywords.is_empty() {
        summary.push_str(&format!("\nTopics discussed: {}\n", keywords.join(", ")));
    }

    if !questions.is_empty() {
        summary.push_str("\nQuestions asked:\n");
        for question in &questions {
            summary.push_str(&format!("- {}\n", question));
        }
    }

    if !solutions.is_empty() {
        summary.push_str("\nSolutions provided:\n");
        for solution in &solutions {
            summary.push_str(&format!("- {}\n", solution));
        }
    }

    summary.push_str(&format!(
        "\n[{} earlier messages summarized]",
        messages.len()
    ));
    summary
}

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z0-9'_-]*").expect("word pattern is valid"))
}

fn question_starter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\W*(how|what|why|when|where|can|could|would|should)\b")
            .expect("question starter pattern is valid")
    })
}

fn sentence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^.!?\n]+[.!?]?").expect("sentence pattern is valid"))
}

/// Keywords from a single text: words longer than four characters that are
/// not stopwords, lowercased, first ten in order
pub fn extract_keywords(text: &str) -> Vec<String> {
    word_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.chars().count() > 4 && !STOPWORDS.contains(&w.as_str()))
        .take(KEYWORDS_PER_MESSAGE)
        .collect()
}

fn extract_topics(messages: &[Message]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut topics = Vec::new();

    for message in messages.iter().filter(|m| m.role == Role::User) {
        for keyword in extract_keywords(&message.content) {
            if seen.insert(keyword.clone()) {
                topics.push(keyword);
                if topics.len() == MAX_KEYWORDS {
                    return topics;
                }
            }
        }
    }

    topics
}

/// Returns true for text that reads like a question
pub fn is_question(text: &str) -> bool {
    text.contains('?') || question_starter_pattern().is_match(text)
}

fn extract_questions(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.role == Role::User && is_question(&m.content))
        .map(|m| truncate_string(m.content.trim(), EXCERPT_CHARS))
        .take(MAX_QUESTIONS)
        .collect()
}

fn is_solution_sentence(sentence: &str) -> bool {
    word_pattern().find_iter(sentence).any(|w| {
        let word = w.as_str().to_lowercase();
        SOLUTION_WORDS.contains(&word.as_str())
    })
}

fn extract_solutions(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.role == Role::Assistant && !m.is_summary())
        .flat_map(|m| sentence_pattern().find_iter(&m.content))
        .map(|s| s.as_str().trim())
        .filter(|s| !s.is_empty() && is_solution_sentence(s))
        .map(|s| truncate_string(s, EXCERPT_CHARS))
        .take(MAX_SOLUTIONS)
        .collect()
}

/// Truncates a string to `max_len` characters, adding an ellipsis if cut
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let mut truncated = s.chars().take(max_len - 3).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}
