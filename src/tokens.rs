//! Approximate token estimation
//!
//! There is deliberately no tokenizer dependency here. Counts come from a
//! character heuristic with surcharges for markdown control sequences and
//! punctuation, plus flat per-message and per-image overheads. The numbers are
//! best-effort and will not match any vendor tokenizer exactly; they are only
//! guaranteed to follow the arithmetic below and to grow with input length.
//!
//! For a text of `n` characters containing `m` markdown control sequences and
//! `p` special characters:
//!
//! ```text
//! tokens = ceil(n / 4) + 2 * m + ceil(p / 2)
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::message::Message;

/// Characters counted by the punctuation surcharge
pub const SPECIAL_CHARS: &str = "{}()[]<>@#$%^&*+=|\\:;\"',?!";

/// Average characters per token for English text
pub const CHARS_PER_TOKEN: usize = 4;

/// Tokens added per markdown control sequence
pub const MARKDOWN_SEQUENCE_TOKENS: usize = 2;

/// Overhead constants applied per message
///
/// Both values are rough approximations of the formatting cost models add
/// around each message and of a typical screenshot's token footprint. They
/// are configuration, not measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Flat tokens added to every message for role and formatting overhead
    #[serde(default = "default_message_overhead")]
    pub message_overhead_tokens: usize,

    /// Flat tokens added when a message carries an image, regardless of size
    #[serde(default = "default_image_tokens")]
    pub image_tokens: usize,
}

fn default_message_overhead() -> usize {
    10
}

fn default_image_tokens() -> usize {
    85
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            message_overhead_tokens: default_message_overhead(),
            image_tokens: default_image_tokens(),
        }
    }
}

/// Heuristic token estimator
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEstimator {
    config: EstimatorConfig,
}

impl TokenEstimator {
    /// Creates an estimator with the given overhead constants
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Returns the overhead constants in use
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimates tokens for raw text
    ///
    /// Empty text yields 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use ctxtrim::tokens::TokenEstimator;
    ///
    /// let estimator = TokenEstimator::default();
    /// assert_eq!(estimator.estimate_tokens(""), 0);
    /// assert_eq!(estimator.estimate_tokens("test"), 1);
    /// // 11 chars -> 3, two `**` sequences -> 4, four `*` characters -> 2
    /// assert_eq!(estimator.estimate_tokens("**bold** ok"), 9);
    /// ```
    pub fn estimate_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let base = (text.chars().count() + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN;
        let markdown = count_markdown_sequences(text) * MARKDOWN_SEQUENCE_TOKENS;
        let special = (count_special_chars(text) + 1) / 2;

        base + markdown + special
    }

    /// Estimates tokens for a single message including its overheads
    pub fn estimate_message_tokens(&self, message: &Message) -> usize {
        let image = if message.image_path.is_some() {
            self.config.image_tokens
        } else {
            0
        };

        self.estimate_tokens(&message.content) + self.config.message_overhead_tokens + image
    }

    /// Estimates tokens for a message sequence as the sum of its messages
    pub fn estimate_chat_tokens(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| self.estimate_message_tokens(m))
            .sum()
    }
}

/// Estimates tokens for text with the default configuration
pub fn estimate_tokens(text: &str) -> usize {
    TokenEstimator::default().estimate_tokens(text)
}

/// Estimates tokens for a message with the default configuration
pub fn estimate_message_tokens(message: &Message) -> usize {
    TokenEstimator::default().estimate_message_tokens(message)
}

/// Estimates tokens for a chat with the default configuration
pub fn estimate_chat_tokens(messages: &[Message]) -> usize {
    TokenEstimator::default().estimate_chat_tokens(messages)
}

fn markdown_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Horizontal rules must come before `***` could be read as bold + italic.
        Regex::new(
            r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$|```|`|\*\*|__|\*|^#{1,6}[ \t]|^[ \t]*>",
        )
        .expect("markdown pattern is valid")
    })
}

/// Counts markdown control sequences (code fences, inline code, emphasis,
/// headings, blockquotes and horizontal rules)
pub fn count_markdown_sequences(text: &str) -> usize {
    markdown_pattern().find_iter(text).count()
}

/// Counts characters from [`SPECIAL_CHARS`]
pub fn count_special_chars(text: &str) -> usize {
    text.chars().filter(|c| SPECIAL_CHARS.contains(*c)).count()
}
