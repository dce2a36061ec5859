//! Chat-history optimization strategies
//!
//! Each strategy is a pure function from a message slice to an
//! [`OptimizationResult`]. Inputs are never mutated. Token figures on the
//! result are always recomputed from the returned message list so the
//! reported savings cannot drift from what would actually be sent.
//!
//! # Strategies
//!
//! - `none`: send the full history
//! - `rolling-window`: keep only the last N messages
//! - `smart-summary`: replace an older prefix with one summary message once
//!   the chat exceeds a token threshold
//! - `rolling-with-summary`: window first, then summarize the window if it is
//!   still over the threshold

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CtxtrimError;
use crate::message::Message;
use crate::tokens::TokenEstimator;

pub mod rolling;
pub mod summary;

pub use rolling::rolling_window;
pub use summary::{smart_summary, MIN_RECENT_MESSAGES, RECENT_FRACTION};

/// Which history reduction to apply before sending a chat to a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizationStrategy {
    /// Send every message
    None,
    /// Keep the most recent `rolling_window_size` messages
    RollingWindow,
    /// Summarize the older part of the chat above `summary_threshold` tokens
    SmartSummary,
    /// Rolling window, then smart summary on the window if still too large
    #[default]
    RollingWithSummary,
}

impl OptimizationStrategy {
    /// Returns the kebab-case label of the strategy
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStrategy::None => "none",
            OptimizationStrategy::RollingWindow => "rolling-window",
            OptimizationStrategy::SmartSummary => "smart-summary",
            OptimizationStrategy::RollingWithSummary => "rolling-with-summary",
        }
    }
}

impl fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationStrategy {
    type Err = CtxtrimError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "none" => Ok(OptimizationStrategy::None),
            "rolling-window" => Ok(OptimizationStrategy::RollingWindow),
            "smart-summary" => Ok(OptimizationStrategy::SmartSummary),
            "rolling-with-summary" => Ok(OptimizationStrategy::RollingWithSummary),
            other => Err(CtxtrimError::Config(format!(
                "Invalid optimization strategy: {}. Must be one of: none, rolling-window, smart-summary, rolling-with-summary",
                other
            ))),
        }
    }
}

/// Optimization settings supplied by the surrounding application
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSettings {
    /// Strategy to apply
    #[serde(default)]
    pub strategy: OptimizationStrategy,

    /// Number of most recent messages kept by the rolling window
    #[serde(default = "default_rolling_window_size")]
    pub rolling_window_size: usize,

    /// Token count above which the summary strategies compress history
    #[serde(default = "default_summary_threshold")]
    pub summary_threshold: usize,
}

fn default_rolling_window_size() -> usize {
    20
}

fn default_summary_threshold() -> usize {
    4000
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            strategy: OptimizationStrategy::default(),
            rolling_window_size: default_rolling_window_size(),
            summary_threshold: default_summary_threshold(),
        }
    }
}

/// Outcome of running a strategy over a chat
///
/// `optimized_tokens` is always the estimate of `messages`, and
/// `saved_tokens == original_tokens - optimized_tokens`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    /// Messages to send, in chat order
    pub messages: Vec<Message>,
    /// Estimated tokens of the input chat
    pub original_tokens: usize,
    /// Estimated tokens of `messages`
    pub optimized_tokens: usize,
    /// `original_tokens - optimized_tokens`
    pub saved_tokens: usize,
    /// Strategy that produced this result
    pub strategy: OptimizationStrategy,
    /// Synthesized summary message, when a prefix was compressed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Message>,
    /// Ids of the persisted messages replaced by `checkpoint`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub summarized_ids: Vec<i64>,
}

impl OptimizationResult {
    /// Result that sends the input unchanged
    pub(crate) fn unchanged(
        messages: &[Message],
        original_tokens: usize,
        strategy: OptimizationStrategy,
    ) -> Self {
        Self {
            messages: messages.to_vec(),
            original_tokens,
            optimized_tokens: original_tokens,
            saved_tokens: 0,
            strategy,
            checkpoint: None,
            summarized_ids: Vec::new(),
        }
    }

    /// Builds a result for a candidate message list, recomputing its tokens
    ///
    /// If the candidate would somehow cost more than the input (for example a
    /// summary longer than the single short message it replaces), the input
    /// is returned unchanged instead.
    pub(crate) fn from_candidate(
        original: &[Message],
        original_tokens: usize,
        candidate: Vec<Message>,
        checkpoint: Option<Message>,
        summarized_ids: Vec<i64>,
        strategy: OptimizationStrategy,
        estimator: &TokenEstimator,
    ) -> Self {
        let optimized_tokens = estimator.estimate_chat_tokens(&candidate);
        if optimized_tokens > original_tokens {
            tracing::debug!(
                strategy = %strategy,
                original_tokens,
                optimized_tokens,
                "Candidate larger than input, keeping original messages"
            );
            return Self::unchanged(original, original_tokens, strategy);
        }

        Self {
            messages: candidate,
            original_tokens,
            optimized_tokens,
            saved_tokens: original_tokens - optimized_tokens,
            strategy,
            checkpoint,
            summarized_ids,
        }
    }

    /// Returns true if the strategy removed or compressed anything
    pub fn is_reduced(&self) -> bool {
        self.saved_tokens > 0 || self.checkpoint.is_some()
    }
}

/// Rolling window followed by a smart summary of the window when the window
/// alone is still above `summary_threshold`
///
/// Summarization only ever sees at most `window_size` messages. The result
/// never costs more than plain [`rolling_window`] for the same inputs.
pub fn rolling_with_summary(
    messages: &[Message],
    window_size: usize,
    summary_threshold: usize,
    estimator: &TokenEstimator,
) -> OptimizationResult {
    let strategy = OptimizationStrategy::RollingWithSummary;
    let original_tokens = estimator.estimate_chat_tokens(messages);
    let windowed = rolling_window(messages, window_size, estimator);

    if windowed.optimized_tokens <= summary_threshold {
        return OptimizationResult {
            strategy,
            ..windowed
        };
    }

    tracing::debug!(
        window_tokens = windowed.optimized_tokens,
        summary_threshold,
        "Window still above threshold, summarizing window"
    );
    let summarized = smart_summary(&windowed.messages, summary_threshold, estimator);

    OptimizationResult::from_candidate(
        messages,
        original_tokens,
        summarized.messages,
        summarized.checkpoint,
        summarized.summarized_ids,
        strategy,
        estimator,
    )
}

/// Applies the strategy selected in `settings`
///
/// # Examples
///
/// ```
/// use ctxtrim::message::Message;
/// use ctxtrim::optimizer::{optimize, OptimizationSettings, OptimizationStrategy};
/// use ctxtrim::tokens::TokenEstimator;
///
/// let messages: Vec<Message> = (0..10)
///     .map(|i| Message::user(1, format!("message {}", i)))
///     .collect();
/// let settings = OptimizationSettings {
///     strategy: OptimizationStrategy::RollingWindow,
///     rolling_window_size: 4,
///     summary_threshold: 4000,
/// };
///
/// let result = optimize(&messages, &settings, &TokenEstimator::default());
/// assert_eq!(result.messages.len(), 4);
/// assert_eq!(result.saved_tokens, result.original_tokens - result.optimized_tokens);
/// ```
pub fn optimize(
    messages: &[Message],
    settings: &OptimizationSettings,
    estimator: &TokenEstimator,
) -> OptimizationResult {
    match settings.strategy {
        OptimizationStrategy::None => OptimizationResult::unchanged(
            messages,
            estimator.estimate_chat_tokens(messages),
            OptimizationStrategy::None,
        ),
        OptimizationStrategy::RollingWindow => {
            rolling_window(messages, settings.rolling_window_size, estimator)
        }
        OptimizationStrategy::SmartSummary => {
            smart_summary(messages, settings.summary_threshold, estimator)
        }
        OptimizationStrategy::RollingWithSummary => rolling_with_summary(
            messages,
            settings.rolling_window_size,
            settings.summary_threshold,
            estimator,
        ),
    }
}
