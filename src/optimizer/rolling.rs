//! Rolling window: keep the most recent messages, drop the rest

use super::{OptimizationResult, OptimizationStrategy};
use crate::message::Message;
use crate::tokens::TokenEstimator;

/// Keeps the last `window_size` messages in storage order
///
/// Chats at or below the window size are returned unchanged. No summary is
/// created for the dropped prefix.
///
/// # Examples
///
/// ```
/// use ctxtrim::message::Message;
/// use ctxtrim::optimizer::rolling_window;
/// use ctxtrim::tokens::TokenEstimator;
///
/// let messages: Vec<Message> = (0..6).map(|i| Message::user(1, format!("m{}", i))).collect();
/// let result = rolling_window(&messages, 2, &TokenEstimator::default());
/// assert_eq!(result.messages, messages[4..].to_vec());
/// ```
pub fn rolling_window(
    messages: &[Message],
    window_size: usize,
    estimator: &TokenEstimator,
) -> OptimizationResult {
    let strategy = OptimizationStrategy::RollingWindow;
    let original_tokens = estimator.estimate_chat_tokens(messages);

    if messages.len() <= window_size {
        return OptimizationResult::unchanged(messages, original_tokens, strategy);
    }

    let start = messages.len() - window_size;
    tracing::debug!(
        dropped = start,
        kept = window_size,
        "Applying rolling window"
    );

    OptimizationResult::from_candidate(
        messages,
        original_tokens,
        messages[start..].to_vec(),
        None,
        Vec::new(),
        strategy,
        estimator,
    )
}
