//! Preview and compress operations exposed to the surrounding application
//!
//! `get_optimization_preview` is read-only: it runs the configured strategy
//! and prices the chat before and after. `compress_chat_history` is the only
//! operation that mutates the message store. It saves the summary first and
//! only then deletes the originals it replaces, so a failed save never loses
//! history.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cost::{round_usd, CostAggregator, CostBreakdown, ProviderModel};
use crate::error::{CtxtrimError, Result};
use crate::message::Message;
use crate::metrics;
use crate::optimizer::summary::recent_count;
use crate::optimizer::{optimize, smart_summary, OptimizationResult, OptimizationSettings};
use crate::pricing::{PricingTable, PricingTier};
use crate::tokens::TokenEstimator;

/// Reason reported when a chat is already within the threshold
pub const NO_COMPRESSION_NEEDED: &str = "No compression needed";

/// Reason reported when a chat is over the threshold but has no messages
/// older than the retained recent block
pub const NOT_ENOUGH_MESSAGES: &str = "Not enough messages to summarize";

/// Reason reported when the summary would estimate above the messages it
/// replaces
pub const SUMMARY_NOT_SMALLER: &str = "Summary would not reduce tokens";

/// Message persistence owned by the surrounding application
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use ctxtrim::error::Result;
/// use ctxtrim::message::Message;
/// use ctxtrim::orchestrator::MessageStore;
///
/// struct NullStore;
///
/// #[async_trait]
/// impl MessageStore for NullStore {
///     async fn load_messages(&self, _chat_id: i64) -> Result<Vec<Message>> {
///         Ok(Vec::new())
///     }
///     async fn save_message(&self, message: Message) -> Result<Message> {
///         Ok(message.with_id(1))
///     }
///     async fn delete_message(&self, _id: i64) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Returns a chat's messages ordered by timestamp ascending
    async fn load_messages(&self, chat_id: i64) -> Result<Vec<Message>>;

    /// Persists a message and returns it with its assigned id
    async fn save_message(&self, message: Message) -> Result<Message>;

    /// Deletes a message by id
    async fn delete_message(&self, id: i64) -> Result<()>;
}

/// Before/after costs of a previewed optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewCosts {
    /// Cost of the full chat
    pub original: CostBreakdown,
    /// Cost of the optimized chat
    pub optimized: CostBreakdown,
}

/// Optimization result with cost comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationPreview {
    /// Strategy outcome
    #[serde(flatten)]
    pub result: OptimizationResult,
    /// Total cost of the full chat
    pub original_cost: f64,
    /// Total cost of the optimized chat
    pub optimized_cost: f64,
    /// `original_cost - optimized_cost`
    pub saved_cost: f64,
    /// Per-message breakdowns of both
    pub cost_breakdown: PreviewCosts,
}

/// Runs the configured strategy and prices the chat before and after
///
/// Messages without a recorded provider/model are priced at `fallback`.
pub fn get_optimization_preview(
    messages: &[Message],
    settings: &OptimizationSettings,
    fallback: &ProviderModel,
    estimator: &TokenEstimator,
    pricing: &PricingTable,
    tier: Option<PricingTier>,
) -> OptimizationPreview {
    let result = optimize(messages, settings, estimator);
    let aggregator = CostAggregator::new(pricing, estimator).with_tier(tier);

    let original = aggregator.estimate_accurate_chat_cost(messages, fallback);
    let optimized = aggregator.estimate_accurate_chat_cost(&result.messages, fallback);

    let original_cost = original.total_cost;
    let optimized_cost = optimized.total_cost;
    let saved_cost = round_usd(original_cost - optimized_cost);

    tracing::debug!(
        strategy = %result.strategy,
        original_tokens = result.original_tokens,
        optimized_tokens = result.optimized_tokens,
        saved_cost,
        "Computed optimization preview"
    );
    metrics::record_preview(&result);

    OptimizationPreview {
        result,
        original_cost,
        optimized_cost,
        saved_cost,
        cost_breakdown: PreviewCosts {
            original,
            optimized,
        },
    }
}

/// Outcome of a compress request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApplyResult {
    /// A summary was saved and the summarized originals deleted
    #[serde(rename_all = "camelCase")]
    Compressed {
        /// Always true
        success: bool,
        /// The persisted summary, with its store id
        summary_message: Message,
        /// Number of originals deleted
        deleted_count: usize,
        /// Tokens saved by the compression
        saved_tokens: usize,
    },
    /// Nothing was changed
    Skipped {
        /// Always false
        success: bool,
        /// Why no compression happened
        reason: String,
    },
}

impl ApplyResult {
    fn skipped(reason: impl Into<String>) -> Self {
        ApplyResult::Skipped {
            success: false,
            reason: reason.into(),
        }
    }

    /// Returns true if the store was changed
    pub fn success(&self) -> bool {
        matches!(self, ApplyResult::Compressed { .. })
    }
}

/// Compresses a chat in place: saves a summary of its older messages and
/// deletes the originals the summary replaces
///
/// Calling this on a chat already at or below `threshold` is a no-op that
/// returns [`ApplyResult::Skipped`], so repeated calls are safe.
///
/// # Errors
///
/// Returns [`CtxtrimError::Persistence`] naming the failed store operation.
/// If saving the summary fails nothing is deleted. If a delete fails, the
/// summary and any originals not yet deleted remain in the store.
pub async fn compress_chat_history<S: MessageStore + ?Sized>(
    store: &S,
    messages: &[Message],
    threshold: usize,
    estimator: &TokenEstimator,
) -> Result<ApplyResult> {
    let result = smart_summary(messages, threshold, estimator);

    let Some(checkpoint) = result.checkpoint else {
        let reason = if result.original_tokens <= threshold {
            NO_COMPRESSION_NEEDED
        } else if recent_count(messages.len()) >= messages.len() {
            NOT_ENOUGH_MESSAGES
        } else {
            SUMMARY_NOT_SMALLER
        };
        tracing::debug!(
            tokens = result.original_tokens,
            threshold,
            reason,
            "Nothing to compress"
        );
        return Ok(ApplyResult::skipped(reason));
    };

    // The checkpoint replaces everything before the retained suffix.
    let summarized_count = messages.len() + 1 - result.messages.len();
    if result.summarized_ids.len() != summarized_count {
        return Err(CtxtrimError::Storage(format!(
            "Cannot compress unpersisted messages: {} of {} summarized messages have no id",
            summarized_count - result.summarized_ids.len(),
            summarized_count
        ))
        .into());
    }

    let summary_message = store.save_message(checkpoint).await.map_err(|e| {
        metrics::record_compression_error("save_message");
        CtxtrimError::Persistence {
            operation: "save_message".to_string(),
            message: format!("{:#}", e),
        }
    })?;

    let mut deleted_count = 0;
    for id in &result.summarized_ids {
        if let Err(e) = store.delete_message(*id).await {
            metrics::record_compression_error("delete_message");
            tracing::warn!(
                id,
                deleted_count,
                remaining = result.summarized_ids.len() - deleted_count,
                "Delete failed after summary was saved"
            );
            return Err(CtxtrimError::Persistence {
                operation: format!("delete_message({})", id),
                message: format!(
                    "{:#} ({} of {} originals already deleted)",
                    e,
                    deleted_count,
                    result.summarized_ids.len()
                ),
            }
            .into());
        }
        deleted_count += 1;
    }

    tracing::info!(
        chat_id = summary_message.chat_id,
        deleted_count,
        saved_tokens = result.saved_tokens,
        "Compressed chat history"
    );
    metrics::record_compression(deleted_count, result.saved_tokens);

    Ok(ApplyResult::Compressed {
        success: true,
        summary_message,
        deleted_count,
        saved_tokens: result.saved_tokens,
    })
}
