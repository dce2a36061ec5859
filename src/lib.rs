//! ctxtrim - chat history token optimization and cost accounting
//!
//! This library estimates how many tokens a chat will consume, prices it per
//! provider and model, and reduces long histories before they are sent to a
//! model.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `tokens`: Heuristic token estimator
//! - `pricing`: Per-provider, per-model rate table with tier support
//! - `optimizer`: Rolling window, smart summary and hybrid strategies
//! - `cost`: Per-message and blended chat cost aggregation
//! - `orchestrator`: Preview with cost comparison and in-place compression
//! - `storage`: SQLite message store used by the CLI
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`, `commands`: Command-line interface
//!
//! # Example
//!
//! ```
//! use ctxtrim::cost::ProviderModel;
//! use ctxtrim::message::Message;
//! use ctxtrim::optimizer::OptimizationSettings;
//! use ctxtrim::orchestrator::get_optimization_preview;
//! use ctxtrim::pricing::PricingTable;
//! use ctxtrim::tokens::TokenEstimator;
//!
//! let messages: Vec<Message> = (0..40)
//!     .map(|i| Message::user(1, format!("Message number {}", i)))
//!     .collect();
//!
//! let preview = get_optimization_preview(
//!     &messages,
//!     &OptimizationSettings::default(),
//!     &ProviderModel::new("openai", "gpt-4o"),
//!     &TokenEstimator::default(),
//!     &PricingTable::default(),
//!     None,
//! );
//! assert!(preview.result.optimized_tokens <= preview.result.original_tokens);
//! assert!(preview.saved_cost >= 0.0);
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod cost;
pub mod error;
pub mod message;
pub mod metrics;
pub mod optimizer;
pub mod orchestrator;
pub mod pricing;
pub mod storage;
pub mod tokens;

// Re-export commonly used types
pub use config::Config;
pub use cost::{CostAggregator, CostBreakdown, ProviderModel};
pub use error::{CtxtrimError, Result};
pub use message::{Message, Role};
pub use optimizer::{optimize, OptimizationResult, OptimizationSettings, OptimizationStrategy};
pub use orchestrator::{
    compress_chat_history, get_optimization_preview, ApplyResult, MessageStore,
    OptimizationPreview,
};
pub use pricing::{PricingTable, PricingTier};
pub use tokens::TokenEstimator;

#[cfg(test)]
pub mod test_utils;
