//! Cost accounting for chats
//!
//! Costs are attributed per message to the provider/model recorded on that
//! message, so a chat that switched models part-way is priced at each
//! model's own rate. Messages without a recorded provider/model (typically
//! user messages) are priced at a caller-supplied fallback.

use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};
use crate::pricing::{PricingTable, PricingTier};
use crate::tokens::TokenEstimator;

/// Share of input tokens assumed as output by [`CostAggregator::estimate_chat_cost`]
pub const OUTPUT_TOKEN_RATIO: usize = 5;

/// Which side of the rate to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Prompt tokens
    Input,
    /// Completion tokens
    Output,
}

impl TokenType {
    /// Assistant messages are billed as output, everything else as input
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Assistant => TokenType::Output,
            Role::User => TokenType::Input,
        }
    }
}

/// A provider/model pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderModel {
    /// Provider name, e.g. `openai`
    pub provider: String,
    /// Model id, e.g. `gpt-4o`
    pub model: String,
}

impl ProviderModel {
    /// Creates a new pair
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

/// Resolves the provider/model a message should be priced at
///
/// Each field comes from the message when recorded, otherwise from
/// `fallback`. Summary messages carry sentinel values rather than a real
/// model, so they always resolve to `fallback`.
///
/// # Examples
///
/// ```
/// use ctxtrim::cost::{resolve_provider_model, ProviderModel};
/// use ctxtrim::message::Message;
///
/// let fallback = ProviderModel::new("openai", "gpt-4o");
/// let user = Message::user(1, "hi");
/// assert_eq!(resolve_provider_model(&user, &fallback), fallback);
///
/// let reply = Message::assistant(1, "hello").with_provider_model("deepseek", "deepseek-chat");
/// assert_eq!(resolve_provider_model(&reply, &fallback).provider, "deepseek");
/// ```
pub fn resolve_provider_model(message: &Message, fallback: &ProviderModel) -> ProviderModel {
    if message.is_summary() {
        return fallback.clone();
    }

    ProviderModel {
        provider: message
            .provider
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| fallback.provider.clone()),
        model: message
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.model.clone()),
    }
}

/// Rounds a USD amount to 6 decimal places
pub fn round_usd(amount: f64) -> f64 {
    (amount * 1_000_000.0).round() / 1_000_000.0
}

/// Cost of `tokens` at the resolved rate: `tokens / 1000 * rate`, rounded to
/// 6 decimals
///
/// # Examples
///
/// ```
/// use ctxtrim::cost::{estimate_cost, TokenType};
/// use ctxtrim::pricing::PricingTable;
///
/// let table = PricingTable::default();
/// assert_eq!(estimate_cost(&table, 0, "openai", "gpt-4o", TokenType::Input, None), 0.0);
/// assert_eq!(estimate_cost(&table, 1000, "openai", "gpt-4o", TokenType::Input, None), 0.0025);
/// ```
pub fn estimate_cost(
    pricing: &PricingTable,
    tokens: usize,
    provider: &str,
    model: &str,
    token_type: TokenType,
    tier: Option<PricingTier>,
) -> f64 {
    if tokens == 0 {
        return 0.0;
    }

    let rates = pricing.get_model_pricing(provider, model, tier);
    let rate = match token_type {
        TokenType::Input => rates.input,
        TokenType::Output => rates.output,
    };

    round_usd(tokens as f64 / 1000.0 * rate)
}

/// Cost attributed to one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    /// Store id of the message, if persisted
    pub message_id: Option<i64>,
    /// Provider the message was priced at
    pub provider: String,
    /// Model the message was priced at
    pub model: String,
    /// Estimated tokens of the message
    pub tokens: usize,
    /// USD cost of the message
    pub cost: f64,
    /// Message role
    pub role: Role,
}

/// Per-message cost attribution with totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    /// Sum of input-priced message costs
    pub input_cost: f64,
    /// Sum of output-priced message costs
    pub estimated_output_cost: f64,
    /// `input_cost + estimated_output_cost`
    pub total_cost: f64,
    /// One entry per message, in chat order
    pub breakdown: Vec<CostEntry>,
}

impl CostBreakdown {
    /// Total estimated tokens across all entries
    pub fn total_tokens(&self) -> usize {
        self.breakdown.iter().map(|e| e.tokens).sum()
    }
}

/// Blended single-rate estimate for a whole chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCostEstimate {
    /// Estimated tokens of the whole chat
    pub input_tokens: usize,
    /// Assumed output tokens (a fifth of the input)
    pub estimated_output_tokens: usize,
    /// Input cost at the given rate
    pub input_cost: f64,
    /// Output cost at the given rate
    pub estimated_output_cost: f64,
    /// Sum of both
    pub total_cost: f64,
}

/// Combines token estimates and pricing into chat costs
#[derive(Debug, Clone, Copy)]
pub struct CostAggregator<'a> {
    pricing: &'a PricingTable,
    estimator: &'a TokenEstimator,
    tier: Option<PricingTier>,
}

impl<'a> CostAggregator<'a> {
    /// Creates an aggregator over a pricing table and estimator
    pub fn new(pricing: &'a PricingTable, estimator: &'a TokenEstimator) -> Self {
        Self {
            pricing,
            estimator,
            tier: None,
        }
    }

    /// Prices OpenAI models at the given tier where available
    pub fn with_tier(mut self, tier: Option<PricingTier>) -> Self {
        self.tier = tier;
        self
    }

    /// Prices each message at its own provider/model
    ///
    /// Assistant messages are billed at output rates and user messages at
    /// input rates. Missing provider/model fields resolve through
    /// [`resolve_provider_model`].
    pub fn estimate_accurate_chat_cost(
        &self,
        messages: &[Message],
        fallback: &ProviderModel,
    ) -> CostBreakdown {
        let mut input_cost = 0.0;
        let mut output_cost = 0.0;
        let mut breakdown = Vec::with_capacity(messages.len());

        for message in messages {
            let resolved = resolve_provider_model(message, fallback);
            let tokens = self.estimator.estimate_message_tokens(message);
            let token_type = TokenType::for_role(message.role);
            let cost = estimate_cost(
                self.pricing,
                tokens,
                &resolved.provider,
                &resolved.model,
                token_type,
                self.tier,
            );

            match token_type {
                TokenType::Input => input_cost += cost,
                TokenType::Output => output_cost += cost,
            }

            breakdown.push(CostEntry {
                message_id: message.id,
                provider: resolved.provider,
                model: resolved.model,
                tokens,
                cost,
                role: message.role,
            });
        }

        let input_cost = round_usd(input_cost);
        let estimated_output_cost = round_usd(output_cost);

        CostBreakdown {
            input_cost,
            estimated_output_cost,
            total_cost: round_usd(input_cost + estimated_output_cost),
            breakdown,
        }
    }

    /// Prices the whole chat as input at one provider/model, plus an assumed
    /// output of a fifth of the input tokens at the output rate
    pub fn estimate_chat_cost(
        &self,
        messages: &[Message],
        provider: &str,
        model: &str,
    ) -> ChatCostEstimate {
        let input_tokens = self.estimator.estimate_chat_tokens(messages);
        let estimated_output_tokens = input_tokens / OUTPUT_TOKEN_RATIO;

        let input_cost = estimate_cost(
            self.pricing,
            input_tokens,
            provider,
            model,
            TokenType::Input,
            self.tier,
        );
        let estimated_output_cost = estimate_cost(
            self.pricing,
            estimated_output_tokens,
            provider,
            model,
            TokenType::Output,
            self.tier,
        );

        ChatCostEstimate {
            input_tokens,
            estimated_output_tokens,
            input_cost,
            estimated_output_cost,
            total_cost: round_usd(input_cost + estimated_output_cost),
        }
    }
}
