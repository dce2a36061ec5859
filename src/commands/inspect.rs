use crate::commands::{format_usd, preview_text, print_json};
use crate::config::Config;
use crate::cost::{ChatCostEstimate, CostAggregator, CostBreakdown};
use crate::error::Result;
use crate::message::Message;
use crate::storage::SqliteStorage;
use colored::Colorize;
use prettytable::{cell, format, row, Table};
use serde::Serialize;

/// Token estimate for a single message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTokens {
    /// Store id
    pub message_id: Option<i64>,
    /// `user` or `assistant`
    pub role: String,
    /// Estimated tokens including overheads
    pub tokens: usize,
    /// True for synthesized summaries
    pub summary: bool,
}

/// Token report for a chat
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReport {
    /// Chat identifier
    pub chat_id: i64,
    /// Per-message estimates, in chat order
    pub messages: Vec<MessageTokens>,
    /// Sum over all messages
    pub total_tokens: usize,
}

/// Cost report for a chat
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostReport {
    /// Chat identifier
    pub chat_id: i64,
    /// Each message priced at its own model
    pub accurate: CostBreakdown,
    /// Whole chat priced at the fallback model
    pub blended: ChatCostEstimate,
}

/// Builds the token report for already loaded messages
pub fn token_report(config: &Config, chat_id: i64, messages: &[Message]) -> TokenReport {
    let estimator = config.token_estimator();
    let rows: Vec<MessageTokens> = messages
        .iter()
        .map(|m| MessageTokens {
            message_id: m.id,
            role: m.role.to_string(),
            tokens: estimator.estimate_message_tokens(m),
            summary: m.is_summary(),
        })
        .collect();
    let total_tokens = rows.iter().map(|r| r.tokens).sum();

    TokenReport {
        chat_id,
        messages: rows,
        total_tokens,
    }
}

/// Builds the cost report for already loaded messages
pub fn cost_report(config: &Config, chat_id: i64, messages: &[Message]) -> Result<CostReport> {
    let pricing = config.pricing_table()?;
    let estimator = config.token_estimator();
    let fallback = config.fallback_model();
    let aggregator =
        CostAggregator::new(&pricing, &estimator).with_tier(Some(config.pricing.tier));

    Ok(CostReport {
        chat_id,
        accurate: aggregator.estimate_accurate_chat_cost(messages, &fallback),
        blended: aggregator.estimate_chat_cost(messages, &fallback.provider, &fallback.model),
    })
}

/// List stored chats
pub fn list_chats(storage: &SqliteStorage, json: bool) -> Result<()> {
    let chats = storage.list_chats()?;

    if json {
        return print_json(&chats);
    }

    if chats.is_empty() {
        println!("{}", "No chats found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row![
        "Chat".bold(),
        "Messages".bold(),
        "Summaries".bold(),
        "First".bold(),
        "Last".bold()
    ]);

    for chat in chats {
        table.add_row(row![
            chat.chat_id.to_string().cyan(),
            chat.message_count,
            chat.summary_count,
            chat.first_timestamp.format("%Y-%m-%d %H:%M"),
            chat.last_timestamp.format("%Y-%m-%d %H:%M")
        ]);
    }

    println!("\nStored chats:");
    table.printstd();
    println!();
    Ok(())
}

/// Show per-message token estimates for a chat
pub fn show_tokens(
    config: &Config,
    storage: &SqliteStorage,
    chat_id: i64,
    json: bool,
) -> Result<()> {
    let messages = storage.load_chat(chat_id)?;
    let report = token_report(config, chat_id, &messages);

    if json {
        return print_json(&report);
    }

    if messages.is_empty() {
        println!("{}", format!("No messages found for chat {}.", chat_id).yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row!["ID".bold(), "Role".bold(), "Tokens".bold(), "Content".bold()]);

    for (message, estimate) in messages.iter().zip(&report.messages) {
        let id = estimate
            .message_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let role = if estimate.summary {
            "summary".magenta().to_string()
        } else {
            estimate.role.clone()
        };
        table.add_row(row![
            id.cyan(),
            role,
            estimate.tokens,
            preview_text(&message.content, 50)
        ]);
    }

    println!("\nToken estimates for chat {}:", chat_id);
    table.printstd();
    println!("Total: {} tokens\n", report.total_tokens.to_string().bold());
    Ok(())
}

/// Show the estimated cost of a chat
pub fn show_cost(
    config: &Config,
    storage: &SqliteStorage,
    chat_id: i64,
    json: bool,
) -> Result<()> {
    let messages = storage.load_chat(chat_id)?;
    let report = cost_report(config, chat_id, &messages)?;

    if json {
        return print_json(&report);
    }

    if messages.is_empty() {
        println!("{}", format!("No messages found for chat {}.", chat_id).yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row![
        "ID".bold(),
        "Role".bold(),
        "Provider".bold(),
        "Model".bold(),
        "Tokens".bold(),
        "Cost".bold()
    ]);

    for entry in &report.accurate.breakdown {
        let id = entry
            .message_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(row![
            id.cyan(),
            entry.role,
            entry.provider,
            entry.model,
            entry.tokens,
            format_usd(entry.cost)
        ]);
    }

    println!("\nCost for chat {} ({} tier):", chat_id, config.pricing.tier);
    table.printstd();
    println!();
    println!("Input:            {}", format_usd(report.accurate.input_cost));
    println!(
        "Output:           {}",
        format_usd(report.accurate.estimated_output_cost)
    );
    println!(
        "Total:            {}",
        format_usd(report.accurate.total_cost).green().bold()
    );
    println!(
        "Blended estimate: {} ({} in / {} out tokens at {}/{})",
        format_usd(report.blended.total_cost),
        report.blended.input_tokens,
        report.blended.estimated_output_tokens,
        config.fallback.provider,
        config.fallback.model
    );
    println!();
    Ok(())
}
