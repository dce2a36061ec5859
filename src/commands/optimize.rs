//! Preview and compress commands

use crate::commands::{format_usd, preview_text, print_json};
use crate::config::Config;
use crate::error::{CtxtrimError, Result};
use crate::optimizer::{OptimizationSettings, OptimizationStrategy};
use crate::orchestrator::{
    compress_chat_history, get_optimization_preview, ApplyResult, OptimizationPreview,
};
use crate::storage::SqliteStorage;
use colored::Colorize;
use prettytable::{cell, format, row, Table};

/// Applies per-invocation overrides on top of the configured settings
///
/// # Errors
///
/// Returns a configuration error for an unknown strategy or a zero
/// window or threshold
pub fn resolve_settings(
    config: &Config,
    strategy: Option<&str>,
    window: Option<usize>,
    threshold: Option<usize>,
) -> Result<OptimizationSettings> {
    let mut settings = config.optimization;

    if let Some(strategy) = strategy {
        settings.strategy = strategy.parse::<OptimizationStrategy>()?;
    }
    if let Some(window) = window {
        settings.rolling_window_size = window;
    }
    if let Some(threshold) = threshold {
        settings.summary_threshold = threshold;
    }

    if settings.rolling_window_size == 0 {
        return Err(CtxtrimError::Config("Window size must be greater than 0".to_string()).into());
    }
    if settings.summary_threshold == 0 {
        return Err(CtxtrimError::Config("Threshold must be greater than 0".to_string()).into());
    }

    Ok(settings)
}

/// Computes the preview for a stored chat without changing it
pub fn build_preview(
    config: &Config,
    storage: &SqliteStorage,
    chat_id: i64,
    settings: &OptimizationSettings,
) -> Result<OptimizationPreview> {
    let messages = storage.load_chat(chat_id)?;
    let pricing = config.pricing_table()?;
    let estimator = config.token_estimator();

    Ok(get_optimization_preview(
        &messages,
        settings,
        &config.fallback_model(),
        &estimator,
        &pricing,
        Some(config.pricing.tier),
    ))
}

/// Preview an optimization strategy for a chat
pub fn run_preview(
    config: &Config,
    storage: &SqliteStorage,
    chat_id: i64,
    strategy: Option<&str>,
    window: Option<usize>,
    threshold: Option<usize>,
    json: bool,
) -> Result<()> {
    let settings = resolve_settings(config, strategy, window, threshold)?;
    tracing::info!(chat_id, strategy = %settings.strategy, "Previewing optimization");

    let preview = build_preview(config, storage, chat_id, &settings)?;

    if json {
        return print_json(&preview);
    }

    let result = &preview.result;
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row!["".bold(), "Original".bold(), "Optimized".bold(), "Saved".bold()]);
    table.add_row(row![
        "Messages",
        preview.cost_breakdown.original.breakdown.len(),
        result.messages.len(),
        preview
            .cost_breakdown
            .original
            .breakdown
            .len()
            .saturating_sub(result.messages.len())
    ]);
    table.add_row(row![
        "Tokens",
        result.original_tokens,
        result.optimized_tokens,
        result.saved_tokens.to_string().green()
    ]);
    table.add_row(row![
        "Cost",
        format_usd(preview.original_cost),
        format_usd(preview.optimized_cost),
        format_usd(preview.saved_cost).green()
    ]);

    println!(
        "\nPreview for chat {} using {}:",
        chat_id,
        result.strategy.to_string().cyan()
    );
    table.printstd();

    if let Some(checkpoint) = &result.checkpoint {
        println!(
            "Summary would replace {} message(s): {}",
            result.summarized_ids.len(),
            preview_text(&checkpoint.content, 60).italic()
        );
    } else if !result.is_reduced() {
        println!("{}", "No reduction for this chat.".yellow());
    }
    println!();
    Ok(())
}

/// Compress a stored chat, persisting a summary and deleting what it replaces
pub async fn run_compress(
    config: &Config,
    storage: &SqliteStorage,
    chat_id: i64,
    threshold: Option<usize>,
    json: bool,
) -> Result<ApplyResult> {
    let settings = resolve_settings(config, None, None, threshold)?;
    let estimator = config.token_estimator();
    let messages = storage.load_chat(chat_id)?;

    tracing::info!(
        chat_id,
        messages = messages.len(),
        threshold = settings.summary_threshold,
        "Compressing chat"
    );

    let outcome =
        compress_chat_history(storage, &messages, settings.summary_threshold, &estimator).await?;

    if json {
        print_json(&outcome)?;
        return Ok(outcome);
    }

    match &outcome {
        ApplyResult::Compressed {
            summary_message,
            deleted_count,
            saved_tokens,
            ..
        } => {
            println!(
                "{}",
                format!(
                    "Compressed chat {}: {} message(s) replaced by summary {}, {} tokens saved",
                    chat_id,
                    deleted_count,
                    summary_message
                        .id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    saved_tokens
                )
                .green()
            );
        }
        ApplyResult::Skipped { reason, .. } => {
            println!("{}", reason.yellow());
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::conversation;
    use tempfile::tempdir;

    fn create_test_storage() -> (SqliteStorage, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let storage = SqliteStorage::new_with_path(dir.path().join("history.db"))
            .expect("failed to create storage");
        (storage, dir)
    }

    #[test]
    fn test_resolve_settings_defaults_from_config() {
        let settings = resolve_settings(&Config::default(), None, None, None).unwrap();
        assert_eq!(settings, OptimizationSettings::default());
    }

    #[test]
    fn test_resolve_settings_applies_overrides() {
        let settings =
            resolve_settings(&Config::default(), Some("smart_summary"), Some(6), Some(900))
                .unwrap();
        assert_eq!(settings.strategy, OptimizationStrategy::SmartSummary);
        assert_eq!(settings.rolling_window_size, 6);
        assert_eq!(settings.summary_threshold, 900);
    }

    #[test]
    fn test_resolve_settings_rejects_bad_values() {
        let config = Config::default();
        assert!(resolve_settings(&config, Some("shrink"), None, None).is_err());
        assert!(resolve_settings(&config, None, Some(0), None).is_err());
        assert!(resolve_settings(&config, None, None, Some(0)).is_err());
    }

    #[test]
    fn test_build_preview_does_not_modify_store() {
        let (storage, _dir) = create_test_storage();
        let stored = storage.import_messages(conversation(10, 30)).unwrap();
        let settings = resolve_settings(&Config::default(), Some("rolling-window"), Some(4), None)
            .unwrap();

        let preview = build_preview(&Config::default(), &storage, 1, &settings).unwrap();
        assert_eq!(preview.result.messages.len(), 4);
        assert!(preview.saved_cost >= 0.0);
        assert_eq!(storage.load_chat(1).unwrap(), stored);
    }

    #[tokio::test]
    async fn test_run_compress_replaces_prefix_with_summary() {
        let (storage, _dir) = create_test_storage();
        storage.import_messages(conversation(10, 30)).unwrap();

        let outcome = run_compress(&Config::default(), &storage, 1, Some(100), true)
            .await
            .unwrap();
        assert!(outcome.success());

        let remaining = storage.load_chat(1).unwrap();
        assert!(remaining[0].is_summary());
        assert_eq!(remaining.len(), 1 + 6);
    }

    #[tokio::test]
    async fn test_run_compress_below_threshold_is_skipped() {
        let (storage, _dir) = create_test_storage();
        let stored = storage.import_messages(conversation(2, 5)).unwrap();

        let outcome = run_compress(&Config::default(), &storage, 1, None, false)
            .await
            .unwrap();
        assert!(!outcome.success());
        assert_eq!(storage.load_chat(1).unwrap(), stored);
    }
}
