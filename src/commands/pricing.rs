//! Pricing lookup command

use crate::commands::{format_usd, print_json};
use crate::config::Config;
use crate::error::Result;
use crate::pricing::{normalize_provider, PricingTable, PricingTier, PRICING_DATE};
use colored::Colorize;
use prettytable::{cell, format, row, Table};
use serde::Serialize;

/// One resolved rate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingRow {
    /// Normalized provider name
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Tier the rate was resolved at
    pub tier: PricingTier,
    /// USD per 1000 input tokens
    pub input: f64,
    /// USD per 1000 output tokens
    pub output: f64,
    /// True when the model is not in the table and the fallback rate applies
    pub fallback: bool,
}

/// Resolves the rows to display
///
/// With a provider and model, returns that single rate (falling back when
/// unknown). With only a provider, lists that provider's models. With
/// neither, lists the whole table.
pub fn pricing_rows(
    table: &PricingTable,
    tier: PricingTier,
    provider: Option<&str>,
    model: Option<&str>,
) -> Vec<PricingRow> {
    let entries = table.entries();
    let wanted = provider.map(normalize_provider);

    if let (Some(provider), Some(model)) = (wanted.as_deref(), model) {
        let pricing = table.get_model_pricing(provider, model, Some(tier));
        let known = entries.iter().any(|(p, m, _)| p == provider && m == model);
        return vec![PricingRow {
            provider: provider.to_string(),
            model: model.to_string(),
            tier,
            input: pricing.input,
            output: pricing.output,
            fallback: !known,
        }];
    }

    entries
        .into_iter()
        .filter(|(p, _, _)| wanted.as_deref().map_or(true, |w| w == p))
        .map(|(provider, model, _)| {
            let pricing = table.get_model_pricing(&provider, &model, Some(tier));
            PricingRow {
                provider,
                model,
                tier,
                input: pricing.input,
                output: pricing.output,
                fallback: false,
            }
        })
        .collect()
}

/// Show pricing rates
pub fn show_pricing(
    config: &Config,
    provider: Option<&str>,
    model: Option<&str>,
    json: bool,
) -> Result<()> {
    let table = config.pricing_table()?;
    let rows = pricing_rows(&table, config.pricing.tier, provider, model);

    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!(
            "{}",
            format!("No pricing entries for {}.", provider.unwrap_or("-")).yellow()
        );
        return Ok(());
    }

    let mut out = Table::new();
    out.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    out.add_row(row![
        "Provider".bold(),
        "Model".bold(),
        "Input / 1K".bold(),
        "Output / 1K".bold()
    ]);

    for entry in &rows {
        let model = if entry.fallback {
            format!("{} (fallback)", entry.model).yellow().to_string()
        } else {
            entry.model.clone()
        };
        out.add_row(row![
            entry.provider.cyan(),
            model,
            format_usd(entry.input),
            format_usd(entry.output)
        ]);
    }

    println!(
        "\nPricing ({} tier, rates as of {}):",
        config.pricing.tier, PRICING_DATE
    );
    out.printstd();
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::FALLBACK_PRICING;

    #[test]
    fn test_single_lookup_known_model() {
        let table = PricingTable::default();
        let rows = pricing_rows(
            &table,
            PricingTier::Standard,
            Some("Anthropic"),
            Some("claude-3-5-haiku-20241022"),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].provider, "claude");
        assert_eq!(rows[0].input, 0.0008);
        assert!(!rows[0].fallback);
    }

    #[test]
    fn test_single_lookup_unknown_model_falls_back() {
        let table = PricingTable::default();
        let rows = pricing_rows(&table, PricingTier::Standard, Some("openai"), Some("gpt-9"));
        assert!(rows[0].fallback);
        assert_eq!(rows[0].input, FALLBACK_PRICING.input);
        assert_eq!(rows[0].output, FALLBACK_PRICING.output);
    }

    #[test]
    fn test_provider_listing_filters_and_applies_tier() {
        let table = PricingTable::default();
        let standard = pricing_rows(&table, PricingTier::Standard, Some("openai"), None);
        let batch = pricing_rows(&table, PricingTier::Batch, Some("openai"), None);

        assert!(!standard.is_empty());
        assert!(standard.iter().all(|r| r.provider == "openai"));

        let std_4o = standard.iter().find(|r| r.model == "gpt-4o").unwrap();
        let batch_4o = batch.iter().find(|r| r.model == "gpt-4o").unwrap();
        assert!(batch_4o.input < std_4o.input);
    }

    #[test]
    fn test_full_listing_covers_all_providers() {
        let rows = pricing_rows(&PricingTable::default(), PricingTier::Standard, None, None);
        for provider in ["claude", "deepseek", "openai"] {
            assert!(rows.iter().any(|r| r.provider == provider));
        }
    }

    #[test]
    fn test_unknown_provider_listing_is_empty() {
        let rows = pricing_rows(&PricingTable::default(), PricingTier::Standard, Some("acme"), None);
        assert!(rows.is_empty());
    }
}
