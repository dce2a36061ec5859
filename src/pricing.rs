//! Per-provider, per-model pricing table
//!
//! Rates are USD per 1000 tokens. The built-in table is plain data and is
//! expected to drift from vendor price lists; unknown providers and models
//! resolve to [`FALLBACK_PRICING`] instead of failing.
//!
//! A YAML file can add or override entries:
//!
//! ```yaml
//! providers:
//!   openai:
//!     gpt-4o: { input: 0.0025, output: 0.01 }
//! openai_tiers:
//!   batch:
//!     gpt-4o: { input: 0.00125, output: 0.005 }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{CtxtrimError, Result};

/// Date the built-in rates were taken from vendor price lists
pub const PRICING_DATE: &str = "2025-08-01";

/// Rate used when a provider or model is not in the table
pub const FALLBACK_PRICING: ModelPricing = ModelPricing {
    input: 0.001,
    output: 0.002,
};

/// Input and output cost per 1000 tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// USD per 1000 prompt tokens
    pub input: f64,
    /// USD per 1000 completion tokens
    pub output: f64,
}

/// Vendor billing mode
///
/// Only OpenAI publishes tiered rates; the tier is ignored for other
/// providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingTier {
    /// Regular synchronous API pricing
    #[default]
    Standard,
    /// Asynchronous batch API
    Batch,
    /// Lower-priority processing
    Flex,
    /// Guaranteed-capacity processing
    Priority,
}

impl PricingTier {
    /// Returns the lowercase name of the tier
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingTier::Standard => "standard",
            PricingTier::Batch => "batch",
            PricingTier::Flex => "flex",
            PricingTier::Priority => "priority",
        }
    }
}

impl fmt::Display for PricingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingTier {
    type Err = CtxtrimError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(PricingTier::Standard),
            "batch" => Ok(PricingTier::Batch),
            "flex" => Ok(PricingTier::Flex),
            "priority" => Ok(PricingTier::Priority),
            other => Err(CtxtrimError::Config(format!(
                "Invalid pricing tier: {}. Must be one of: standard, batch, flex, priority",
                other
            ))),
        }
    }
}

// (model, input, output)
type RateRow = (&'static str, f64, f64);

const OPENAI_STANDARD: &[RateRow] = &[
    ("gpt-5", 0.00125, 0.01),
    ("gpt-5-mini", 0.00025, 0.002),
    ("gpt-5-nano", 0.00005, 0.0004),
    ("gpt-4.1", 0.002, 0.008),
    ("gpt-4.1-mini", 0.0004, 0.0016),
    ("gpt-4.1-nano", 0.0001, 0.0004),
    ("gpt-4o", 0.0025, 0.01),
    ("gpt-4o-mini", 0.00015, 0.0006),
    ("o1", 0.015, 0.06),
    ("o3", 0.002, 0.008),
    ("o3-mini", 0.0011, 0.0044),
    ("o4-mini", 0.0011, 0.0044),
];

const OPENAI_BATCH: &[RateRow] = &[
    ("gpt-5", 0.000625, 0.005),
    ("gpt-5-mini", 0.000125, 0.001),
    ("gpt-5-nano", 0.000025, 0.0002),
    ("gpt-4.1", 0.001, 0.004),
    ("gpt-4.1-mini", 0.0002, 0.0008),
    ("gpt-4.1-nano", 0.00005, 0.0002),
    ("gpt-4o", 0.00125, 0.005),
    ("gpt-4o-mini", 0.000075, 0.0003),
    ("o3", 0.001, 0.004),
    ("o4-mini", 0.00055, 0.0022),
];

const OPENAI_FLEX: &[RateRow] = &[
    ("gpt-5", 0.000625, 0.005),
    ("gpt-5-mini", 0.000125, 0.001),
    ("gpt-5-nano", 0.000025, 0.0002),
    ("o3", 0.001, 0.004),
    ("o4-mini", 0.00055, 0.0022),
];

const OPENAI_PRIORITY: &[RateRow] = &[
    ("gpt-5", 0.0025, 0.02),
    ("gpt-5-mini", 0.00045, 0.0036),
    ("gpt-4.1", 0.0035, 0.014),
    ("gpt-4.1-mini", 0.0007, 0.0028),
    ("gpt-4.1-nano", 0.0002, 0.0008),
    ("gpt-4o", 0.00425, 0.017),
    ("gpt-4o-mini", 0.00025, 0.001),
    ("o3", 0.0035, 0.014),
    ("o4-mini", 0.002, 0.008),
];

const CLAUDE_STANDARD: &[RateRow] = &[
    ("claude-opus-4-1-20250805", 0.015, 0.075),
    ("claude-opus-4-20250514", 0.015, 0.075),
    ("claude-sonnet-4-20250514", 0.003, 0.015),
    ("claude-3-7-sonnet-20250219", 0.003, 0.015),
    ("claude-3-5-sonnet-20241022", 0.003, 0.015),
    ("claude-3-5-haiku-20241022", 0.0008, 0.004),
    ("claude-3-opus-20240229", 0.015, 0.075),
    ("claude-3-haiku-20240307", 0.00025, 0.00125),
];

const DEEPSEEK_STANDARD: &[RateRow] = &[
    ("deepseek-chat", 0.00027, 0.0011),
    ("deepseek-reasoner", 0.00055, 0.00219),
];

type ModelRates = HashMap<String, ModelPricing>;

/// Pricing overrides loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingOverrides {
    /// provider -> model -> standard rates
    #[serde(default)]
    pub providers: HashMap<String, ModelRates>,
    /// tier -> model -> OpenAI tier rates
    #[serde(default)]
    pub openai_tiers: HashMap<PricingTier, ModelRates>,
}

/// Provider -> model -> rate lookup with tier support for OpenAI
#[derive(Debug, Clone)]
pub struct PricingTable {
    standard: HashMap<String, ModelRates>,
    openai_tiers: HashMap<PricingTier, ModelRates>,
}

fn rates(rows: &[RateRow]) -> ModelRates {
    rows.iter()
        .map(|(model, input, output)| {
            (
                (*model).to_string(),
                ModelPricing {
                    input: *input,
                    output: *output,
                },
            )
        })
        .collect()
}

/// Maps provider aliases onto table keys
pub fn normalize_provider(provider: &str) -> String {
    let lower = provider.trim().to_lowercase();
    match lower.as_str() {
        "anthropic" => "claude".to_string(),
        _ => lower,
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut standard = HashMap::new();
        standard.insert("openai".to_string(), rates(OPENAI_STANDARD));
        standard.insert("claude".to_string(), rates(CLAUDE_STANDARD));
        standard.insert("deepseek".to_string(), rates(DEEPSEEK_STANDARD));

        let mut openai_tiers = HashMap::new();
        openai_tiers.insert(PricingTier::Batch, rates(OPENAI_BATCH));
        openai_tiers.insert(PricingTier::Flex, rates(OPENAI_FLEX));
        openai_tiers.insert(PricingTier::Priority, rates(OPENAI_PRIORITY));

        Self {
            standard,
            openai_tiers,
        }
    }
}

impl PricingTable {
    /// Loads the built-in table and applies overrides from a YAML file
    ///
    /// # Errors
    ///
    /// Returns a pricing error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CtxtrimError::Pricing(format!(
                "Failed to read pricing file {}: {}",
                path.display(),
                e
            ))
        })?;
        let overrides: PricingOverrides = serde_yaml::from_str(&contents).map_err(|e| {
            CtxtrimError::Pricing(format!(
                "Failed to parse pricing file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut table = Self::default();
        table.apply_overrides(overrides);
        tracing::debug!(path = %path.display(), "Loaded pricing overrides");
        Ok(table)
    }

    /// Merges overrides into the table, replacing existing entries
    pub fn apply_overrides(&mut self, overrides: PricingOverrides) {
        for (provider, models) in overrides.providers {
            self.standard
                .entry(normalize_provider(&provider))
                .or_default()
                .extend(models);
        }
        for (tier, models) in overrides.openai_tiers {
            if tier == PricingTier::Standard {
                self.standard
                    .entry("openai".to_string())
                    .or_default()
                    .extend(models);
            } else {
                self.openai_tiers.entry(tier).or_default().extend(models);
            }
        }
    }

    /// Returns true if the provider has a pricing table
    pub fn knows_provider(&self, provider: &str) -> bool {
        self.standard.contains_key(&normalize_provider(provider))
    }

    /// Resolves the rate for a provider/model/tier
    ///
    /// Unknown providers and unknown models fall back to
    /// [`FALLBACK_PRICING`]. A non-standard tier is honored only for OpenAI
    /// models that have an entry in that tier; otherwise the standard rate
    /// applies.
    ///
    /// # Examples
    ///
    /// ```
    /// use ctxtrim::pricing::{PricingTable, PricingTier, FALLBACK_PRICING};
    ///
    /// let table = PricingTable::default();
    /// let standard = table.get_model_pricing("openai", "gpt-4o", None);
    /// let batch = table.get_model_pricing("openai", "gpt-4o", Some(PricingTier::Batch));
    /// assert!(batch.input < standard.input);
    ///
    /// let unknown = table.get_model_pricing("mystery", "m-1", None);
    /// assert_eq!(unknown, FALLBACK_PRICING);
    /// ```
    pub fn get_model_pricing(
        &self,
        provider: &str,
        model: &str,
        tier: Option<PricingTier>,
    ) -> ModelPricing {
        let provider = normalize_provider(provider);
        let Some(models) = self.standard.get(&provider) else {
            tracing::debug!(provider = %provider, "Unknown provider, using fallback pricing");
            return FALLBACK_PRICING;
        };

        if provider == "openai" {
            if let Some(tier) = tier.filter(|t| *t != PricingTier::Standard) {
                if let Some(pricing) = self
                    .openai_tiers
                    .get(&tier)
                    .and_then(|tiered| tiered.get(model))
                {
                    return *pricing;
                }
                tracing::debug!(
                    model = %model,
                    tier = %tier,
                    "No tier rate for model, using standard pricing"
                );
            }
        }

        match models.get(model) {
            Some(pricing) => *pricing,
            None => {
                tracing::debug!(
                    provider = %provider,
                    model = %model,
                    "Unknown model, using fallback pricing"
                );
                FALLBACK_PRICING
            }
        }
    }

    /// Lists `(provider, model, pricing)` entries of the standard table,
    /// sorted by provider then model
    pub fn entries(&self) -> Vec<(String, String, ModelPricing)> {
        let mut out: Vec<_> = self
            .standard
            .iter()
            .flat_map(|(provider, models)| {
                models
                    .iter()
                    .map(move |(model, p)| (provider.clone(), model.clone(), *p))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        out
    }
}
