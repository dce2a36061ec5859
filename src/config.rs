//! Configuration management for ctxtrim
//!
//! Configuration is read from a YAML file, then overridden by `CTXTRIM_*`
//! environment variables and finally by global CLI flags.

use crate::cost::ProviderModel;
use crate::error::{CtxtrimError, Result};
use crate::optimizer::{OptimizationSettings, OptimizationStrategy};
use crate::pricing::{PricingTable, PricingTier};
use crate::tokens::{EstimatorConfig, TokenEstimator};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound accepted for the per-message overhead constant
const MAX_MESSAGE_OVERHEAD_TOKENS: usize = 1_000;

/// Upper bound accepted for the flat per-image token cost
const MAX_IMAGE_TOKENS: usize = 100_000;

/// Main configuration structure for ctxtrim
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// History reduction settings
    #[serde(default)]
    pub optimization: OptimizationSettings,

    /// Provider/model charged for messages that do not record their own
    #[serde(default)]
    pub fallback: FallbackModelConfig,

    /// Token estimator constants
    #[serde(default)]
    pub estimator: EstimatorConfig,

    /// Pricing tier and optional override table
    #[serde(default)]
    pub pricing: PricingConfig,
}

/// Default provider and model for cost attribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackModelConfig {
    /// Provider name (openai, claude, deepseek)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

impl Default for FallbackModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
        }
    }
}

/// Pricing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Billing tier, only meaningful for OpenAI
    #[serde(default)]
    pub tier: PricingTier,

    /// YAML file adding or replacing built-in rates
    #[serde(default)]
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if a CLI
    /// override has an invalid value
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli)?;

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CtxtrimError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| CtxtrimError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(strategy) = std::env::var("CTXTRIM_STRATEGY") {
            match strategy.parse::<OptimizationStrategy>() {
                Ok(value) => self.optimization.strategy = value,
                Err(_) => tracing::warn!("Invalid CTXTRIM_STRATEGY: {}", strategy),
            }
        }

        if let Ok(window) = std::env::var("CTXTRIM_WINDOW_SIZE") {
            if let Ok(value) = window.parse() {
                self.optimization.rolling_window_size = value;
            } else {
                tracing::warn!("Invalid CTXTRIM_WINDOW_SIZE: {}", window);
            }
        }

        if let Ok(threshold) = std::env::var("CTXTRIM_SUMMARY_THRESHOLD") {
            if let Ok(value) = threshold.parse() {
                self.optimization.summary_threshold = value;
            } else {
                tracing::warn!("Invalid CTXTRIM_SUMMARY_THRESHOLD: {}", threshold);
            }
        }

        if let Ok(provider) = std::env::var("CTXTRIM_PROVIDER") {
            self.fallback.provider = provider;
        }

        if let Ok(model) = std::env::var("CTXTRIM_MODEL") {
            self.fallback.model = model;
        }

        if let Ok(tier) = std::env::var("CTXTRIM_PRICING_TIER") {
            match tier.parse::<PricingTier>() {
                Ok(value) => self.pricing.tier = value,
                Err(_) => tracing::warn!("Invalid CTXTRIM_PRICING_TIER: {}", tier),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) -> Result<()> {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(provider) = &cli.provider {
            self.fallback.provider = provider.clone();
        }

        if let Some(model) = &cli.model {
            self.fallback.model = model.clone();
        }

        if let Some(tier) = &cli.tier {
            self.pricing.tier = tier.parse::<PricingTier>()?;
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.optimization.rolling_window_size == 0 {
            return Err(CtxtrimError::Config(
                "optimization.rolling_window_size must be greater than 0".to_string(),
            )
            .into());
        }

        if self.optimization.summary_threshold == 0 {
            return Err(CtxtrimError::Config(
                "optimization.summary_threshold must be greater than 0".to_string(),
            )
            .into());
        }

        if self.fallback.provider.trim().is_empty() {
            return Err(
                CtxtrimError::Config("fallback.provider cannot be empty".to_string()).into(),
            );
        }

        if self.fallback.model.trim().is_empty() {
            return Err(CtxtrimError::Config("fallback.model cannot be empty".to_string()).into());
        }

        if self.estimator.message_overhead_tokens > MAX_MESSAGE_OVERHEAD_TOKENS {
            return Err(CtxtrimError::Config(format!(
                "estimator.message_overhead_tokens must be less than or equal to {}",
                MAX_MESSAGE_OVERHEAD_TOKENS
            ))
            .into());
        }

        if self.estimator.image_tokens > MAX_IMAGE_TOKENS {
            return Err(CtxtrimError::Config(format!(
                "estimator.image_tokens must be less than or equal to {}",
                MAX_IMAGE_TOKENS
            ))
            .into());
        }

        Ok(())
    }

    /// Builds the token estimator described by the `estimator` section
    pub fn token_estimator(&self) -> TokenEstimator {
        TokenEstimator::new(self.estimator)
    }

    /// Loads the pricing table, applying the override file when configured
    ///
    /// # Errors
    ///
    /// Returns a pricing error if the override file cannot be loaded
    pub fn pricing_table(&self) -> Result<PricingTable> {
        match &self.pricing.file {
            Some(path) => PricingTable::from_file(path),
            None => Ok(PricingTable::default()),
        }
    }

    /// The provider/model charged for messages without their own
    pub fn fallback_model(&self) -> ProviderModel {
        ProviderModel::new(&self.fallback.provider, &self.fallback.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for key in [
            "CTXTRIM_STRATEGY",
            "CTXTRIM_WINDOW_SIZE",
            "CTXTRIM_SUMMARY_THRESHOLD",
            "CTXTRIM_PROVIDER",
            "CTXTRIM_MODEL",
            "CTXTRIM_PRICING_TIER",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(
            config.optimization.strategy,
            OptimizationStrategy::RollingWithSummary
        );
        assert_eq!(config.optimization.rolling_window_size, 20);
        assert_eq!(config.optimization.summary_threshold, 4000);
        assert_eq!(config.fallback.provider, "openai");
        assert_eq!(config.fallback.model, "gpt-4o");
        assert_eq!(config.estimator.message_overhead_tokens, 10);
        assert_eq!(config.estimator.image_tokens, 85);
        assert_eq!(config.pricing.tier, PricingTier::Standard);
        assert!(config.pricing.file.is_none());
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_window() {
        let mut config = Config::default();
        config.optimization.rolling_window_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_threshold() {
        let mut config = Config::default();
        config.optimization.summary_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_fallback() {
        let mut config = Config::default();
        config.fallback.provider = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fallback.model = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_overhead_bounds() {
        let mut config = Config::default();
        config.estimator.message_overhead_tokens = MAX_MESSAGE_OVERHEAD_TOKENS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.estimator.image_tokens = MAX_IMAGE_TOKENS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
optimization:
  strategy: smart-summary
  rolling_window_size: 12
  summary_threshold: 2500
fallback:
  provider: claude
  model: claude-3-5-haiku-20241022
estimator:
  message_overhead_tokens: 4
pricing:
  tier: flex
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.optimization.strategy, OptimizationStrategy::SmartSummary);
        assert_eq!(config.optimization.rolling_window_size, 12);
        assert_eq!(config.optimization.summary_threshold, 2500);
        assert_eq!(config.fallback.provider, "claude");
        assert_eq!(config.estimator.message_overhead_tokens, 4);
        assert_eq!(config.estimator.image_tokens, 85);
        assert_eq!(config.pricing.tier, PricingTier::Flex);
    }

    #[test]
    fn test_config_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("optimization:\n  strategy: none\n").unwrap();
        assert_eq!(config.optimization.strategy, OptimizationStrategy::None);
        assert_eq!(config.optimization.rolling_window_size, 20);
        assert_eq!(config.fallback.model, "gpt-4o");
    }

    #[test]
    fn test_config_invalid_strategy_rejected() {
        let result: std::result::Result<Config, _> =
            serde_yaml::from_str("optimization:\n  strategy: everything\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_example_config_parses_and_validates() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/config.yaml");
        let config = Config::from_file(path).expect("example config should parse");
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        clear_env();
        let config = Config::load("/nonexistent/ctxtrim.yaml", &Cli::default()).unwrap();
        assert_eq!(config.optimization.rolling_window_size, 20);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("CTXTRIM_STRATEGY", "rolling_window");
        std::env::set_var("CTXTRIM_WINDOW_SIZE", "8");
        std::env::set_var("CTXTRIM_SUMMARY_THRESHOLD", "1200");
        std::env::set_var("CTXTRIM_PROVIDER", "deepseek");
        std::env::set_var("CTXTRIM_MODEL", "deepseek-chat");
        std::env::set_var("CTXTRIM_PRICING_TIER", "batch");

        let mut config = Config::default();
        config.apply_env_vars();
        clear_env();

        assert_eq!(config.optimization.strategy, OptimizationStrategy::RollingWindow);
        assert_eq!(config.optimization.rolling_window_size, 8);
        assert_eq!(config.optimization.summary_threshold, 1200);
        assert_eq!(config.fallback.provider, "deepseek");
        assert_eq!(config.fallback.model, "deepseek-chat");
        assert_eq!(config.pricing.tier, PricingTier::Batch);
    }

    #[test]
    #[serial]
    fn test_invalid_env_values_are_ignored() {
        clear_env();
        std::env::set_var("CTXTRIM_WINDOW_SIZE", "lots");
        std::env::set_var("CTXTRIM_STRATEGY", "everything");
        std::env::set_var("CTXTRIM_PRICING_TIER", "gold");

        let mut config = Config::default();
        config.apply_env_vars();
        clear_env();

        assert_eq!(config.optimization.rolling_window_size, 20);
        assert_eq!(
            config.optimization.strategy,
            OptimizationStrategy::RollingWithSummary
        );
        assert_eq!(config.pricing.tier, PricingTier::Standard);
    }

    #[test]
    fn test_cli_overrides_fallback_and_tier() {
        let cli = Cli {
            provider: Some("claude".to_string()),
            model: Some("claude-3-haiku-20240307".to_string()),
            tier: Some("priority".to_string()),
            ..Cli::default()
        };

        let mut config = Config::default();
        config.apply_cli_overrides(&cli).unwrap();

        assert_eq!(
            config.fallback_model(),
            ProviderModel::new("claude", "claude-3-haiku-20240307")
        );
        assert_eq!(config.pricing.tier, PricingTier::Priority);
    }

    #[test]
    fn test_cli_invalid_tier_is_error() {
        let cli = Cli {
            tier: Some("gold".to_string()),
            ..Cli::default()
        };
        let mut config = Config::default();
        assert!(config.apply_cli_overrides(&cli).is_err());
    }

    #[test]
    fn test_pricing_table_from_configured_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "providers:\n  openai:\n    gpt-4o:\n      input: 0.5\n      output: 1.5"
        )
        .unwrap();

        let mut config = Config::default();
        config.pricing.file = Some(file.path().to_string_lossy().to_string());

        let table = config.pricing_table().unwrap();
        let rate = table.get_model_pricing("openai", "gpt-4o", None);
        assert_eq!(rate.input, 0.5);
        assert_eq!(rate.output, 1.5);
    }

    #[test]
    fn test_pricing_table_missing_file_is_error() {
        let mut config = Config::default();
        config.pricing.file = Some("/nonexistent/pricing.yaml".to_string());
        assert!(config.pricing_table().is_err());
    }

    #[test]
    fn test_token_estimator_uses_config() {
        let mut config = Config::default();
        config.estimator.message_overhead_tokens = 0;
        let estimator = config.token_estimator();
        assert_eq!(estimator.config().message_overhead_tokens, 0);
    }
}
