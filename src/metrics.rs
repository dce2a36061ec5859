//! Metrics for optimization previews and compressions
//!
//! # Metrics
//!
//! - `ctxtrim_previews_total`: Counter of previews by strategy
//! - `ctxtrim_tokens_saved`: Histogram of tokens saved per preview
//! - `ctxtrim_compressions_total`: Counter of applied compressions
//! - `ctxtrim_compressed_messages`: Histogram of originals deleted per compression
//! - `ctxtrim_compression_errors_total`: Counter of failed store operations
//!
//! Without an installed recorder these calls are no-ops.

use metrics::{histogram, increment_counter};

use crate::optimizer::OptimizationResult;

/// Records a computed preview
pub fn record_preview(result: &OptimizationResult) {
    increment_counter!(
        "ctxtrim_previews_total",
        "strategy" => result.strategy.as_str()
    );
    histogram!(
        "ctxtrim_tokens_saved",
        result.saved_tokens as f64,
        "strategy" => result.strategy.as_str()
    );
}

/// Records an applied compression
pub fn record_compression(deleted_count: usize, saved_tokens: usize) {
    increment_counter!("ctxtrim_compressions_total");
    histogram!("ctxtrim_compressed_messages", deleted_count as f64);
    histogram!("ctxtrim_tokens_saved", saved_tokens as f64, "strategy" => "compress");
}

/// Records a store operation that failed during compression
pub fn record_compression_error(operation: &'static str) {
    increment_counter!(
        "ctxtrim_compression_errors_total",
        "operation" => operation
    );
}

/// Initializes the metrics exporter for Prometheus
///
/// Only has an effect when compiled with the `prometheus` feature.
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let _ = builder.install().map_err(|e| {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        });
    }
}
