//! Console logging backend.

use std::collections::HashMap;

use super::MetricLogger;

/// Logger that prints metrics through `tracing`.
#[derive(Default)]
pub struct ConsoleLogger;

impl ConsoleLogger {
    pub fn new() -> Self {
        Self
    }
}

impl MetricLogger for ConsoleLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        tracing::info!("step {}: {} = {:.4}", step, name, value);
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        // One line per batch, keys sorted so output is diffable.
        let mut keys: Vec<_> = metrics.keys().collect();
        keys.sort();
        let mut line = format!("step {}: ", step);
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                line.push_str(", ");
            }
            line.push_str(&format!("{}={:.4}", key, metrics[*key]));
        }
        tracing::info!("{}", line);
    }
}
