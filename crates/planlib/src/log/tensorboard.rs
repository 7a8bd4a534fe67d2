//! TensorBoard event-file backend.
//!
//! The orchestrator emits metrics in batches at `log_interval_steps`, so the
//! writer flushes once per batch (and on close) rather than per scalar.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use tensorboard_rs::summary_writer::SummaryWriter;

use super::MetricLogger;

/// Logger that writes TensorBoard event files under a run directory.
pub struct TensorBoardLogger {
    writer: Mutex<SummaryWriter>,
    prefix: Option<String>,
}

impl TensorBoardLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> Self {
        Self {
            writer: Mutex::new(SummaryWriter::new(log_dir.as_ref())),
            prefix: None,
        }
    }

    /// Prepend `prefix/` to every tag, e.g. an env id, so several runs can
    /// share one event directory and still separate in the TensorBoard UI.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn tag(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{name}"),
            None => name.to_string(),
        }
    }
}

impl MetricLogger for TensorBoardLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        if let Ok(mut writer) = self.writer.lock() {
            writer.add_scalar(&self.tag(name), value as f32, step as usize);
        }
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        if let Ok(mut writer) = self.writer.lock() {
            // Stable tag order keeps event files reproducible across runs.
            let mut names: Vec<&String> = metrics.keys().collect();
            names.sort();
            for name in names {
                writer.add_scalar(&self.tag(name), metrics[name] as f32, step as usize);
            }
            let _ = writer.flush();
        }
    }

    fn close(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_prepends_to_tags() {
        let dir = std::env::temp_dir().join("planlib-tb-test");
        let plain = TensorBoardLogger::new(&dir);
        assert_eq!(plain.tag("env/mean_return"), "env/mean_return");
        let prefixed = plain.with_prefix("pendulum");
        assert_eq!(prefixed.tag("env/mean_return"), "pendulum/env/mean_return");
    }
}
