//! Metric logging backends.
//!
//! Scalars flow through the [`MetricLogger`] trait so the orchestrator does
//! not care whether they end up on the console, in TensorBoard event files,
//! or nowhere. Structured diagnostics use `tracing` directly; this module is
//! only for numeric time series.

mod console;
#[cfg(feature = "tensorboard")]
mod tensorboard;

pub use console::ConsoleLogger;
#[cfg(feature = "tensorboard")]
pub use tensorboard::TensorBoardLogger;

use std::collections::HashMap;

/// Trait for logging metrics to various backends.
pub trait MetricLogger: Send + Sync {
    /// Log a scalar value (e.g. return, planning latency).
    fn log_scalar(&self, name: &str, value: f64, step: u64);

    /// Log a batch of metrics collected in a map.
    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64);

    /// Close the logger and flush any pending writes.
    fn close(&self) {}
}

/// A logger that does nothing (default).
pub struct NoOpLogger;

impl MetricLogger for NoOpLogger {
    fn log_scalar(&self, _name: &str, _value: f64, _step: u64) {}
    fn log_metrics(&self, _metrics: &HashMap<String, f64>, _step: u64) {}
}

/// Dispatches every metric to multiple backends.
pub struct CompositeLogger {
    loggers: Vec<Box<dyn MetricLogger>>,
}

impl CompositeLogger {
    pub fn new(loggers: Vec<Box<dyn MetricLogger>>) -> Self {
        Self { loggers }
    }

    pub fn add(&mut self, logger: Box<dyn MetricLogger>) {
        self.loggers.push(logger);
    }
}

impl MetricLogger for CompositeLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        for logger in &self.loggers {
            logger.log_scalar(name, value, step);
        }
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        for logger in &self.loggers {
            logger.log_metrics(metrics, step);
        }
    }

    fn close(&self) {
        for logger in &self.loggers {
            logger.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingLogger(Arc<AtomicUsize>);

    impl MetricLogger for CountingLogger {
        fn log_scalar(&self, _name: &str, _value: f64, _step: u64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn log_metrics(&self, metrics: &HashMap<String, f64>, _step: u64) {
            self.0.fetch_add(metrics.len(), Ordering::SeqCst);
        }
    }

    #[test]
    fn test_composite_fans_out() {
        let count = Arc::new(AtomicUsize::new(0));
        let composite = CompositeLogger::new(vec![
            Box::new(CountingLogger(count.clone())),
            Box::new(CountingLogger(count.clone())),
            Box::new(NoOpLogger),
        ]);
        composite.log_scalar("return", 1.0, 10);
        let mut metrics = HashMap::new();
        metrics.insert("a".to_string(), 1.0);
        metrics.insert("b".to_string(), 2.0);
        composite.log_metrics(&metrics, 11);
        assert_eq!(count.load(Ordering::SeqCst), 2 + 4);
    }
}
