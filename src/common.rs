use atomic_float::AtomicF64;
use std::sync::atomic::Ordering;

/// Emit a progress log line every this many processed sources.
pub static PROGRESS_UPDATE_INTERVAL: usize = 100;

/// Per-node metric accumulator shared across worker threads.
#[derive(Debug)]
pub struct MetricResult {
    pub metric: Vec<AtomicF64>,
}

impl MetricResult {
    /// Initializes a new `MetricResult` with `size` slots set to `init_val`.
    #[inline]
    pub fn new(size: usize, init_val: f64) -> Self {
        let metric = (0..size).map(|_| AtomicF64::new(init_val)).collect();
        Self { metric }
    }

    #[inline]
    pub fn add(&self, node_idx: usize, val: f64) {
        self.metric[node_idx].fetch_add(val, Ordering::Relaxed);
    }

    /// Snapshot of the current values.
    #[inline]
    pub fn load(&self) -> Vec<f64> {
        self.metric
            .iter()
            .map(|a| a.load(Ordering::Relaxed))
            .collect()
    }
}

impl Clone for MetricResult {
    fn clone(&self) -> Self {
        MetricResult {
            metric: self
                .metric
                .iter()
                .map(|atomic_f64| AtomicF64::new(atomic_f64.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// Sums the selected attribute fields of a feature, skipping missing values.
/// An empty selection yields `default`.
pub fn sum_fields(values: &[Option<f64>], default: f64) -> f64 {
    if values.is_empty() {
        return default;
    }
    values.iter().flatten().sum()
}

/// Divides `value` by `total`, returning zero when the total is zero or not finite.
#[inline]
pub fn guarded_ratio(value: f64, total: f64) -> f64 {
    if total == 0.0 || !total.is_finite() {
        0.0
    } else {
        value / total
    }
}
