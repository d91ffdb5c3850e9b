//! Metrics emitted by local dump storage.
//!
//! **Gauges:**
//! - `runtime_security.activity_dump.local_storage.count` — dumps currently retained
//!
//! **Counters:**
//! - `runtime_security.activity_dump.local_storage.deleted` — dumps evicted since the last flush

use std::collections::HashMap;
use std::sync::Mutex;

use prometheus::{Gauge, IntCounter, Registry};
use tracing::warn;

/// Number of dumps currently retained on disk.
pub const METRIC_LOCAL_STORAGE_COUNT: &str = "runtime_security.activity_dump.local_storage.count";

/// Number of dumps evicted since the previous telemetry flush.
pub const METRIC_LOCAL_STORAGE_DELETED: &str =
    "runtime_security.activity_dump.local_storage.deleted";

/// Destination for storage telemetry.
///
/// Sinks are best-effort: delivery failures are the sink's own concern.
pub trait MetricsSink {
    fn gauge(&self, name: &str, value: f64);
    fn count(&self, name: &str, delta: i64);
}

/// Exposes storage metrics through a Prometheus registry.
///
/// Metric names are sanitized (`.` becomes `_`) and registered on first use.
pub struct PrometheusSink {
    registry: Registry,
    gauges: Mutex<HashMap<String, Gauge>>,
    counters: Mutex<HashMap<String, IntCounter>>,
}

impl PrometheusSink {
    pub fn new(registry: Registry) -> Self {
        PrometheusSink {
            registry,
            gauges: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn register<C>(&self, collector: &C, name: &str) -> bool
    where
        C: prometheus::core::Collector + Clone + 'static,
    {
        match self.registry.register(Box::new(collector.clone())) {
            Ok(()) => true,
            Err(e) => {
                warn!(metric = name, error = %e, "couldn't register storage metric");
                false
            }
        }
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new(Registry::new())
    }
}

impl MetricsSink for PrometheusSink {
    fn gauge(&self, name: &str, value: f64) {
        let metric_name = sanitize_metric_name(name);
        let mut gauges = self
            .gauges
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !gauges.contains_key(&metric_name) {
            let gauge = match Gauge::new(metric_name.clone(), name.to_string()) {
                Ok(g) => g,
                Err(e) => {
                    warn!(metric = name, error = %e, "invalid storage gauge");
                    return;
                }
            };
            if !self.register(&gauge, name) {
                return;
            }
            gauges.insert(metric_name.clone(), gauge);
        }

        if let Some(gauge) = gauges.get(&metric_name) {
            gauge.set(value);
        }
    }

    fn count(&self, name: &str, delta: i64) {
        let Ok(delta) = u64::try_from(delta) else {
            warn!(metric = name, delta, "negative counter increment dropped");
            return;
        };

        let metric_name = sanitize_metric_name(name);
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !counters.contains_key(&metric_name) {
            let counter = match IntCounter::new(metric_name.clone(), name.to_string()) {
                Ok(c) => c,
                Err(e) => {
                    warn!(metric = name, error = %e, "invalid storage counter");
                    return;
                }
            };
            if !self.register(&counter, name) {
                return;
            }
            counters.insert(metric_name.clone(), counter);
        }

        if let Some(counter) = counters.get(&metric_name) {
            counter.inc_by(delta);
        }
    }
}

/// Records submitted metrics in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    gauges: Mutex<HashMap<String, f64>>,
    counts: Mutex<HashMap<String, i64>>,
    submissions: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value submitted for a gauge.
    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        lock(&self.gauges).get(name).copied()
    }

    /// Sum of every increment submitted for a counter.
    pub fn count_total(&self, name: &str) -> Option<i64> {
        lock(&self.counts).get(name).copied()
    }

    /// Total number of gauge and count submissions.
    pub fn submissions(&self) -> usize {
        *lock(&self.submissions)
    }
}

impl MetricsSink for MemorySink {
    fn gauge(&self, name: &str, value: f64) {
        lock(&self.gauges).insert(name.to_string(), value);
        *lock(&self.submissions) += 1;
    }

    fn count(&self, name: &str, delta: i64) {
        *lock(&self.counts).entry(name.to_string()).or_insert(0) += delta;
        *lock(&self.submissions) += 1;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Map a dotted metric name onto the Prometheus name charset.
pub fn sanitize_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect()
}
