//! Benchmark result records
//!
//! One [`BenchmarkResult`] is produced per measured case and is the unit
//! written to disk and rendered into the summary table.

use super::driver::Measurement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one benchmark case.
///
/// # Fields
/// - `target_id`: case identifier (e.g. `devcycle-parallel`)
/// - `metrics`: JSON object of measurements
/// - `timestamp`: UTC time the case finished
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub target_id: String,

    /// Common metrics:
    /// - `iterations`: N of the reported run
    /// - `duration_ns`: wall-clock time of the reported run
    /// - `ns_per_op`, `throughput_ops_per_sec`
    /// - `allocs_per_op`, `bytes_per_op`, `allocs_tracked`
    pub metrics: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    pub fn new(target_id: impl Into<String>, metrics: serde_json::Value) -> Self {
        Self {
            target_id: target_id.into(),
            metrics,
            timestamp: Utc::now(),
        }
    }

    /// Build a result from a driver measurement
    pub fn from_measurement(target_id: impl Into<String>, m: &Measurement) -> Self {
        Self::new(
            target_id,
            serde_json::json!({
                "iterations": m.iterations,
                "duration_ns": m.elapsed.as_nanos() as u64,
                "ns_per_op": m.ns_per_op(),
                "throughput_ops_per_sec": m.ops_per_sec(),
                "allocs_per_op": m.allocs_per_op(),
                "bytes_per_op": m.bytes_per_op(),
                "allocs_tracked": m.allocs_tracked,
            }),
        )
    }

    /// Add additional metrics to the result
    pub fn with_metric(mut self, key: &str, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(ref mut map) = self.metrics {
            map.insert(key.to_string(), value);
        }
        self
    }

    pub fn get_metric(&self, key: &str) -> Option<&serde_json::Value> {
        self.metrics.get(key)
    }

    pub fn iterations(&self) -> Option<u64> {
        self.metrics.get("iterations").and_then(|v| v.as_u64())
    }

    pub fn duration_ns(&self) -> Option<u128> {
        self.metrics
            .get("duration_ns")
            .and_then(|v| v.as_u64())
            .map(|v| v as u128)
    }

    pub fn ns_per_op(&self) -> Option<f64> {
        self.metrics.get("ns_per_op").and_then(|v| v.as_f64())
    }

    pub fn throughput_ops_per_sec(&self) -> Option<f64> {
        self.metrics
            .get("throughput_ops_per_sec")
            .and_then(|v| v.as_f64())
    }

    /// Allocations per op, if the counting allocator was installed
    pub fn allocs_per_op(&self) -> Option<u64> {
        let tracked = self
            .metrics
            .get("allocs_tracked")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !tracked {
            return None;
        }
        self.metrics.get("allocs_per_op").and_then(|v| v.as_u64())
    }

    pub fn bytes_per_op(&self) -> Option<u64> {
        self.allocs_per_op()?;
        self.metrics.get("bytes_per_op").and_then(|v| v.as_u64())
    }
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<28} {:>12} {:>14.1} ns/op",
            self.target_id,
            self.iterations().unwrap_or(0),
            self.ns_per_op().unwrap_or(0.0)
        )?;
        if let (Some(allocs), Some(bytes)) = (self.allocs_per_op(), self.bytes_per_op()) {
            write!(f, " {:>8} B/op {:>6} allocs/op", bytes, allocs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmarks::alloc::AllocSnapshot;
    use std::time::Duration;

    fn measurement(tracked: bool) -> Measurement {
        Measurement {
            iterations: 2_000,
            elapsed: Duration::from_millis(2),
            allocs: AllocSnapshot {
                allocations: 4_000,
                bytes: 96_000,
            },
            allocs_tracked: tracked,
        }
    }

    #[test]
    fn test_from_measurement() {
        let result = BenchmarkResult::from_measurement("devcycle", &measurement(true));
        assert_eq!(result.target_id, "devcycle");
        assert_eq!(result.iterations(), Some(2_000));
        assert_eq!(result.duration_ns(), Some(2_000_000));
        assert_eq!(result.ns_per_op(), Some(1_000.0));
        assert_eq!(result.throughput_ops_per_sec(), Some(1_000_000.0));
        assert_eq!(result.allocs_per_op(), Some(2));
        assert_eq!(result.bytes_per_op(), Some(48));
    }

    #[test]
    fn test_untracked_allocs_hidden() {
        let result = BenchmarkResult::from_measurement("devcycle", &measurement(false));
        assert_eq!(result.allocs_per_op(), None);
        assert_eq!(result.bytes_per_op(), None);
        assert!(!result.to_string().contains("allocs/op"));
    }

    #[test]
    fn test_with_metric() {
        let result = BenchmarkResult::from_measurement("devcycle", &measurement(true))
            .with_metric("provider", serde_json::json!("devcycle"));
        assert_eq!(result.get_metric("provider"), Some(&serde_json::json!("devcycle")));
    }

    #[test]
    fn test_serialization() {
        let result = BenchmarkResult::from_measurement("current-provider", &measurement(true));
        let json = serde_json::to_string(&result).unwrap();
        let parsed: BenchmarkResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.target_id, result.target_id);
        assert_eq!(parsed.iterations(), Some(2_000));
    }
}
