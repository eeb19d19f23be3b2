//! Flag evaluation benchmark harness
//!
//! # Structure
//!
//! - `alloc`: counting global allocator for allocs/op
//! - `driver`: N selection, timers, serial and parallel fan-out
//! - `adapters`: the cases, behind the `BenchTarget` trait
//! - `result`: the `BenchmarkResult` record
//! - `io`: reading and writing raw results
//! - `markdown`: the summary table
//!
//! # Usage
//!
//! ```rust,ignore
//! use flagbench_core::{benchmarks::run_suite, BenchConfig};
//!
//! let results = run_suite(&BenchConfig::default(), &[])?;
//! for result in &results {
//!     println!("{}", result);
//! }
//! ```

pub mod adapters;
pub mod alloc;
pub mod driver;
pub mod io;
pub mod markdown;
pub mod result;

pub use adapters::{all_targets, BenchTarget, CaseInfo, CASES};
pub use driver::{Bencher, Driver, Measurement};
pub use result::BenchmarkResult;

use crate::config::BenchConfig;
use crate::error::{BenchResult, BenchmarkError};
use crate::fixtures::Fixtures;
use std::path::Path;

/// Set up both fixtures, then run the selected cases in catalog order.
///
/// An empty `filter` selects every case. Unknown ids are rejected before any
/// fixture is built; the first failing case aborts the run.
pub fn run_suite(config: &BenchConfig, filter: &[String]) -> BenchResult<Vec<BenchmarkResult>> {
    check_filter(filter)?;
    config.validate()?;
    let fixtures = Fixtures::setup(config)?;
    run_targets(config, &fixtures, filter)
}

fn check_filter(filter: &[String]) -> BenchResult<()> {
    match filter.iter().find(|id| adapters::case_info(id).is_none()) {
        Some(unknown) => Err(BenchmarkError::UnknownCase(unknown.clone())),
        None => Ok(()),
    }
}

/// Run the selected cases against already built fixtures
pub fn run_targets(
    config: &BenchConfig,
    fixtures: &Fixtures,
    filter: &[String],
) -> BenchResult<Vec<BenchmarkResult>> {
    check_filter(filter)?;
    let driver = Driver::from_config(&config.harness);
    let targets: Vec<_> = all_targets(fixtures, &config.harness)
        .into_iter()
        .filter(|t| filter.is_empty() || filter.iter().any(|id| id == t.id()))
        .collect();

    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        tracing::info!(target_id = target.id(), category = target.category(), "Running benchmark");
        let result = target.run(&driver).map_err(|e| {
            tracing::error!(target_id = target.id(), error = %e, "Benchmark failed");
            e
        })?;
        tracing::info!(
            target_id = target.id(),
            iterations = ?result.iterations(),
            ns_per_op = ?result.ns_per_op(),
            "Benchmark complete"
        );
        results.push(result);
    }

    Ok(results)
}

/// Run the suite and write results under `base_path`.
///
/// Writes raw results to `benchmarks/output/raw/` and rewrites
/// `benchmarks/output/summary.md`. Nothing is written if any case fails.
pub fn run_and_save(
    config: &BenchConfig,
    filter: &[String],
    base_path: &Path,
) -> BenchResult<Vec<BenchmarkResult>> {
    let results = run_suite(config, filter)?;
    save_results(base_path, &results)?;
    Ok(results)
}

pub fn save_results(base_path: &Path, results: &[BenchmarkResult]) -> BenchResult<()> {
    io::ensure_output_dirs(base_path)?;
    let path = io::write_benchmark_run(base_path, results)?;
    markdown::update_summary(base_path)?;
    tracing::info!(path = %path.display(), count = results.len(), "Results written");
    Ok(())
}

/// All available cases
pub fn list_benchmarks() -> Vec<BenchmarkInfo> {
    CASES
        .iter()
        .map(|c| BenchmarkInfo {
            id: c.id.to_string(),
            description: c.description.to_string(),
            category: c.provider.name().to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkInfo {
    pub id: String,
    pub description: String,
    pub category: String,
}

impl std::fmt::Display for BenchmarkInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.category, self.id, self.description)
    }
}
