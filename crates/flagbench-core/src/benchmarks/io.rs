//! Reading and writing benchmark results
//!
//! Every run writes one JSON file per case plus a combined run file under
//! `<base>/benchmarks/output/raw/`.

use super::result::BenchmarkResult;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const OUTPUT_DIR: &str = "benchmarks/output";
pub const RAW_OUTPUT_DIR: &str = "benchmarks/output/raw";
pub const SUMMARY_FILE: &str = "benchmarks/output/summary.md";

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> io::Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write a set of results as one JSON array named `<filename>.json`
pub fn write_raw_results(
    base_path: &Path,
    results: &[BenchmarkResult],
    filename: &str,
) -> io::Result<PathBuf> {
    let raw_dir = base_path.join(RAW_OUTPUT_DIR);
    fs::create_dir_all(&raw_dir)?;

    let file_path = raw_dir.join(format!("{}.json", filename));
    fs::write(&file_path, to_json(results)?)?;
    Ok(file_path)
}

/// Write one result as `<target_id>_<timestamp>.json`
pub fn write_raw_result(base_path: &Path, result: &BenchmarkResult) -> io::Result<PathBuf> {
    let raw_dir = base_path.join(RAW_OUTPUT_DIR);
    fs::create_dir_all(&raw_dir)?;

    let timestamp = result.timestamp.format("%Y%m%d_%H%M%S%.3f");
    let file_path = raw_dir.join(format!("{}_{}.json", result.target_id, timestamp));
    fs::write(&file_path, to_json(result)?)?;
    Ok(file_path)
}

/// Read every result under the raw directory, most recent first.
///
/// Combined run files are skipped so each case result is counted once;
/// files that do not parse are ignored.
pub fn read_raw_results(base_path: &Path) -> io::Result<Vec<BenchmarkResult>> {
    let raw_dir = base_path.join(RAW_OUTPUT_DIR);
    if !raw_dir.exists() {
        return Ok(Vec::new());
    }

    let mut results = Vec::new();
    for entry in fs::read_dir(&raw_dir)? {
        let path = entry?.path();
        if path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let is_run_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with("run_"));
        if is_run_file {
            continue;
        }

        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<BenchmarkResult>(&content) {
            Ok(result) => results.push(result),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unreadable result"),
        }
    }

    results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(results)
}

/// Most recent result of each case, ordered by case id
pub fn read_latest_results(base_path: &Path) -> io::Result<Vec<BenchmarkResult>> {
    let mut latest = BTreeMap::new();
    for result in read_raw_results(base_path)? {
        latest.entry(result.target_id.clone()).or_insert(result);
    }
    Ok(latest.into_values().collect())
}

/// Write the results of one run and return the combined file's path
pub fn write_benchmark_run(base_path: &Path, results: &[BenchmarkResult]) -> io::Result<PathBuf> {
    fs::create_dir_all(base_path.join(OUTPUT_DIR))?;

    for result in results {
        write_raw_result(base_path, result)?;
    }

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
    write_raw_results(base_path, results, &format!("run_{}", timestamp))
}

/// Create the output directories and an empty summary if none exists
pub fn ensure_output_dirs(base_path: &Path) -> io::Result<()> {
    fs::create_dir_all(base_path.join(RAW_OUTPUT_DIR))?;

    let summary_path = base_path.join(SUMMARY_FILE);
    if !summary_path.exists() {
        let mut file = fs::File::create(&summary_path)?;
        writeln!(file, "# Flag Evaluation Benchmarks")?;
        writeln!(file)?;
        writeln!(file, "_No benchmarks have been run yet._")?;
    }

    Ok(())
}

pub fn summary_file(base_path: &Path) -> PathBuf {
    base_path.join(SUMMARY_FILE)
}
