//! Markdown summary of the latest results

use super::io;
use super::result::BenchmarkResult;
use std::fmt;
use std::path::{Path, PathBuf};

fn metric_str(result: &BenchmarkResult, key: &str) -> String {
    match result.get_metric(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(v) if !v.is_null() => v.to_string(),
        _ => "-".to_string(),
    }
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Markdown table of results, one row per result in the given order
pub struct SummaryTable<'a>(pub &'a [BenchmarkResult]);

impl fmt::Display for SummaryTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Flag Evaluation Benchmarks")?;
        writeln!(f)?;

        if self.0.is_empty() {
            return writeln!(f, "_No benchmarks have been run yet._");
        }

        writeln!(
            f,
            "| Case | Provider | Mode | Iterations | ns/op | ops/sec | allocs/op | B/op | Recorded |"
        )?;
        writeln!(f, "|---|---|---|---:|---:|---:|---:|---:|---|")?;

        for r in self.0 {
            writeln!(
                f,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                r.target_id,
                metric_str(r, "provider"),
                metric_str(r, "mode"),
                opt(r.iterations()),
                opt(r.ns_per_op().map(|v| format!("{:.1}", v))),
                opt(r.throughput_ops_per_sec().map(|v| format!("{:.0}", v))),
                opt(r.allocs_per_op()),
                opt(r.bytes_per_op()),
                r.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            )?;
        }
        Ok(())
    }
}

pub fn render_summary(results: &[BenchmarkResult]) -> String {
    SummaryTable(results).to_string()
}

/// Rewrite the summary file from the latest stored result of each case
pub fn update_summary(base_path: &Path) -> std::io::Result<PathBuf> {
    let rows = io::read_latest_results(base_path)?;
    let path = io::summary_file(base_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, render_summary(&rows))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn result(target_id: &str, ns_per_op: f64) -> BenchmarkResult {
        BenchmarkResult::new(
            target_id,
            serde_json::json!({
                "iterations": 1000,
                "ns_per_op": ns_per_op,
                "throughput_ops_per_sec": 1e9 / ns_per_op,
                "allocs_per_op": 3,
                "bytes_per_op": 120,
                "allocs_tracked": true,
                "provider": "devcycle",
                "mode": "serial",
            }),
        )
    }

    #[test]
    fn test_render_empty() {
        assert!(render_summary(&[]).contains("No benchmarks"));
    }

    #[test]
    fn test_render_rows() {
        let md = render_summary(&[result("devcycle", 250.0)]);
        assert!(md.contains("| Case | Provider |"));
        assert!(md.contains("| devcycle | devcycle | serial | 1000 | 250.0 | 4000000 | 3 | 120 |"));
    }

    #[test]
    fn test_summary_table_keeps_given_order() {
        let rows = [result("devcycle-parallel", 10.0), result("devcycle", 250.0)];
        let md = SummaryTable(&rows).to_string();
        let parallel = md.find("\n| devcycle-parallel |").unwrap();
        let serial = md.find("\n| devcycle |").unwrap();
        assert!(parallel < serial);
    }

    #[test]
    fn test_update_summary_keeps_latest() {
        let temp_dir = TempDir::new().unwrap();
        io::write_raw_result(temp_dir.path(), &result("devcycle", 500.0)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        io::write_raw_result(temp_dir.path(), &result("devcycle", 250.0)).unwrap();

        let path = update_summary(temp_dir.path()).unwrap();
        let md = std::fs::read_to_string(path).unwrap();
        assert!(md.contains("250.0"));
        assert!(!md.contains("500.0"));
    }
}
