//! Result rendering for the terminal

use colored::Colorize;
use flagbench_core::benchmarks::BenchmarkInfo;
use flagbench_core::BenchmarkResult;
use std::io::{self, Write};

/// Pairs of (candidate, incumbent) cases compared in the footer
const COMPARISONS: [(&str, &str); 2] = [
    ("devcycle", "current-provider"),
    ("devcycle-parallel", "current-provider-parallel"),
];

pub fn print_results(results: &[BenchmarkResult], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    let mut stdout = io::stdout();
    writeln!(stdout)?;
    writeln!(stdout, "{}", "Flag Evaluation Benchmarks".cyan().bold())?;
    writeln!(stdout, "{}", "=".repeat(72))?;
    for result in results {
        writeln!(stdout, "{}", result)?;
    }

    let lines = comparison_lines(results);
    if !lines.is_empty() {
        writeln!(stdout)?;
        for line in lines {
            writeln!(stdout, "{}", line)?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn comparison_lines(results: &[BenchmarkResult]) -> Vec<String> {
    let ns = |id: &str| {
        results
            .iter()
            .find(|r| r.target_id == id)
            .and_then(|r| r.ns_per_op())
            .filter(|v| *v > 0.0)
    };

    COMPARISONS
        .iter()
        .filter_map(|&(candidate, incumbent)| {
            let (c, i) = (ns(candidate)?, ns(incumbent)?);
            let line = if c <= i {
                format!("{} is {:.2}x faster than {}", candidate, i / c, incumbent)
            } else {
                format!("{} is {:.2}x slower than {}", candidate, c / i, incumbent)
            };
            Some(line)
        })
        .collect()
}

pub fn print_cases(cases: &[BenchmarkInfo], json: bool) -> anyhow::Result<()> {
    if json {
        let value: Vec<_> = cases
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "description": c.description,
                    "category": c.category,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for case in cases {
        println!("{:<28} {:<14} {}", case.id.bold(), case.category.dimmed(), case.description);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, ns_per_op: f64) -> BenchmarkResult {
        BenchmarkResult::new(id, serde_json::json!({ "ns_per_op": ns_per_op }))
    }

    #[test]
    fn test_comparison_lines() {
        let results = vec![
            result("devcycle", 100.0),
            result("current-provider", 250.0),
            result("devcycle-parallel", 40.0),
            result("current-provider-parallel", 20.0),
        ];
        assert_eq!(
            comparison_lines(&results),
            vec![
                "devcycle is 2.50x faster than current-provider",
                "devcycle-parallel is 2.00x slower than current-provider-parallel",
            ]
        );
    }

    #[test]
    fn test_comparison_needs_both_cases() {
        assert!(comparison_lines(&[result("devcycle", 100.0)]).is_empty());
    }
}
