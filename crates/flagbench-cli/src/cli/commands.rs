//! Clap command definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Feature-flag evaluation benchmark
///
/// Compares DevCycle against the current provider evaluating one boolean flag,
/// serially and across many parallel workers.
#[derive(Parser, Debug)]
#[command(name = "flagbench")]
#[command(about = "Benchmark boolean feature-flag evaluation across providers", long_about = None)]
#[command(version)]
pub struct FlagbenchCli {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "FLAGBENCH_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run benchmark cases
    ///
    /// Builds every fixture first; a missing credential or failed client
    /// construction aborts before anything is measured.
    Run(RunArgs),

    /// List the available cases
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the summary from stored results
    Report {
        /// Directory results were written under
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Print the latest results as JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Case to run; repeat for several, omit for all
    #[arg(long = "case", value_name = "ID")]
    pub cases: Vec<String>,

    /// TOML configuration file
    #[arg(short, long, env = "FLAGBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Minimum measured time per case (e.g. "2s", "500ms")
    #[arg(long, env = "FLAGBENCH_BENCH_TIME", value_parser = parse_duration)]
    pub bench_time: Option<Duration>,

    /// Fixed iteration count per case
    #[arg(long, env = "FLAGBENCH_ITERATIONS")]
    pub iterations: Option<u64>,

    /// Workers in the parallel cases
    #[arg(long, env = "FLAGBENCH_WORKERS")]
    pub workers: Option<usize>,

    /// Write raw results and the summary under this directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn parse_duration(s: &str) -> Result<Duration, String> {
    duration_str::parse(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = FlagbenchCli::try_parse_from([
            "flagbench",
            "run",
            "--case",
            "devcycle",
            "--case",
            "current-provider",
            "--bench-time",
            "250ms",
            "--workers",
            "16",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.cases, vec!["devcycle", "current-provider"]);
        assert_eq!(args.bench_time, Some(Duration::from_millis(250)));
        assert_eq!(args.workers, Some(16));
        assert!(!args.json);
    }

    #[test]
    fn test_parse_rejects_bad_duration() {
        let err = FlagbenchCli::try_parse_from(["flagbench", "run", "--bench-time", "soon"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_parse_list_and_report() {
        let cli = FlagbenchCli::try_parse_from(["flagbench", "--json-logs", "list"]).unwrap();
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::List { json: false }));

        let cli = FlagbenchCli::try_parse_from(["flagbench", "report", "-o", "out"]).unwrap();
        assert!(matches!(cli.command, Commands::Report { ref output, .. } if output == &PathBuf::from("out")));
    }
}
