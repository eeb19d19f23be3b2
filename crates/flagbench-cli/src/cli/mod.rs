//! Command handling and exit codes

pub mod commands;
pub mod output;

pub use commands::{Commands, FlagbenchCli, RunArgs};

use colored::Colorize;
use flagbench_core::benchmarks::{self, io, markdown};
use flagbench_core::{BenchConfig, BenchmarkError, SetupError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// A case returned an error or an unexpected value
    CaseFailed = 1,
    /// A fixture could not be built
    SetupFailed = 2,
    InvalidInput = 3,
    FileError = 4,
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    pub fn from_error(err: &anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<BenchmarkError>() {
            return match e {
                BenchmarkError::Setup(setup) => Self::from_setup(setup),
                BenchmarkError::Evaluation { .. } | BenchmarkError::ValueMismatch { .. } => {
                    ExitCode::CaseFailed
                }
                BenchmarkError::UnknownCase(_) => ExitCode::InvalidInput,
                BenchmarkError::Io(_) => ExitCode::FileError,
            };
        }
        if let Some(e) = err.downcast_ref::<SetupError>() {
            return Self::from_setup(e);
        }
        if err.downcast_ref::<std::io::Error>().is_some() {
            return ExitCode::FileError;
        }
        ExitCode::InternalError
    }

    fn from_setup(err: &SetupError) -> Self {
        match err {
            SetupError::Config(_) => ExitCode::InvalidInput,
            _ => ExitCode::SetupFailed,
        }
    }
}

/// Apply command-line overrides on top of the file or default configuration
pub fn resolve_config(args: &RunArgs) -> Result<BenchConfig, SetupError> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::load(path)?,
        None => BenchConfig::default(),
    };

    if let Some(bench_time) = args.bench_time {
        config.harness.bench_time = bench_time;
    }
    if let Some(iterations) = args.iterations {
        config.harness.iterations = Some(iterations);
    }
    if let Some(workers) = args.workers {
        config.harness.workers = workers;
    }

    config.validate()?;
    Ok(config)
}

pub fn run(cli: FlagbenchCli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => {
            let config = resolve_config(&args)?;
            tracing::info!(
                workers = config.harness.workers,
                bench_time = ?config.harness.bench_time,
                iterations = ?config.harness.iterations,
                cases = ?args.cases,
                "Starting benchmark run"
            );

            let results = match &args.output {
                Some(dir) => benchmarks::run_and_save(&config, &args.cases, dir)?,
                None => benchmarks::run_suite(&config, &args.cases)?,
            };
            output::print_results(&results, args.json)?;
        }
        Commands::List { json } => {
            output::print_cases(&benchmarks::list_benchmarks(), json)?;
        }
        Commands::Report { output: dir, json } => {
            let results = io::read_latest_results(&dir)?;

            if json {
                output::print_results(&results, true)?;
            } else {
                let path = markdown::update_summary(&dir)?;
                tracing::info!(path = %path.display(), "Summary updated");
                print!("{}", markdown::render_summary(&results));
            }
        }
    }

    Ok(ExitCode::Success)
}

/// Run the CLI and map any failure to its exit code
pub fn run_cli(cli: FlagbenchCli) -> ExitCode {
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagbench_core::ProviderError;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        let case_failed = anyhow::Error::new(BenchmarkError::ValueMismatch {
            case: "devcycle".into(),
            expected: false,
            actual: true,
        });
        assert_eq!(ExitCode::from_error(&case_failed), ExitCode::CaseFailed);

        let eval = anyhow::Error::new(BenchmarkError::Evaluation {
            case: "devcycle".into(),
            iteration: 0,
            source: ProviderError::NotInitialized,
        });
        assert_eq!(ExitCode::from_error(&eval), ExitCode::CaseFailed);

        let setup = anyhow::Error::new(BenchmarkError::Setup(SetupError::MissingCredential {
            var: "DC_KEY".into(),
        }));
        assert_eq!(ExitCode::from_error(&setup), ExitCode::SetupFailed);

        let config = anyhow::Error::new(SetupError::Config("bad".into()));
        assert_eq!(ExitCode::from_error(&config), ExitCode::InvalidInput);

        let unknown = anyhow::Error::new(BenchmarkError::UnknownCase("x".into()));
        assert_eq!(ExitCode::from_error(&unknown), ExitCode::InvalidInput);

        assert_eq!(ExitCode::from_error(&anyhow::anyhow!("boom")), ExitCode::InternalError);
        assert_eq!(i32::from(ExitCode::SetupFailed), 2);
    }

    #[test]
    fn test_resolve_config_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[harness]\nworkers = 8\nbench_time = \"2s\"").unwrap();

        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            bench_time: Some(Duration::from_millis(100)),
            iterations: Some(1000),
            ..Default::default()
        };
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.harness.workers, 8);
        assert_eq!(config.harness.bench_time, Duration::from_millis(100));
        assert_eq!(config.harness.iterations, Some(1000));
    }

    #[test]
    fn test_resolve_config_rejects_zero_workers() {
        let args = RunArgs {
            workers: Some(0),
            ..Default::default()
        };
        assert!(matches!(resolve_config(&args), Err(SetupError::Config(_))));
    }

    #[test]
    fn test_unknown_case_exit_code() {
        let cli = FlagbenchCli {
            json_logs: false,
            command: Commands::Run(RunArgs {
                cases: vec!["nonexistent".into()],
                ..Default::default()
            }),
        };
        assert_eq!(run_cli(cli), ExitCode::InvalidInput);
    }

    #[test]
    fn test_report_on_empty_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let cli = FlagbenchCli {
            json_logs: false,
            command: Commands::Report {
                output: dir.path().to_path_buf(),
                json: false,
            },
        };
        assert_eq!(run_cli(cli), ExitCode::Success);
        assert!(io::summary_file(dir.path()).exists());
    }
}
