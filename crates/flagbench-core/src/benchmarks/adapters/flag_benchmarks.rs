//! Flag evaluation benchmarks
//!
//! Each case evaluates one boolean flag for a fixed identity, either in a
//! single loop or fanned out across many workers sharing the iteration
//! budget. Any evaluation error fails the case. The returned value is checked
//! once per measured run, outside the timed region.

use super::BenchTarget;
use crate::benchmarks::driver::{self, Bencher, Driver};
use crate::benchmarks::result::BenchmarkResult;
use crate::error::{BenchResult, BenchmarkError};
use crate::fixtures::Fixture;
use crate::providers::ProviderError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// How a case spends its iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Serial,
    Parallel { workers: usize },
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Serial => write!(f, "serial"),
            Mode::Parallel { .. } => write!(f, "parallel"),
        }
    }
}

/// Outcome of one parallel worker: its last value, or the first error with
/// the worker-local iteration it happened at
type WorkerOutcome = Result<Option<bool>, (u64, ProviderError)>;

pub struct FlagBenchmark {
    id: &'static str,
    description: &'static str,
    fixture: Fixture,
    mode: Mode,
    default: bool,
    expected: bool,
}

impl FlagBenchmark {
    pub fn new(id: &'static str, description: &'static str, fixture: Fixture, mode: Mode) -> Self {
        Self {
            id,
            description,
            fixture,
            mode,
            default: false,
            expected: false,
        }
    }

    /// Default passed to every evaluation
    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    /// Value every evaluation must return
    pub fn expecting(mut self, expected: bool) -> Self {
        self.expected = expected;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn check(&self, actual: bool) -> BenchResult<()> {
        if actual != self.expected {
            return Err(BenchmarkError::ValueMismatch {
                case: self.id.to_string(),
                expected: self.expected,
                actual,
            });
        }
        Ok(())
    }

    fn evaluation_error(&self, iteration: u64, source: ProviderError) -> BenchmarkError {
        BenchmarkError::Evaluation {
            case: self.id.to_string(),
            iteration,
            source,
        }
    }

    fn measure_serial(&self, b: &mut Bencher) -> BenchResult<()> {
        let provider = self.fixture.provider.as_ref();
        let identity = &self.fixture.identity;
        let flag_key = self.fixture.flag_key.as_str();
        let mut last = None;

        b.reset_timer();
        driver::run_serial(b.iterations(), |_| {
            last = Some(provider.bool_variation(identity, flag_key, self.default)?);
            Ok::<_, ProviderError>(())
        })
        .map_err(|(iteration, source)| self.evaluation_error(iteration, source))?;
        b.stop_timer();

        match last {
            Some(actual) => self.check(actual),
            None => Ok(()),
        }
    }

    fn measure_parallel(&self, b: &mut Bencher, workers: usize) -> BenchResult<()> {
        let provider = self.fixture.provider.as_ref();
        let identity = &self.fixture.identity;
        let flag_key = self.fixture.flag_key.as_str();
        let default = self.default;
        let ran = AtomicBool::new(false);

        b.reset_timer();
        let outcomes: Vec<WorkerOutcome> = driver::run_parallel(workers, b.iterations(), |pb| {
            let mut last = None;
            while pb.next() {
                ran.store(true, Ordering::Relaxed);
                match provider.bool_variation(identity, flag_key, default) {
                    Ok(value) => last = Some(value),
                    Err(source) => return Err((pb.executed() - 1, source)),
                }
            }
            Ok(last)
        });
        b.stop_timer();

        let mut values = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(value) => values.extend(value),
                Err((iteration, source)) => return Err(self.evaluation_error(iteration, source)),
            }
        }

        if ran.load(Ordering::Relaxed) {
            for actual in values {
                self.check(actual)?;
            }
        }
        Ok(())
    }
}

impl BenchTarget for FlagBenchmark {
    fn id(&self) -> &str {
        self.id
    }

    fn description(&self) -> &str {
        self.description
    }

    fn category(&self) -> &str {
        self.fixture.provider_name()
    }

    fn run(&self, driver: &Driver) -> BenchResult<BenchmarkResult> {
        let measurement = driver.run(|b| match self.mode {
            Mode::Serial => self.measure_serial(b),
            Mode::Parallel { workers } => self.measure_parallel(b, workers),
        })?;

        let workers = match self.mode {
            Mode::Serial => 1,
            Mode::Parallel { workers } => workers,
        };

        Ok(BenchmarkResult::from_measurement(self.id, &measurement)
            .with_metric("provider", serde_json::json!(self.fixture.provider_name()))
            .with_metric("mode", serde_json::json!(self.mode.to_string()))
            .with_metric("workers", serde_json::json!(workers))
            .with_metric("flag_key", serde_json::json!(self.fixture.flag_key)))
    }
}
