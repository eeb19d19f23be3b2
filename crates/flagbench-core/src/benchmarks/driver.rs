//! Benchmark driver
//!
//! Runs a case body with a growing iteration count `N` until one run lasts at
//! least the configured bench time, then reports that final run. Each run gets
//! a fresh [`Bencher`] whose timer and allocation counters start when the body
//! is entered, so anything done before (fixture setup) is never measured.

use super::alloc::{self, AllocSnapshot};
use crate::config::HarnessConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Upper bound on iterations for one run
pub const MAX_ITERATIONS: u64 = 1_000_000_000;

/// Largest factor N may grow by between two runs
const MAX_GROWTH: u64 = 100;

/// Largest batch a parallel worker claims at once
const MAX_GRAIN: u64 = 1_000;

/// Timing and allocation totals of one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub iterations: u64,
    pub elapsed: Duration,
    pub allocs: AllocSnapshot,
    pub allocs_tracked: bool,
}

impl Measurement {
    pub fn ns_per_op(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.elapsed.as_nanos() as f64 / self.iterations as f64
    }

    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.iterations as f64 / secs
        } else {
            0.0
        }
    }

    pub fn allocs_per_op(&self) -> u64 {
        self.allocs.allocations / self.iterations.max(1)
    }

    pub fn bytes_per_op(&self) -> u64 {
        self.allocs.bytes / self.iterations.max(1)
    }
}

/// Per-run timer handed to a case body
#[derive(Debug)]
pub struct Bencher {
    n: u64,
    started: Option<(Instant, AllocSnapshot)>,
    elapsed: Duration,
    allocs: AllocSnapshot,
}

impl Bencher {
    pub fn new(n: u64) -> Self {
        Self {
            n,
            started: None,
            elapsed: Duration::ZERO,
            allocs: AllocSnapshot::default(),
        }
    }

    /// Iterations the body must execute in this run
    pub fn iterations(&self) -> u64 {
        self.n
    }

    pub fn start_timer(&mut self) {
        if self.started.is_none() {
            self.started = Some((Instant::now(), alloc::snapshot()));
        }
    }

    pub fn stop_timer(&mut self) {
        if let Some((start, allocs)) = self.started.take() {
            self.elapsed += start.elapsed();
            self.allocs += alloc::snapshot() - allocs;
        }
    }

    /// Discard everything measured so far, keeping the timer's running state
    pub fn reset_timer(&mut self) {
        if self.started.is_some() {
            self.started = Some((Instant::now(), alloc::snapshot()));
        }
        self.elapsed = Duration::ZERO;
        self.allocs = AllocSnapshot::default();
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    fn finish(mut self, allocs_tracked: bool) -> Measurement {
        self.stop_timer();
        Measurement {
            iterations: self.n,
            elapsed: self.elapsed,
            allocs: self.allocs,
            allocs_tracked,
        }
    }
}

/// Chooses N and runs case bodies
#[derive(Debug, Clone)]
pub struct Driver {
    bench_time: Duration,
    fixed_iterations: Option<u64>,
    allocs_tracked: bool,
}

impl Driver {
    pub fn new(bench_time: Duration) -> Self {
        Self {
            bench_time,
            fixed_iterations: None,
            allocs_tracked: alloc::is_installed(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        let mut driver = Self::new(config.bench_time);
        driver.fixed_iterations = config.iterations;
        driver
    }

    /// Always run exactly `n` iterations
    pub fn with_fixed_iterations(mut self, n: u64) -> Self {
        self.fixed_iterations = Some(n.max(1));
        self
    }

    pub fn bench_time(&self) -> Duration {
        self.bench_time
    }

    /// Run `body` once with exactly `n` iterations
    pub fn run_n<F, E>(&self, n: u64, mut body: F) -> Result<Measurement, E>
    where
        F: FnMut(&mut Bencher) -> Result<(), E>,
    {
        let mut bencher = Bencher::new(n);
        bencher.start_timer();
        body(&mut bencher)?;
        Ok(bencher.finish(self.allocs_tracked))
    }

    /// Run `body` with growing N until a run lasts at least the bench time.
    ///
    /// A body error aborts immediately; no run is retried.
    pub fn run<F, E>(&self, mut body: F) -> Result<Measurement, E>
    where
        F: FnMut(&mut Bencher) -> Result<(), E>,
    {
        if let Some(n) = self.fixed_iterations {
            return self.run_n(n, &mut body);
        }

        let mut n = 1;
        loop {
            let measurement = self.run_n(n, &mut body)?;
            if measurement.elapsed >= self.bench_time || n >= MAX_ITERATIONS {
                return Ok(measurement);
            }
            n = predict_n(n, measurement.elapsed, self.bench_time);
        }
    }
}

/// Next N so that the run lasts about `goal`, with 20% headroom
fn predict_n(last_n: u64, last_elapsed: Duration, goal: Duration) -> u64 {
    let last_ns = last_elapsed.as_nanos().max(1);
    let goal_ns = goal.as_nanos();
    let mut next = (goal_ns.saturating_mul(last_n as u128) / last_ns).min(u64::MAX as u128) as u64;
    next = next.saturating_add(next / 5);
    next = next.min(last_n.saturating_mul(MAX_GROWTH));
    next = next.max(last_n + 1);
    next.min(MAX_ITERATIONS)
}

/// Call `f` with each iteration index in `0..n`, stopping at the first error.
///
/// The error comes back with the index of the failing iteration.
pub fn run_serial<F, E>(n: u64, mut f: F) -> Result<(), (u64, E)>
where
    F: FnMut(u64) -> Result<(), E>,
{
    for i in 0..n {
        f(i).map_err(|e| (i, e))?;
    }
    Ok(())
}

/// Iteration source shared by the workers of one parallel run.
///
/// Workers claim batches from a common budget; once it is spent `next`
/// returns false everywhere, so workers beyond the budget run zero
/// iterations.
pub struct ParallelIter<'a> {
    claimed: &'a AtomicU64,
    total: u64,
    grain: u64,
    local: u64,
    executed: u64,
}

impl<'a> ParallelIter<'a> {
    fn new(claimed: &'a AtomicU64, total: u64, grain: u64) -> Self {
        Self {
            claimed,
            total,
            grain,
            local: 0,
            executed: 0,
        }
    }

    /// Claim the next iteration
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if self.local == 0 {
            let start = self.claimed.fetch_add(self.grain, Ordering::Relaxed);
            if start >= self.total {
                return false;
            }
            self.local = self.grain.min(self.total - start);
        }
        self.local -= 1;
        self.executed += 1;
        true
    }

    /// Iterations this worker has claimed so far
    pub fn executed(&self) -> u64 {
        self.executed
    }
}

fn grain_for(total: u64, workers: usize) -> u64 {
    (total / (workers as u64).saturating_mul(10).max(1)).clamp(1, MAX_GRAIN)
}

/// Run `body` on `workers` threads sharing a budget of `total` iterations.
///
/// Returns each worker's output. Workers do not synchronize with each other
/// beyond claiming iterations.
pub fn run_parallel<F, T>(workers: usize, total: u64, body: F) -> Vec<T>
where
    F: Fn(&mut ParallelIter<'_>) -> T + Sync,
    T: Send,
{
    let workers = workers.max(1);
    let claimed = AtomicU64::new(0);
    let grain = grain_for(total, workers);
    let body = &body;
    let claimed = &claimed;

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let spawned = std::thread::Builder::new()
                .name(format!("bench-worker-{}", index))
                .stack_size(256 * 1024)
                .spawn_scoped(scope, move || {
                    let mut iter = ParallelIter::new(claimed, total, grain);
                    body(&mut iter)
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::warn!(spawned = index, error = %e, "could not spawn more benchmark workers");
                    break;
                }
            }
        }

        if handles.is_empty() {
            let mut iter = ParallelIter::new(claimed, total, grain);
            return vec![body(&mut iter)];
        }

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(output) => output,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
