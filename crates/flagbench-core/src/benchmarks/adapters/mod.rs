//! Benchmark cases
//!
//! Every case implements [`BenchTarget`]. The catalog of case ids is static so
//! it can be listed without credentials; targets themselves need ready
//! fixtures.

mod flag_benchmarks;

pub use flag_benchmarks::{FlagBenchmark, Mode};

use super::driver::Driver;
use super::result::BenchmarkResult;
use crate::config::HarnessConfig;
use crate::error::BenchResult;
use crate::fixtures::{Fixture, Fixtures};

/// A measurable benchmark case.
pub trait BenchTarget: Send + Sync {
    /// Unique, kebab-case identifier (e.g. `devcycle-parallel`)
    fn id(&self) -> &str;

    /// Run the case under `driver` and return its measurement.
    ///
    /// Fails on the first evaluation error or unexpected value.
    fn run(&self, driver: &Driver) -> BenchResult<BenchmarkResult>;

    fn description(&self) -> &str {
        "No description provided"
    }

    fn category(&self) -> &str {
        "general"
    }
}

/// Which fixture a case evaluates against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    DevCycle,
    LaunchDarkly,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::DevCycle => "devcycle",
            ProviderKind::LaunchDarkly => "launchdarkly",
        }
    }

    fn fixture<'a>(&self, fixtures: &'a Fixtures) -> &'a Fixture {
        match self {
            ProviderKind::DevCycle => &fixtures.devcycle,
            ProviderKind::LaunchDarkly => &fixtures.launchdarkly,
        }
    }
}

/// Static description of one case
#[derive(Debug, Clone, Copy)]
pub struct CaseInfo {
    pub id: &'static str,
    pub description: &'static str,
    pub provider: ProviderKind,
    pub parallel: bool,
}

/// Every case, in run order
pub const CASES: [CaseInfo; 4] = [
    CaseInfo {
        id: "devcycle",
        description: "DevCycle boolean variable evaluation, single loop",
        provider: ProviderKind::DevCycle,
        parallel: false,
    },
    CaseInfo {
        id: "devcycle-parallel",
        description: "DevCycle boolean variable evaluation across parallel workers",
        provider: ProviderKind::DevCycle,
        parallel: true,
    },
    CaseInfo {
        id: "current-provider",
        description: "LaunchDarkly boolean variation, single loop",
        provider: ProviderKind::LaunchDarkly,
        parallel: false,
    },
    CaseInfo {
        id: "current-provider-parallel",
        description: "LaunchDarkly boolean variation across parallel workers",
        provider: ProviderKind::LaunchDarkly,
        parallel: true,
    },
];

pub fn case_info(id: &str) -> Option<&'static CaseInfo> {
    CASES.iter().find(|c| c.id == id)
}

fn build_target(info: &CaseInfo, fixtures: &Fixtures, harness: &HarnessConfig) -> Box<dyn BenchTarget> {
    let mode = if info.parallel {
        Mode::Parallel {
            workers: harness.workers,
        }
    } else {
        Mode::Serial
    };
    let fixture = info.provider.fixture(fixtures).clone();
    Box::new(
        FlagBenchmark::new(info.id, info.description, fixture, mode)
            .with_default(harness.default_value)
            .expecting(harness.expected),
    )
}

/// All cases, in run order
pub fn all_targets(fixtures: &Fixtures, harness: &HarnessConfig) -> Vec<Box<dyn BenchTarget>> {
    CASES
        .iter()
        .map(|info| build_target(info, fixtures, harness))
        .collect()
}
