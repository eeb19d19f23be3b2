//! flagbench command-line runner
//!
//! # Usage
//!
//! ```bash
//! # Run every case with the default fixtures
//! DC_KEY=... LD_KEY=... flagbench run
//!
//! # Run the parallel cases for a fixed iteration count and save results
//! flagbench run --case devcycle-parallel --case current-provider-parallel \
//!     --iterations 100000 --output .
//!
//! # Rebuild the summary from stored results
//! flagbench report --output .
//! ```
//!
//! # Exit Codes
//!
//! - 0: every selected case passed
//! - 1: a case failed (evaluation error or unexpected value)
//! - 2: fixture setup failed
//! - 3: invalid arguments or configuration
//! - 4: results could not be read or written
//! - 10: internal error

mod cli;

use clap::Parser;
use flagbench_core::benchmarks::alloc::CountingAllocator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn main() {
    let cli = cli::FlagbenchCli::parse();
    init_tracing(cli.json_logs);

    let exit_code = cli::run_cli(cli);
    std::process::exit(exit_code.into());
}
