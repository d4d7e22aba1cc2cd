#![forbid(unsafe_code)]

//! Synthetic-load driver: runs the deterministic stress scenarios and
//! prints each report as JSON.
//!
//! ```text
//! RUST_LOG=cadre_runtime=debug cargo run -p cadre-harness --bin cadre-stress
//! ```

use cadre_core::config::SchedulerConfig;
use cadre_harness::{StressConfig, run_stress};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let scenarios = [
        ("default", StressConfig::default()),
        (
            "tight-cap",
            StressConfig {
                scheduler: SchedulerConfig::default().with_max_batch_size(5),
                ..StressConfig::default()
            },
        ),
        (
            "burst",
            StressConfig {
                items: 100,
                waves: 20,
                items_per_wave: 50,
                sets_per_item: 8,
                ..StressConfig::default()
            },
        ),
    ];

    let mut failures = 0;
    for (name, config) in scenarios {
        let report = run_stress(&config);
        match report.verify() {
            Ok(()) => tracing::info!(
                scenario = name,
                submits = report.submits,
                executed = report.metrics.ops_executed,
                coalesced = report.metrics.ops_coalesced,
                cycles = report.metrics.cycles_run,
                frames = report.frames,
                "scenario passed"
            ),
            Err(violation) => {
                failures += 1;
                tracing::error!(scenario = name, %violation, "scenario failed");
            }
        }
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{name}: {json}"),
            Err(error) => tracing::error!(scenario = name, %error, "report not serializable"),
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }
}
