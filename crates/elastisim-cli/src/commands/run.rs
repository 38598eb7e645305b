use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use elastisim_core::{ElastiConfig, ScalingDecision};
use elastisim_sim::{Simulation, SimulationReport};
use elastisim_state::RunStore;
use tracing::info;

pub fn run(
    config_path: &Path,
    store: Option<&Path>,
    run_id: Option<String>,
    seed: Option<u64>,
    format: &str,
) -> anyhow::Result<()> {
    let mut config = ElastiConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(seed) = seed {
        config.simulation.seed = seed;
    }

    let mut simulation = Simulation::from_config(&config)?;
    if let Some(path) = store {
        let store = RunStore::open(path)
            .with_context(|| format!("opening run store {}", path.display()))?;
        info!(path = %path.display(), "recording run");
        simulation = simulation.with_store(store);
    }
    if let Some(run_id) = run_id {
        simulation = simulation.with_run_id(run_id);
    }

    let report = simulation.run()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{}", format_report(&report)),
    }

    Ok(())
}

pub fn format_decision(decision: &ScalingDecision) -> String {
    match decision {
        ScalingDecision::NoAction => "-".to_string(),
        ScalingDecision::ScaleUp { count } => format!("+{count}"),
        ScalingDecision::ScaleDown { count } => format!("-{count}"),
    }
}

/// Human-readable summary of a finished run.
pub fn format_report(report: &SimulationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run {} ended at t={:.1}", report.run_id, report.ended_at);
    let _ = writeln!(
        out,
        "  units: {} requested, {} active, {} failed, {} destroyed (peak {}, final {})",
        report.units_requested,
        report.units_activated,
        report.units_failed,
        report.units_destroyed,
        report.peak_units,
        report.final_units,
    );
    let _ = writeln!(
        out,
        "  jobs:  {} submitted, {} completed, {} running, {} pending",
        report.jobs_submitted, report.jobs_completed, report.jobs_running, report.jobs_pending,
    );
    let _ = writeln!(
        out,
        "         {} migrated, {} requeued",
        report.jobs_migrated, report.jobs_requeued,
    );

    if !report.timeline.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  {:>8}  {:>5}  {:>6}", "time", "units", "util");
        for point in &report.timeline {
            let util = point
                .mean_utilization
                .map(|u| format!("{u:.2}"))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(out, "  {:>8.1}  {:>5}  {:>6}", point.time, point.units, util);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_render_as_signed_counts() {
        assert_eq!(format_decision(&ScalingDecision::NoAction), "-");
        assert_eq!(format_decision(&ScalingDecision::ScaleUp { count: 2 }), "+2");
        assert_eq!(format_decision(&ScalingDecision::ScaleDown { count: 1 }), "-1");
    }

    #[test]
    fn report_lists_every_tick() {
        let mut config = ElastiConfig::scaffold();
        config.simulation.until = 50.0;
        let report = Simulation::from_config(&config).unwrap().run().unwrap();

        let text = format_report(&report);
        assert!(text.starts_with("run seed-42"));
        // Header, summary lines, blank line, column header, then one row per tick.
        assert_eq!(text.lines().count(), 6 + report.timeline.len());
    }
}
