use std::path::Path;

use anyhow::Context;
use elastisim_state::{RunStore, ScalingEventKind};

use super::run::format_decision;

pub fn report(store_path: &Path, run_id: Option<&str>, format: &str) -> anyhow::Result<()> {
    let store = RunStore::open(store_path)
        .with_context(|| format!("opening run store {}", store_path.display()))?;

    let Some(run_id) = run_id else {
        let runs = store.list_runs()?;
        match format {
            "json" => println!("{}", serde_json::to_string_pretty(&runs)?),
            _ => {
                if runs.is_empty() {
                    println!("no runs recorded in {}", store_path.display());
                }
                for run in runs {
                    println!("{run}");
                }
            }
        }
        return Ok(());
    };

    let ticks = store.list_ticks(run_id)?;
    let events = store.list_events(run_id)?;
    if ticks.is_empty() && events.is_empty() {
        anyhow::bail!("run {run_id} not found in {}", store_path.display());
    }

    if format == "json" {
        let body = serde_json::json!({ "run_id": run_id, "ticks": ticks, "events": events });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("run {run_id}: {} ticks, {} scaling events", ticks.len(), events.len());
    println!();
    println!(
        "  {:>8}  {:>6}  {:>5}  {:>6}  {:>8}  {:>7}  {:>7}",
        "time", "active", "prov", "util", "decision", "running", "pending"
    );
    for tick in &ticks {
        let util = tick
            .mean_utilization
            .map(|u| format!("{u:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>8.1}  {:>6}  {:>5}  {:>6}  {:>8}  {:>7}  {:>7}",
            tick.time,
            tick.active_units,
            tick.provisioning_units,
            util,
            format_decision(&tick.decision),
            tick.running_jobs,
            tick.pending_jobs,
        );
    }

    if !events.is_empty() {
        println!();
        for event in &events {
            let units: Vec<String> = event.units.iter().map(ToString::to_string).collect();
            let kind = match event.kind {
                ScalingEventKind::ScaleUp => "scale-up",
                ScalingEventKind::ScaleDown => "scale-down",
                ScalingEventKind::CreateFailed => "create-failed",
            };
            print!("  t={:.1} {kind} [{}]", event.time, units.join(", "));
            if event.kind == ScalingEventKind::ScaleDown {
                print!(" moved {} requeued {}", event.moved, event.requeued);
            }
            println!();
        }
    }

    Ok(())
}
