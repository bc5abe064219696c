use std::path::Path;

use rayon::prelude::*;

use airspace_sim::analyzer::{analyze, SeparationMetrics};
use airspace_sim::{run_scenario, ControlLoop};

use crate::{load_config, load_scenario, policy_unsupported, resolve_policy, Variant};

/// Outcome of one policy on the shared scenario.
struct CompareRow {
    policy: String,
    metrics: SeparationMetrics,
}

/// Fly the same scenario once per policy, in parallel, and print a
/// separation table sorted from safest to least safe.
pub fn cmd_compare(scenario_path: &Path, variant: Variant, policies: &str, config_path: Option<&Path>) -> Result<(), String> {
    let config = load_config(variant, config_path)?;
    let scenario = load_scenario(scenario_path)?;
    let names: Vec<&str> = policies.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if names.is_empty() {
        return Err("Compare requires at least one policy.".into());
    }
    let (names, skipped): (Vec<&str>, Vec<&str>) =
        names.into_iter().partition(|name| policy_unsupported(name, &config).is_none());
    for name in &skipped {
        if let Some(reason) = policy_unsupported(name, &config) {
            println!("Skipping {name}: {reason}");
        }
    }
    if names.is_empty() {
        return Err(format!("No policy in '{policies}' runs on the {} variant.", config.variant.name()));
    }

    println!(
        "Comparing {} policies on '{}' ({} variant)",
        names.len(),
        scenario.name,
        config.variant.name()
    );

    let mut rows = names
        .par_iter()
        .map(|name| -> Result<CompareRow, String> {
            let policy = resolve_policy(name, &config)?;
            let mut control = ControlLoop::new(config.clone(), policy).map_err(|e| e.to_string())?;
            let replay = run_scenario(&scenario, &mut control).map_err(|e| format!("{name}: {e}"))?;
            Ok(CompareRow {
                policy: name.to_string(),
                metrics: analyze(&replay),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    rows.sort_by(|a, b| {
        let da = a.metrics.min_separation_m.unwrap_or(f64::INFINITY);
        let db = b.metrics.min_separation_m.unwrap_or(f64::INFINITY);
        a.metrics
            .intrusion_frames
            .cmp(&b.metrics.intrusion_frames)
            .then(db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal))
    });

    println!();
    println!("{:<24} {:>12} {:>10} {:>10} {:>9}", "Policy", "Min sep (m)", "Intr.frm", "Intr.pair", "Commands");
    println!("{:-<24} {:->12} {:->10} {:->10} {:->9}", "", "", "", "", "");
    for row in &rows {
        let m = &row.metrics;
        let min_sep = m.min_separation_m.map_or("n/a".to_string(), |d| format!("{d:.0}"));
        println!(
            "{:<24} {:>12} {:>10} {:>10} {:>9}",
            row.policy,
            min_sep,
            m.intrusion_frames,
            m.intrusion_pairs.len(),
            m.commands
        );
    }
    Ok(())
}
