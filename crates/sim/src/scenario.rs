use airspace_shared::*;
use tracing::{info, warn};

use crate::control_loop::{ControlError, ControlLoop};
use crate::decoder::CommandSink;
use crate::traffic::TrafficTable;

/// Fly a scripted scenario against a control loop.
///
/// The traffic table is stepped every `scenario.dt` seconds and the control
/// loop is offered each snapshot; a frame is recorded whenever it ticks.
/// Scheduled spawns and removals apply at the first step at or after their
/// time.
pub fn run_scenario(scenario: &Scenario, control: &mut ControlLoop) -> Result<Replay, ControlError> {
    let valid_dt = scenario.dt > 0.0 && scenario.dt.is_finite();
    let valid_duration = scenario.duration >= 0.0 && scenario.duration.is_finite();
    if !valid_dt || !valid_duration {
        return Err(ConfigError::Invalid {
            field: "scenario",
            reason: format!("dt {} / duration {} do not describe a run", scenario.dt, scenario.duration),
        }
        .into());
    }

    let mut table = TrafficTable::new(0.0, scenario.aircraft.clone());
    let mut spawns: Vec<&ScheduledSpawn> = scenario.spawns.iter().collect();
    spawns.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
    let mut removals: Vec<&ScheduledRemoval> = scenario.removals.iter().collect();
    removals.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
    let (mut next_spawn, mut next_removal) = (0, 0);

    let steps = (scenario.duration / scenario.dt).round() as u64;
    let mut frames = Vec::new();

    info!(scenario = %scenario.name, policy = control.policy_name(), steps, "scenario started");
    for step in 0..=steps {
        let time = step as f64 * scenario.dt;

        while let Some(s) = spawns.get(next_spawn).filter(|s| s.time <= time + 1e-9) {
            if !table.spawn(s.aircraft.clone()) {
                warn!(id = %s.aircraft.id, "spawn of existing aircraft ignored");
            }
            next_spawn += 1;
        }
        while let Some(r) = removals.get(next_removal).filter(|r| r.time <= time + 1e-9) {
            if table.remove(&r.id).is_none() {
                warn!(id = %r.id, "removal of unknown aircraft ignored");
            }
            next_removal += 1;
        }

        let snapshot = TrafficSnapshot::new(time, table.snapshot().aircraft);
        let mut commands: Vec<Command> = Vec::new();
        if let Some(report) = control.advance(&snapshot, &mut commands)? {
            for command in &commands {
                table.issue(command.clone());
            }
            frames.push(ReplayFrame {
                tick: report.tick,
                time,
                aircraft: snapshot.aircraft,
                commands,
            });
        }

        if step < steps {
            table.step(scenario.dt);
        }
    }

    let final_time = steps as f64 * scenario.dt;
    info!(scenario = %scenario.name, frames = frames.len(), "scenario finished");
    Ok(Replay {
        scenario: scenario.name.clone(),
        config: control.config().clone(),
        frames,
        final_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::HoldPolicy;

    fn scenario(duration: f64) -> Scenario {
        Scenario {
            name: "straight".into(),
            dt: 1.0,
            duration,
            aircraft: vec![AircraftState {
                id: "KL1".into(),
                lat: 52.0,
                lon: 4.0,
                hdg: 45.0,
                gs: 120.0,
                tas: 120.0,
                cas: 120.0,
            }],
            spawns: vec![],
            removals: vec![],
        }
    }

    #[test]
    fn test_frame_per_control_tick() {
        let mut control = ControlLoop::new(ControlConfig::single_agent(), Box::new(HoldPolicy)).unwrap();
        let replay = run_scenario(&scenario(60.0), &mut control).unwrap();
        // t = 0, 5, ..., 60
        assert_eq!(replay.frames.len(), 13);
        assert_eq!(replay.final_time, 60.0);
        assert_eq!(replay.command_count(), 26);
        assert!(replay.frames.windows(2).all(|w| w[1].tick == w[0].tick + 1));
    }

    #[test]
    fn test_rejects_zero_dt() {
        let mut control = ControlLoop::new(ControlConfig::single_agent(), Box::new(HoldPolicy)).unwrap();
        let mut s = scenario(10.0);
        s.dt = 0.0;
        assert!(matches!(run_scenario(&s, &mut control), Err(ControlError::Config(_))));
    }

    #[test]
    fn test_rejects_unbounded_duration() {
        let mut control = ControlLoop::new(ControlConfig::single_agent(), Box::new(HoldPolicy)).unwrap();
        for duration in [f64::INFINITY, f64::NAN, -1.0] {
            let s = scenario(duration);
            assert!(matches!(run_scenario(&s, &mut control), Err(ControlError::Config(_))));
        }
        assert_eq!(control.ticks(), 0);
    }
}
