use std::collections::HashMap;

use airspace_shared::*;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::decoder::{target_bearing, ActionDecoder, CommandSink};
use crate::geo::LocalFrame;
use crate::neighbors::ProjectedTraffic;
use crate::observation::{observer_for, Batching, ObservationBuilder};
use crate::policy::{Policy, PolicyError};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("policy returned {got} action values for {agent}, expected {expected}")]
    ActionWidth { agent: AircraftId, expected: usize, got: usize },
    #[error("policy returned {got} action rows for {expected} observations")]
    ActionCount { expected: usize, got: usize },
    #[error("observation of {agent} is {got} wide, policy expects {expected}")]
    ObservationWidth { agent: AircraftId, expected: usize, got: usize },
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    /// Seen, not yet through a control tick.
    Spawned,
    Active,
}

/// Per-agent bookkeeping kept between ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentState {
    /// Heading the agent is steered back to. Set at spawn; only path
    /// planning rewrites it.
    pub target_heading: f64,
    pub phase: AgentPhase,
}

/// What one control tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u32,
    pub time: f64,
    pub agents: usize,
    pub commands: usize,
    pub spawned: Vec<AircraftId>,
    pub removed: Vec<AircraftId>,
}

/// How a decoded action reaches the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Actuator {
    /// HDG and SPD commands to the traffic authority.
    HeadingSpeed,
    /// Rewrites the agent's target heading; nothing is emitted.
    TargetBearing,
}

/// Fixed-rate observe -> infer -> decode -> emit loop over all live aircraft.
///
/// The loop owns the policy and the target heading table. Traffic comes in
/// as an immutable snapshot per tick and commands go out through a
/// [`CommandSink`]; nothing else is shared with the caller.
pub struct ControlLoop {
    config: ControlConfig,
    frame: LocalFrame,
    observer: Box<dyn ObservationBuilder>,
    decoder: ActionDecoder,
    actuator: Actuator,
    policy: Box<dyn Policy>,
    agents: HashMap<AircraftId, AgentState>,
    tick: u32,
    next_due: Option<f64>,
}

impl ControlLoop {
    pub fn new(config: ControlConfig, policy: Box<dyn Policy>) -> Result<Self, ControlError> {
        config.validate()?;
        let actuator = match config.variant {
            VariantConfig::PathPlanning(_) => Actuator::TargetBearing,
            VariantConfig::FixedSlot(_) | VariantConfig::Airspace(_) => Actuator::HeadingSpeed,
        };
        Ok(Self {
            frame: LocalFrame::new(config.center),
            observer: observer_for(&config.variant),
            decoder: ActionDecoder::new(config.decoder),
            actuator,
            policy,
            agents: HashMap::new(),
            tick: 0,
            next_due: None,
            config,
        })
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u32 {
        self.tick
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agent(&self, id: &str) -> Option<&AgentState> {
        self.agents.get(id)
    }

    pub fn target_heading(&self, id: &str) -> Option<f64> {
        self.agents.get(id).map(|a| a.target_heading)
    }

    /// Register an agent. Its target heading is its current heading, so it
    /// starts with zero drift. Returns `false` if the id is already known.
    pub fn spawn(&mut self, ac: &AircraftState) -> bool {
        if self.agents.contains_key(&ac.id) {
            return false;
        }
        info!(agent = %ac.id, target_heading = ac.hdg, "agent spawned");
        self.agents.insert(
            ac.id.clone(),
            AgentState {
                target_heading: ac.hdg,
                phase: AgentPhase::Spawned,
            },
        );
        true
    }

    /// Spawn agents new to `snapshot` and forget those missing from it.
    pub fn sync_agents(&mut self, snapshot: &TrafficSnapshot) -> (Vec<AircraftId>, Vec<AircraftId>) {
        let spawned: Vec<AircraftId> = snapshot
            .aircraft
            .iter()
            .filter(|ac| self.spawn(ac))
            .map(|ac| ac.id.clone())
            .collect();

        let mut removed: Vec<AircraftId> = self
            .agents
            .keys()
            .filter(|id| snapshot.index_of(id).is_none())
            .cloned()
            .collect();
        removed.sort();
        for id in &removed {
            self.agents.remove(id);
            info!(agent = %id, "agent removed");
        }
        (spawned, removed)
    }

    /// Run a tick if one is due at `snapshot.time`.
    ///
    /// The first call always ticks; later ticks fall on a fixed grid of
    /// `tick_interval` from there. Late snapshots tick once, missed slots
    /// are not replayed.
    pub fn advance(&mut self, snapshot: &TrafficSnapshot, sink: &mut dyn CommandSink) -> Result<Option<TickReport>, ControlError> {
        let interval = self.config.tick_interval;
        let due = self.next_due.unwrap_or(snapshot.time);
        if snapshot.time + 1e-9 < due {
            return Ok(None);
        }
        let mut next = due + interval;
        while next <= snapshot.time + 1e-9 {
            next += interval;
        }
        self.next_due = Some(next);
        self.tick(snapshot, sink).map(Some)
    }

    /// Run one control tick over every aircraft in `snapshot`.
    ///
    /// A failure aborts the rest of the tick. Commands already handed to
    /// `sink` stay issued.
    pub fn tick(&mut self, snapshot: &TrafficSnapshot, sink: &mut dyn CommandSink) -> Result<TickReport, ControlError> {
        let tick = self.tick;
        self.tick += 1;

        let (spawned, removed) = self.sync_agents(snapshot);
        let commands = match self.run(snapshot, sink) {
            Ok(commands) => commands,
            Err(err) => {
                error!(tick, time = snapshot.time, %err, "control tick failed");
                return Err(err);
            }
        };
        for agent in self.agents.values_mut() {
            agent.phase = AgentPhase::Active;
        }

        debug!(tick, time = snapshot.time, agents = snapshot.len(), commands, "control tick");
        Ok(TickReport {
            tick,
            time: snapshot.time,
            agents: snapshot.len(),
            commands,
            spawned,
            removed,
        })
    }

    fn run(&mut self, snapshot: &TrafficSnapshot, sink: &mut dyn CommandSink) -> Result<usize, ControlError> {
        if snapshot.is_empty() {
            return Ok(0);
        }
        let traffic = ProjectedTraffic::new(snapshot, &self.frame);
        let observations = self.observe_all(&traffic)?;

        match self.observer.batching() {
            Batching::Joint => {
                let rows = self.policy.infer(&observations)?;
                if rows.len() != observations.len() {
                    return Err(ControlError::ActionCount {
                        expected: observations.len(),
                        got: rows.len(),
                    });
                }
                // every row is checked before anything is emitted
                let actions = snapshot
                    .aircraft
                    .iter()
                    .zip(&rows)
                    .map(|(ac, row)| self.decoder.action(&ac.id, row))
                    .collect::<Result<Vec<_>, _>>()?;

                let mut issued = 0;
                for (ac, action) in snapshot.aircraft.iter().zip(actions) {
                    issued += self.actuate(ac, action, sink);
                }
                Ok(issued)
            }
            Batching::PerAgent => {
                let mut issued = 0;
                for (ac, obs) in snapshot.aircraft.iter().zip(&observations) {
                    let rows = self.policy.infer(std::slice::from_ref(obs))?;
                    let [row] = rows.as_slice() else {
                        return Err(ControlError::ActionCount {
                            expected: 1,
                            got: rows.len(),
                        });
                    };
                    let action = self.decoder.action(&ac.id, row)?;
                    issued += self.actuate(ac, action, sink);
                }
                Ok(issued)
            }
        }
    }

    /// Observations of every aircraft, in snapshot order.
    fn observe_all(&self, traffic: &ProjectedTraffic<'_>) -> Result<Vec<Observation>, ControlError> {
        let snapshot = traffic.snapshot();
        let targets: Vec<f64> = snapshot
            .aircraft
            .iter()
            .map(|ac| self.target_heading(&ac.id).unwrap_or(ac.hdg))
            .collect();

        let observer = self.observer.as_ref();
        let observations: Vec<Observation> = if self.config.parallel_observations {
            (0..traffic.len())
                .into_par_iter()
                .map(|i| observer.observe(traffic, i, targets[i]))
                .collect()
        } else {
            (0..traffic.len())
                .map(|i| observer.observe(traffic, i, targets[i]))
                .collect()
        };

        if let Some(expected) = observer.width() {
            for (ac, obs) in snapshot.aircraft.iter().zip(&observations) {
                if obs.len() != expected {
                    return Err(ControlError::ObservationWidth {
                        agent: ac.id.clone(),
                        expected,
                        got: obs.len(),
                    });
                }
            }
        }
        Ok(observations)
    }

    /// Returns the number of commands issued.
    fn actuate(&mut self, ac: &AircraftState, action: Action, sink: &mut dyn CommandSink) -> usize {
        match self.actuator {
            Actuator::HeadingSpeed => {
                self.decoder.emit(ac, action, sink);
                2
            }
            Actuator::TargetBearing => {
                let bearing = target_bearing(action);
                if let Some(agent) = self.agents.get_mut(&ac.id) {
                    agent.target_heading = bearing;
                }
                0
            }
        }
    }
}
