use airspace_shared::*;
use tracing::warn;

use crate::decoder::CommandSink;
use crate::geo::{normalize_360, point_at_distance};

/// In-memory traffic authority for scenario runs.
///
/// Commands take effect immediately and aircraft fly straight at constant
/// speed between them. There is no performance model: a commanded speed
/// becomes the CAS, TAS and ground speed at once.
#[derive(Debug, Clone, Default)]
pub struct TrafficTable {
    time: f64,
    aircraft: Vec<AircraftState>,
}

impl TrafficTable {
    pub fn new(time: f64, aircraft: Vec<AircraftState>) -> Self {
        Self { time, aircraft }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AircraftState> {
        self.aircraft.iter().find(|ac| ac.id == id)
    }

    /// Add an aircraft. Returns `false` if the id is taken.
    pub fn spawn(&mut self, ac: AircraftState) -> bool {
        if self.get(&ac.id).is_some() {
            return false;
        }
        self.aircraft.push(ac);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<AircraftState> {
        let idx = self.aircraft.iter().position(|ac| ac.id == id)?;
        Some(self.aircraft.remove(idx))
    }

    /// Apply a command. Returns `false` if the aircraft is unknown.
    pub fn apply(&mut self, command: &Command) -> bool {
        let Some(ac) = self.aircraft.iter_mut().find(|ac| ac.id == command.id()) else {
            return false;
        };
        match *command {
            Command::Heading { deg, .. } => ac.hdg = normalize_360(deg),
            Command::Speed { kt, .. } => {
                let speed = kt / MPS_TO_KT;
                ac.cas = speed;
                ac.tas = speed;
                ac.gs = speed;
            }
        }
        true
    }

    /// Advance every aircraft `dt` seconds along its heading.
    pub fn step(&mut self, dt: f64) {
        for ac in self.aircraft.iter_mut() {
            let p = point_at_distance(ac.position(), ac.gs * dt / 1000.0, ac.hdg);
            ac.lat = p.lat;
            ac.lon = p.lon;
        }
        self.time += dt;
    }

    pub fn snapshot(&self) -> TrafficSnapshot {
        TrafficSnapshot::new(self.time, self.aircraft.clone())
    }
}

impl CommandSink for TrafficTable {
    fn issue(&mut self, command: Command) {
        if !self.apply(&command) {
            warn!(%command, "command for unknown aircraft dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::bearing_and_distance;

    fn aircraft(id: &str, hdg: f64, gs: f64) -> AircraftState {
        AircraftState {
            id: id.into(),
            lat: 52.0,
            lon: 4.0,
            hdg,
            gs,
            tas: gs,
            cas: gs,
        }
    }

    #[test]
    fn test_step_flies_along_heading() {
        let mut table = TrafficTable::new(0.0, vec![aircraft("KL1", 90.0, 100.0)]);
        let start = table.get("KL1").unwrap().position();
        for _ in 0..10 {
            table.step(1.0);
        }
        assert_eq!(table.time(), 10.0);
        let (brg, km) = bearing_and_distance(start, table.get("KL1").unwrap().position());
        assert!((km - 1.0).abs() < 1e-6);
        assert!((brg - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_commands_apply() {
        let mut table = TrafficTable::new(0.0, vec![aircraft("KL1", 90.0, 100.0)]);
        table.issue(Command::Heading { id: "KL1".into(), deg: -20.0 });
        table.issue(Command::Speed { id: "KL1".into(), kt: 250.0 });
        let ac = table.get("KL1").unwrap();
        assert_eq!(ac.hdg, 340.0);
        assert!((ac.cas * MPS_TO_KT - 250.0).abs() < 1e-9);
        assert_eq!(ac.gs, ac.cas);
    }

    #[test]
    fn test_unknown_command_is_dropped() {
        let mut table = TrafficTable::new(0.0, vec![aircraft("KL1", 90.0, 100.0)]);
        assert!(!table.apply(&Command::Heading { id: "NOPE".into(), deg: 0.0 }));
        table.issue(Command::Speed { id: "NOPE".into(), kt: 1.0 });
        assert_eq!(table.get("KL1").unwrap().gs, 100.0);
    }

    #[test]
    fn test_spawn_and_remove() {
        let mut table = TrafficTable::default();
        assert!(table.spawn(aircraft("A", 0.0, 100.0)));
        assert!(!table.spawn(aircraft("A", 10.0, 100.0)));
        assert!(table.spawn(aircraft("B", 0.0, 100.0)));
        assert_eq!(table.len(), 2);
        assert_eq!(table.remove("A").map(|ac| ac.id), Some("A".to_string()));
        assert!(table.remove("A").is_none());
        let ids: Vec<String> = table.snapshot().aircraft.into_iter().map(|ac| ac.id).collect();
        assert_eq!(ids, vec!["B".to_string()]);
    }
}
