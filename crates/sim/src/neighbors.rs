use airspace_shared::{AircraftState, TrafficSnapshot};
use glam::DVec2;

use crate::geo::LocalFrame;

/// Relative state of one intruder as seen from an agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborRecord<'a> {
    pub id: &'a str,
    /// Index of the intruder in the snapshot.
    pub index: usize,
    /// Intruder minus own position, (east, north) meters.
    pub rel_position: DVec2,
    /// Intruder minus own velocity, m/s.
    pub rel_velocity: DVec2,
    /// cos/sin of atan2(dvy, dvx).
    pub track_cos: f64,
    pub track_sin: f64,
    pub distance: f64,
}

/// A snapshot projected once into the local frame.
///
/// Built once per tick and shared read-only by every agent's observation, so
/// all agents see the same positions.
#[derive(Debug, Clone)]
pub struct ProjectedTraffic<'a> {
    snapshot: &'a TrafficSnapshot,
    positions: Vec<DVec2>,
    velocities: Vec<DVec2>,
}

impl<'a> ProjectedTraffic<'a> {
    pub fn new(snapshot: &'a TrafficSnapshot, frame: &LocalFrame) -> Self {
        let positions = snapshot
            .aircraft
            .iter()
            .map(|ac| frame.project(ac.position()))
            .collect();
        let velocities = snapshot.aircraft.iter().map(AircraftState::velocity).collect();
        Self {
            snapshot,
            positions,
            velocities,
        }
    }

    pub fn snapshot(&self) -> &'a TrafficSnapshot {
        self.snapshot
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn aircraft(&self, index: usize) -> &'a AircraftState {
        &self.snapshot.aircraft[index]
    }

    pub fn position(&self, index: usize) -> DVec2 {
        self.positions[index]
    }

    pub fn velocity(&self, index: usize) -> DVec2 {
        self.velocities[index]
    }

    /// Up to `slot_budget` nearest intruders of `agent`, nearest first.
    ///
    /// Ties keep snapshot order. The agent itself is never returned, even if
    /// another aircraft shares its position.
    pub fn rank(&self, agent: usize, slot_budget: usize) -> Vec<NeighborRecord<'a>> {
        let own_pos = self.positions[agent];
        let own_vel = self.velocities[agent];

        let mut by_distance: Vec<(f64, usize)> = self
            .positions
            .iter()
            .enumerate()
            .map(|(i, p)| (p.distance(own_pos), i))
            .collect();
        // stable: equal distances stay in traversal order
        by_distance.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        by_distance
            .into_iter()
            .filter(|&(_, i)| i != agent)
            .take(slot_budget)
            .map(|(distance, i)| {
                let rel_velocity = self.velocities[i] - own_vel;
                let track = f64::atan2(rel_velocity.y, rel_velocity.x);
                NeighborRecord {
                    id: &self.snapshot.aircraft[i].id,
                    index: i,
                    rel_position: self.positions[i] - own_pos,
                    rel_velocity,
                    track_cos: track.cos(),
                    track_sin: track.sin(),
                    distance,
                }
            })
            .collect()
    }
}

/// Rank the intruders of the aircraft with the given id.
///
/// Returns `None` if `agent_id` is not in the snapshot. Callers ranking more
/// than one agent per tick should build one [`ProjectedTraffic`] and reuse it.
pub fn rank_neighbors<'a>(
    snapshot: &'a TrafficSnapshot,
    frame: &LocalFrame,
    agent_id: &str,
    slot_budget: usize,
) -> Option<Vec<NeighborRecord<'a>>> {
    let agent = snapshot.index_of(agent_id)?;
    Some(ProjectedTraffic::new(snapshot, frame).rank(agent, slot_budget))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::point_at_distance;
    use airspace_shared::GeoPoint;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    const CENTER: GeoPoint = GeoPoint::new(52.0, 4.0);

    fn aircraft(id: &str, p: GeoPoint, hdg: f64, gs: f64) -> AircraftState {
        AircraftState {
            id: id.into(),
            lat: p.lat,
            lon: p.lon,
            hdg,
            gs,
            tas: gs,
            cas: gs,
        }
    }

    /// Aircraft placed at the given (bearing, km) offsets from the center.
    fn snapshot_at(offsets: &[(f64, f64)]) -> TrafficSnapshot {
        let fleet = offsets
            .iter()
            .enumerate()
            .map(|(i, &(brg, km))| aircraft(&format!("AC{i}"), point_at_distance(CENTER, km, brg), 0.0, 130.0))
            .collect();
        TrafficSnapshot::new(0.0, fleet)
    }

    #[test]
    fn test_rank_orders_by_distance_and_excludes_self() {
        let snapshot = snapshot_at(&[(0.0, 0.0), (90.0, 8.0), (180.0, 2.0), (270.0, 5.0), (45.0, 1.0)]);
        let frame = LocalFrame::new(CENTER);
        let ranked = ProjectedTraffic::new(&snapshot, &frame).rank(0, 10);

        let ids: Vec<&str> = ranked.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["AC4", "AC2", "AC3", "AC1"]);
        assert!((ranked[0].distance - 1000.0).abs() < 1e-3);
        assert!((ranked[3].distance - 8000.0).abs() < 1e-3);
    }

    #[test]
    fn test_rank_respects_slot_budget() {
        let snapshot = snapshot_at(&[(0.0, 0.0), (90.0, 8.0), (180.0, 2.0), (270.0, 5.0), (45.0, 1.0), (10.0, 3.0)]);
        let frame = LocalFrame::new(CENTER);
        let ranked = ProjectedTraffic::new(&snapshot, &frame).rank(0, 4);
        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked.last().map(|n| n.id), Some("AC3"));
    }

    #[test]
    fn test_rank_empty_without_intruders() {
        let snapshot = snapshot_at(&[(0.0, 1.0)]);
        let frame = LocalFrame::new(CENTER);
        assert!(ProjectedTraffic::new(&snapshot, &frame).rank(0, 4).is_empty());
    }

    #[test]
    fn test_rank_ties_keep_traversal_order() {
        // AC2..AC4 share one position 2 km from the agent
        let snapshot = snapshot_at(&[(0.0, 0.0), (180.0, 3.0), (60.0, 2.0), (60.0, 2.0), (60.0, 2.0)]);
        let frame = LocalFrame::new(CENTER);
        let ranked = ProjectedTraffic::new(&snapshot, &frame).rank(0, 4);
        let ids: Vec<&str> = ranked.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["AC2", "AC3", "AC4", "AC1"]);
    }

    #[test]
    fn test_colocated_intruder_is_kept() {
        let snapshot = snapshot_at(&[(0.0, 3.0), (0.0, 3.0), (90.0, 1.0)]);
        let frame = LocalFrame::new(CENTER);
        let ranked = ProjectedTraffic::new(&snapshot, &frame).rank(1, 4);
        let ids: Vec<&str> = ranked.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["AC0", "AC2"]);
        assert_eq!(ranked[0].distance, 0.0);
    }

    #[test]
    fn test_intruder_due_east() {
        let agent = point_at_distance(CENTER, 5.0, 0.0);
        let intruder = point_at_distance(agent, 1.0, 90.0);
        let snapshot = TrafficSnapshot::new(
            0.0,
            vec![aircraft("OWN", agent, 0.0, 130.0), aircraft("EAST", intruder, 0.0, 130.0)],
        );
        let frame = LocalFrame::new(agent);
        let ranked = rank_neighbors(&snapshot, &frame, "OWN", 4).unwrap();
        assert_eq!(ranked.len(), 1);
        let n = &ranked[0];
        assert!((n.rel_position.x - 1000.0).abs() < 1e-6);
        assert!(n.rel_position.y.abs() < 1e-6);
        assert!((n.distance - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_relative_velocity_and_track() {
        // own flies north, intruder flies east, both 100 m/s
        let snapshot = TrafficSnapshot::new(
            0.0,
            vec![
                aircraft("OWN", CENTER, 0.0, 100.0),
                aircraft("INT", point_at_distance(CENTER, 3.0, 45.0), 90.0, 100.0),
            ],
        );
        let frame = LocalFrame::new(CENTER);
        let n = rank_neighbors(&snapshot, &frame, "OWN", 1).unwrap()[0];
        // velocity components are (gs cos hdg, gs sin hdg)
        assert!((n.rel_velocity.x + 100.0).abs() < 1e-9);
        assert!((n.rel_velocity.y - 100.0).abs() < 1e-9);
        let track = f64::atan2(n.track_sin, n.track_cos);
        assert!((track - 3.0 * std::f64::consts::FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_agent() {
        let snapshot = snapshot_at(&[(0.0, 1.0)]);
        let frame = LocalFrame::new(CENTER);
        assert!(rank_neighbors(&snapshot, &frame, "NOPE", 4).is_none());
    }

    #[test]
    fn test_random_traffic_invariants() {
        let mut rng = Pcg64::seed_from_u64(7);
        let frame = LocalFrame::new(CENTER);
        for _ in 0..50 {
            let n = rng.gen_range(1..25);
            let offsets: Vec<(f64, f64)> = (0..n)
                .map(|_| (rng.gen_range(0.0..360.0), rng.gen_range(0.0..150.0)))
                .collect();
            let snapshot = snapshot_at(&offsets);
            let projected = ProjectedTraffic::new(&snapshot, &frame);
            let budget = rng.gen_range(0..6);
            for agent in 0..n {
                let ranked = projected.rank(agent, budget);
                assert_eq!(ranked.len(), budget.min(n - 1));
                assert!(ranked.iter().all(|r| r.index != agent));
                assert!(ranked.windows(2).all(|w| w[0].distance <= w[1].distance));
            }
        }
    }
}
