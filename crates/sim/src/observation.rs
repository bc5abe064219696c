use airspace_shared::*;
use tracing::debug;

use crate::geo::{bearing_and_distance, wrap_180};
use crate::neighbors::{NeighborRecord, ProjectedTraffic};

/// How observations of one tick are grouped into policy calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Batching {
    /// One policy call per agent.
    PerAgent,
    /// A single policy call over every agent of the tick.
    Joint,
}

/// Builds the feature vector of one agent from a projected snapshot.
pub trait ObservationBuilder: Send + Sync {
    fn name(&self) -> &'static str;
    fn batching(&self) -> Batching;
    /// Declared observation width, `None` if it depends on the traffic.
    fn width(&self) -> Option<usize>;
    fn observe(&self, traffic: &ProjectedTraffic<'_>, agent: usize, target_heading: f64) -> Observation;
}

/// Signed heading error in degrees, `[-180, 180)`.
#[inline]
pub fn drift(heading: f64, target_heading: f64) -> f64 {
    wrap_180(heading - target_heading)
}

pub fn observer_for(variant: &VariantConfig) -> Box<dyn ObservationBuilder> {
    match *variant {
        VariantConfig::FixedSlot(config) => Box::new(FixedSlotObserver::new(config)),
        VariantConfig::Airspace(config) => Box::new(AirspaceObserver::new(config)),
        VariantConfig::PathPlanning(config) => Box::new(PathObserver::new(config)),
    }
}

fn clip(obs: &mut Observation, limit: Option<f32>, agent: &str) {
    if let Some(limit) = limit {
        let clipped = obs.clip(limit);
        if clipped > 0 {
            debug!(agent, clipped, limit, "observation values clipped");
        }
    }
}

// ---------------------------------------------------------------------------
// Fixed-slot
// ---------------------------------------------------------------------------

/// Per-neighbor features, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum NeighborFeature {
    X = 0,
    Y,
    Vx,
    Vy,
    TrackCos,
    TrackSin,
    Distance,
}

/// Own drift/airspeed followed by the nearest `slot_budget` intruders.
#[derive(Debug, Clone, Copy)]
pub struct FixedSlotObserver {
    config: FixedSlotConfig,
}

impl FixedSlotObserver {
    pub fn new(config: FixedSlotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FixedSlotConfig {
        &self.config
    }

    fn encode(&self, n: &NeighborRecord<'_>) -> [f32; NEIGHBOR_FEATURES] {
        let norm = &self.config.norm;
        [
            norm.rel_x.apply(n.rel_position.x),
            norm.rel_y.apply(n.rel_position.y),
            norm.rel_vx.apply(n.rel_velocity.x),
            norm.rel_vy.apply(n.rel_velocity.y),
            n.track_cos as f32,
            n.track_sin as f32,
            norm.distance.apply(n.distance),
        ]
    }

    /// Number of neighbor slots present in `obs`.
    pub fn slot_count(&self, obs: &Observation) -> usize {
        obs.len().saturating_sub(OWN_FEATURES) / NEIGHBOR_FEATURES
    }

    /// Read one normalized neighbor feature back out of an observation.
    pub fn neighbor_feature(&self, obs: &Observation, slot: usize, feature: NeighborFeature) -> Option<f32> {
        let slots = self.slot_count(obs);
        if slot >= slots {
            return None;
        }
        let f = feature as usize;
        let idx = match self.config.layout {
            FeatureLayout::NeighborMajor => OWN_FEATURES + slot * NEIGHBOR_FEATURES + f,
            FeatureLayout::FeatureMajor => OWN_FEATURES + f * slots + slot,
        };
        obs.data.get(idx).copied()
    }
}

impl ObservationBuilder for FixedSlotObserver {
    fn name(&self) -> &'static str {
        "fixed_slot"
    }

    fn batching(&self) -> Batching {
        Batching::PerAgent
    }

    fn width(&self) -> Option<usize> {
        self.config.width()
    }

    fn observe(&self, traffic: &ProjectedTraffic<'_>, agent: usize, target_heading: f64) -> Observation {
        let ac = traffic.aircraft(agent);
        let budget = self.config.slot_budget;

        let mut slots: Vec<[f32; NEIGHBOR_FEATURES]> = traffic
            .rank(agent, budget)
            .iter()
            .map(|n| self.encode(n))
            .collect();
        if slots.len() < budget {
            match self.config.shortfall {
                ShortfallPolicy::ZeroPad => slots.resize(budget, [0.0; NEIGHBOR_FEATURES]),
                ShortfallPolicy::Truncate => debug!(agent = %ac.id, slots = slots.len(), budget, "short observation"),
            }
        }

        let d = drift(ac.hdg, target_heading).to_radians();
        let mut data = Vec::with_capacity(OWN_FEATURES + slots.len() * NEIGHBOR_FEATURES);
        data.push(d.cos() as f32);
        data.push(d.sin() as f32);
        data.push(self.config.norm.airspeed.apply(ac.tas));

        match self.config.layout {
            FeatureLayout::NeighborMajor => {
                for slot in &slots {
                    data.extend_from_slice(slot);
                }
            }
            FeatureLayout::FeatureMajor => {
                for f in 0..NEIGHBOR_FEATURES {
                    data.extend(slots.iter().map(|slot| slot[f]));
                }
            }
        }

        let mut obs = Observation::new(data);
        clip(&mut obs, self.config.obs_clip, &ac.id);
        obs
    }
}

// ---------------------------------------------------------------------------
// Whole airspace
// ---------------------------------------------------------------------------

/// Own drift, airspeed, absolute local position and velocity. Neighbors are
/// left to the policy, which sees every agent in one joint call.
#[derive(Debug, Clone, Copy)]
pub struct AirspaceObserver {
    config: AirspaceConfig,
}

impl AirspaceObserver {
    pub fn new(config: AirspaceConfig) -> Self {
        Self { config }
    }
}

impl ObservationBuilder for AirspaceObserver {
    fn name(&self) -> &'static str {
        "airspace"
    }

    fn batching(&self) -> Batching {
        Batching::Joint
    }

    fn width(&self) -> Option<usize> {
        Some(AIRSPACE_FEATURES)
    }

    fn observe(&self, traffic: &ProjectedTraffic<'_>, agent: usize, target_heading: f64) -> Observation {
        let ac = traffic.aircraft(agent);
        let norm = &self.config.norm;
        let pos = traffic.position(agent);
        let vel = traffic.velocity(agent);
        let d = drift(ac.hdg, target_heading).to_radians();

        let mut obs = Observation::new(vec![
            d.cos() as f32,
            d.sin() as f32,
            norm.airspeed.apply(ac.tas),
            norm.x.apply(pos.x),
            norm.y.apply(pos.y),
            norm.vx.apply(vel.x),
            norm.vy.apply(vel.y),
        ]);
        clip(&mut obs, self.config.obs_clip, &ac.id);
        obs
    }
}

// ---------------------------------------------------------------------------
// Path planning
// ---------------------------------------------------------------------------

/// Position relative to a reference point, scaled by the planning radius.
#[derive(Debug, Clone, Copy)]
pub struct PathObserver {
    config: PathPlanningConfig,
}

impl PathObserver {
    pub fn new(config: PathPlanningConfig) -> Self {
        Self { config }
    }
}

impl ObservationBuilder for PathObserver {
    fn name(&self) -> &'static str {
        "path_planning"
    }

    fn batching(&self) -> Batching {
        Batching::PerAgent
    }

    fn width(&self) -> Option<usize> {
        Some(PATH_FEATURES)
    }

    fn observe(&self, traffic: &ProjectedTraffic<'_>, agent: usize, _target_heading: f64) -> Observation {
        let ac = traffic.aircraft(agent);
        let (brg, dist_km) = bearing_and_distance(self.config.reference, ac.position());
        let b = brg.to_radians();
        let scale = dist_km / self.config.max_distance_km;
        Observation::new(vec![(b.sin() * scale) as f32, (b.cos() * scale) as f32])
    }
}
