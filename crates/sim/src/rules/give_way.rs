use airspace_shared::{FixedSlotConfig, Observation, INTRUSION_DISTANCE_NM, NM_TO_M};

use super::heading_hold::HeadingHoldPolicy;
use super::situation::nearest_intruder;
use crate::observation::FixedSlotObserver;
use crate::policy::{Policy, PolicyError};

/// Rule-based resolver for fixed-slot observations: turns right at full rate
/// while the nearest intruder is inside the intrusion radius, otherwise
/// steers back onto the target heading.
pub struct GiveWayPolicy {
    observer: FixedSlotObserver,
    hold: HeadingHoldPolicy,
    radius_m: f64,
}

impl GiveWayPolicy {
    pub fn new(config: FixedSlotConfig, d_heading_deg: f64) -> Self {
        Self {
            observer: FixedSlotObserver::new(config),
            hold: HeadingHoldPolicy::new(d_heading_deg),
            radius_m: INTRUSION_DISTANCE_NM * NM_TO_M,
        }
    }

    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    pub fn act(&self, obs: &Observation) -> Vec<f32> {
        match nearest_intruder(&self.observer, obs) {
            Some(intruder) if intruder.distance < self.radius_m => vec![1.0, 0.0],
            _ => self.hold.act(obs),
        }
    }
}

impl Policy for GiveWayPolicy {
    fn name(&self) -> &str {
        "give_way"
    }

    fn infer(&mut self, batch: &[Observation]) -> Result<Vec<Vec<f32>>, PolicyError> {
        Ok(batch.iter().map(|obs| self.act(obs)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{point_at_distance, LocalFrame};
    use crate::neighbors::ProjectedTraffic;
    use crate::observation::ObservationBuilder;
    use airspace_shared::*;

    fn aircraft(id: &str, p: GeoPoint, hdg: f64) -> AircraftState {
        AircraftState {
            id: id.into(),
            lat: p.lat,
            lon: p.lon,
            hdg,
            gs: 130.0,
            tas: 130.0,
            cas: 130.0,
        }
    }

    fn config(shortfall: ShortfallPolicy, layout: FeatureLayout) -> FixedSlotConfig {
        FixedSlotConfig {
            slot_budget: 3,
            obs_clip: Some(MULTI_AGENT_OBS_CLIP),
            shortfall,
            layout,
            norm: FixedSlotNorm::default(),
        }
    }

    fn observe(config: FixedSlotConfig, intruder_km: Option<f64>) -> Observation {
        let center = GeoPoint::new(52.0, 4.0);
        let mut fleet = vec![aircraft("OWN", center, 0.0)];
        if let Some(km) = intruder_km {
            fleet.push(aircraft("INT", point_at_distance(center, km, 0.0), 180.0));
        }
        let snapshot = TrafficSnapshot::new(0.0, fleet);
        let frame = LocalFrame::new(center);
        let traffic = ProjectedTraffic::new(&snapshot, &frame);
        FixedSlotObserver::new(config).observe(&traffic, 0, 0.0)
    }

    #[test]
    fn test_turns_right_inside_radius() {
        for layout in [FeatureLayout::NeighborMajor, FeatureLayout::FeatureMajor] {
            for shortfall in [ShortfallPolicy::ZeroPad, ShortfallPolicy::Truncate] {
                let cfg = config(shortfall, layout);
                let policy = GiveWayPolicy::new(cfg, D_HEADING_DEG);
                assert_eq!(policy.act(&observe(cfg, Some(4.0))), vec![1.0, 0.0]);
            }
        }
    }

    #[test]
    fn test_holds_outside_radius() {
        let cfg = config(ShortfallPolicy::ZeroPad, FeatureLayout::NeighborMajor);
        let policy = GiveWayPolicy::new(cfg, D_HEADING_DEG);
        assert_eq!(policy.act(&observe(cfg, Some(20.0))), vec![0.0, 0.0]);
    }

    #[test]
    fn test_padded_slot_is_not_an_intruder() {
        let cfg = config(ShortfallPolicy::ZeroPad, FeatureLayout::NeighborMajor);
        let policy = GiveWayPolicy::new(cfg, D_HEADING_DEG).with_radius(60_000.0);
        // an empty slot decodes to 50 km, inside this radius, but must be ignored
        assert_eq!(policy.act(&observe(cfg, None)), vec![0.0, 0.0]);
    }
}
