use airspace_shared::Observation;

use crate::observation::{FixedSlotObserver, NeighborFeature};

/// Nearest intruder recovered from a fixed-slot observation, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intruder {
    pub rel_x: f64,
    pub rel_y: f64,
    pub distance: f64,
}

/// Drift in degrees from the leading cos/sin(drift) pair.
///
/// Every conflict resolution observation starts with that pair.
pub fn drift_deg(obs: &Observation) -> f64 {
    match obs.data.as_slice() {
        [cos, sin, ..] => f64::atan2(*sin as f64, *cos as f64).to_degrees(),
        _ => 0.0,
    }
}

/// De-normalize the first neighbor slot. Zero-padded slots count as empty.
///
/// The range is taken from the relative position rather than the distance
/// feature. The distance feature is offset, so a tight clip saturates it for
/// near intruders, while a clipped position only ever reads too far.
pub fn nearest_intruder(observer: &FixedSlotObserver, obs: &Observation) -> Option<Intruder> {
    let x = observer.neighbor_feature(obs, 0, NeighborFeature::X)?;
    let y = observer.neighbor_feature(obs, 0, NeighborFeature::Y)?;
    let d = observer.neighbor_feature(obs, 0, NeighborFeature::Distance)?;
    let tc = observer.neighbor_feature(obs, 0, NeighborFeature::TrackCos)?;
    let ts = observer.neighbor_feature(obs, 0, NeighborFeature::TrackSin)?;
    if x == 0.0 && y == 0.0 && d == 0.0 && tc == 0.0 && ts == 0.0 {
        return None;
    }

    let norm = &observer.config().norm;
    let rel_x = norm.rel_x.invert(x);
    let rel_y = norm.rel_y.invert(y);
    Some(Intruder {
        rel_x,
        rel_y,
        distance: rel_x.hypot(rel_y),
    })
}
