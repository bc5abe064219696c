use std::collections::BTreeSet;

use airspace_shared::*;

use crate::geo::bearing_and_distance;

/// Separation statistics of a replay.
///
/// Frames are only recorded at control ticks, so everything here is sampled
/// at the tick interval and can miss a short intrusion between ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationMetrics {
    /// Smallest pairwise distance seen in any frame, meters.
    pub min_separation_m: Option<f64>,
    /// Ids of the pair at `min_separation_m`.
    pub closest_pair: Option<(AircraftId, AircraftId)>,
    /// Frames with at least one pair inside the intrusion radius.
    pub intrusion_frames: u32,
    /// Distinct pairs that were inside the intrusion radius at some frame.
    pub intrusion_pairs: Vec<(AircraftId, AircraftId)>,
    pub commands: usize,
}

/// Analyze a replay against the default 5 NM intrusion radius.
pub fn analyze(replay: &Replay) -> SeparationMetrics {
    analyze_with_radius(replay, INTRUSION_DISTANCE_NM * NM_TO_M)
}

pub fn analyze_with_radius(replay: &Replay, radius_m: f64) -> SeparationMetrics {
    let mut min_separation_m: Option<f64> = None;
    let mut closest_pair = None;
    let mut intrusion_frames = 0u32;
    let mut intrusion_pairs = BTreeSet::new();

    for frame in &replay.frames {
        let mut intruded = false;
        for (i, a) in frame.aircraft.iter().enumerate() {
            for b in &frame.aircraft[i + 1..] {
                let (_, km) = bearing_and_distance(a.position(), b.position());
                let d = km * 1000.0;
                if min_separation_m.map_or(true, |m| d < m) {
                    min_separation_m = Some(d);
                    closest_pair = Some(ordered(&a.id, &b.id));
                }
                if d < radius_m {
                    intruded = true;
                    intrusion_pairs.insert(ordered(&a.id, &b.id));
                }
            }
        }
        if intruded {
            intrusion_frames += 1;
        }
    }

    SeparationMetrics {
        min_separation_m,
        closest_pair,
        intrusion_frames,
        intrusion_pairs: intrusion_pairs.into_iter().collect(),
        commands: replay.command_count(),
    }
}

fn ordered(a: &str, b: &str) -> (AircraftId, AircraftId) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
