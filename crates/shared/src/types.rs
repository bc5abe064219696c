use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config::ControlConfig;

pub type AircraftId = String;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// State of one aircraft as reported by the traffic authority.
///
/// Headings are true degrees clockwise from north, speeds are m/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftState {
    pub id: AircraftId,
    pub lat: f64,
    pub lon: f64,
    pub hdg: f64,
    pub gs: f64,
    pub tas: f64,
    pub cas: f64,
}

impl AircraftState {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    /// Ground velocity as (gs * cos(hdg), gs * sin(hdg)).
    ///
    /// The component order is the one the deployed policies were trained
    /// with; it is NOT the (east, north) order of the local frame.
    pub fn velocity(&self) -> DVec2 {
        let hdg = self.hdg.to_radians();
        DVec2::new(hdg.cos(), hdg.sin()) * self.gs
    }
}

/// Immutable view of all live aircraft at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    pub time: f64,
    pub aircraft: Vec<AircraftState>,
}

impl TrafficSnapshot {
    pub fn new(time: f64, aircraft: Vec<AircraftState>) -> Self {
        Self { time, aircraft }
    }

    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.aircraft.iter().position(|ac| ac.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&AircraftState> {
        self.aircraft.iter().find(|ac| ac.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.aircraft.iter().map(|ac| ac.id.as_str())
    }
}

/// Normalized feature vector handed to a policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub data: Vec<f32>,
}

impl Observation {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clamp every value into `[-limit, limit]`, returning how many were clipped.
    pub fn clip(&mut self, limit: f32) -> usize {
        let mut clipped = 0;
        for v in self.data.iter_mut() {
            let c = v.clamp(-limit, limit);
            if c != *v {
                clipped += 1;
                *v = c;
            }
        }
        clipped
    }
}

impl serde::Serialize for Observation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.as_slice().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Observation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let data: Vec<f32> = Vec::deserialize(deserializer)?;
        Ok(Observation { data })
    }
}

/// Policy output for one agent: heading-delta and speed-delta fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub heading: f32,
    pub speed: f32,
}

impl Action {
    pub fn none() -> Self {
        Self {
            heading: 0.0,
            speed: 0.0,
        }
    }

    /// Interpret a raw policy row. Returns `None` unless the row is exactly
    /// `ACTION_SIZE` wide.
    pub fn from_raw(raw: &[f32]) -> Option<Self> {
        match raw {
            [heading, speed] => Some(Self {
                heading: *heading,
                speed: *speed,
            }),
            _ => None,
        }
    }

    pub fn to_raw(&self) -> [f32; crate::ACTION_SIZE] {
        [self.heading, self.speed]
    }

    pub fn clamped(&self, limit: f32) -> Self {
        Self {
            heading: self.heading.clamp(-limit, limit),
            speed: self.speed.clamp(-limit, limit),
        }
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::none()
    }
}

/// Command emitted to the traffic authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Selected heading, degrees.
    Heading { id: AircraftId, deg: f64 },
    /// Selected calibrated airspeed, knots.
    Speed { id: AircraftId, kt: f64 },
}

impl Command {
    pub fn id(&self) -> &str {
        match self {
            Command::Heading { id, .. } | Command::Speed { id, .. } => id,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Heading { id, deg } => write!(f, "HDG {id} {deg}"),
            Command::Speed { id, kt } => write!(f, "SPD {id} {kt}"),
        }
    }
}

/// Aircraft entering the scenario at a given time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledSpawn {
    pub time: f64,
    pub aircraft: AircraftState,
}

/// Aircraft leaving the scenario at a given time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledRemoval {
    pub time: f64,
    pub id: AircraftId,
}

/// Scripted traffic for a deterministic run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Integration step of the traffic table, seconds.
    pub dt: f64,
    pub duration: f64,
    pub aircraft: Vec<AircraftState>,
    #[serde(default)]
    pub spawns: Vec<ScheduledSpawn>,
    #[serde(default)]
    pub removals: Vec<ScheduledRemoval>,
}

/// Traffic state and issued commands at one control tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub tick: u32,
    pub time: f64,
    pub aircraft: Vec<AircraftState>,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    pub scenario: String,
    pub config: ControlConfig,
    pub frames: Vec<ReplayFrame>,
    pub final_time: f64,
}

impl Replay {
    pub fn command_count(&self) -> usize {
        self.frames.iter().map(|f| f.commands.len()).sum()
    }
}
