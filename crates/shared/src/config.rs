use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;
use crate::types::GeoPoint;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Affine feature normalization: `(value - offset) / divisor`.
///
/// These are calibration artifacts of a trained policy and have to change
/// in lockstep with it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    #[serde(default)]
    pub offset: f64,
    pub divisor: f64,
}

impl Scale {
    pub const fn new(offset: f64, divisor: f64) -> Self {
        Self { offset, divisor }
    }

    pub const fn divisor(divisor: f64) -> Self {
        Self {
            offset: 0.0,
            divisor,
        }
    }

    #[inline]
    pub fn apply(&self, value: f64) -> f32 {
        ((value - self.offset) / self.divisor) as f32
    }

    #[inline]
    pub fn invert(&self, value: f32) -> f64 {
        value as f64 * self.divisor + self.offset
    }

    fn check(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.divisor == 0.0 || !self.divisor.is_finite() || !self.offset.is_finite() {
            return Err(invalid(field, format!("bad scale {:?}", self)));
        }
        Ok(())
    }
}

/// What to do when fewer intruders are alive than the slot budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Fill missing slots with zeros so the vector keeps its declared width.
    #[default]
    ZeroPad,
    /// Emit only the slots that exist; the vector gets shorter.
    Truncate,
}

/// Ordering of the neighbor segment of a fixed-slot observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLayout {
    /// x0 y0 vx0 vy0 cos0 sin0 d0 x1 y1 ...
    #[default]
    NeighborMajor,
    /// x0 x1 .. y0 y1 .. vx0 vx1 .. d0 d1 ..
    FeatureMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedSlotNorm {
    pub airspeed: Scale,
    pub rel_x: Scale,
    pub rel_y: Scale,
    pub rel_vx: Scale,
    pub rel_vy: Scale,
    pub distance: Scale,
}

impl Default for FixedSlotNorm {
    fn default() -> Self {
        Self {
            airspeed: Scale::new(150.0, 6.0),
            rel_x: Scale::divisor(13000.0),
            rel_y: Scale::divisor(13000.0),
            rel_vx: Scale::divisor(32.0),
            rel_vy: Scale::divisor(66.0),
            distance: Scale::new(50000.0, 15000.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedSlotConfig {
    pub slot_budget: usize,
    pub obs_clip: Option<f32>,
    #[serde(default)]
    pub shortfall: ShortfallPolicy,
    #[serde(default)]
    pub layout: FeatureLayout,
    #[serde(default)]
    pub norm: FixedSlotNorm,
}

impl FixedSlotConfig {
    /// Declared observation width, `None` when truncation makes it variable.
    pub fn width(&self) -> Option<usize> {
        match self.shortfall {
            ShortfallPolicy::ZeroPad => Some(OWN_FEATURES + self.slot_budget * NEIGHBOR_FEATURES),
            ShortfallPolicy::Truncate => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirspaceNorm {
    pub airspeed: Scale,
    pub x: Scale,
    pub y: Scale,
    pub vx: Scale,
    pub vy: Scale,
}

impl Default for AirspaceNorm {
    fn default() -> Self {
        Self {
            airspeed: Scale::new(150.0, 50.0),
            x: Scale::divisor(50000.0),
            y: Scale::divisor(50000.0),
            vx: Scale::divisor(150.0),
            vy: Scale::divisor(150.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AirspaceConfig {
    #[serde(default)]
    pub obs_clip: Option<f32>,
    #[serde(default)]
    pub norm: AirspaceNorm,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPlanningConfig {
    pub reference: GeoPoint,
    pub max_distance_km: f64,
}

impl Default for PathPlanningConfig {
    fn default() -> Self {
        Self {
            reference: SCHIPHOL.into(),
            max_distance_km: PATH_MAX_DISTANCE_KM,
        }
    }
}

/// Observation strategy of a control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantConfig {
    /// Per-agent policy call over own state plus ranked nearest intruders.
    FixedSlot(FixedSlotConfig),
    /// One joint policy call over every agent's own/absolute state.
    Airspace(AirspaceConfig),
    /// Per-agent waypoint steering that rewrites the target heading.
    PathPlanning(PathPlanningConfig),
}

impl VariantConfig {
    pub fn name(&self) -> &'static str {
        match self {
            VariantConfig::FixedSlot(_) => "fixed_slot",
            VariantConfig::Airspace(_) => "airspace",
            VariantConfig::PathPlanning(_) => "path_planning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Degrees of heading change per unit action.
    pub d_heading_deg: f64,
    /// Speed change per unit action, added to CAS in m/s.
    pub d_velocity: f64,
    /// Conversion applied to the new CAS before it is commanded (m/s -> kt).
    pub speed_command_factor: f64,
    #[serde(default)]
    pub action_clip: Option<f32>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            d_heading_deg: D_HEADING_DEG,
            d_velocity: D_VELOCITY,
            speed_command_factor: MPS_TO_KT,
            action_clip: None,
        }
    }
}

/// Everything a control loop needs that is tied to the deployed policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Simulation seconds between control ticks.
    pub tick_interval: f64,
    /// Origin of the local (east, north) frame.
    pub center: GeoPoint,
    pub variant: VariantConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub parallel_observations: bool,
}

impl ControlConfig {
    /// Single-agent conflict resolution (SAC policy, 4 slots, inputs clipped to 1.2).
    pub fn single_agent() -> Self {
        Self {
            tick_interval: CR_TICK_INTERVAL,
            center: TU_DELFT_CENTER.into(),
            variant: VariantConfig::FixedSlot(FixedSlotConfig {
                slot_budget: SINGLE_AGENT_SLOTS,
                obs_clip: Some(SINGLE_AGENT_OBS_CLIP),
                shortfall: ShortfallPolicy::default(),
                layout: FeatureLayout::default(),
                norm: FixedSlotNorm::default(),
            }),
            decoder: DecoderConfig::default(),
            parallel_observations: false,
        }
    }

    /// Multi-agent conflict resolution (feed-forward actor, 3 slots, inputs clipped to 12).
    pub fn multi_agent() -> Self {
        Self {
            variant: VariantConfig::FixedSlot(FixedSlotConfig {
                slot_budget: MULTI_AGENT_SLOTS,
                obs_clip: Some(MULTI_AGENT_OBS_CLIP),
                shortfall: ShortfallPolicy::default(),
                layout: FeatureLayout::default(),
                norm: FixedSlotNorm::default(),
            }),
            ..Self::single_agent()
        }
    }

    /// Multi-agent attention actor: joint call, raw inputs, actions clipped to 1.
    pub fn attention() -> Self {
        Self {
            variant: VariantConfig::Airspace(AirspaceConfig::default()),
            decoder: DecoderConfig {
                action_clip: Some(ATTENTION_ACTION_CLIP),
                ..DecoderConfig::default()
            },
            ..Self::single_agent()
        }
    }

    pub fn path_planning() -> Self {
        Self {
            tick_interval: PATH_TICK_INTERVAL,
            variant: VariantConfig::PathPlanning(PathPlanningConfig::default()),
            ..Self::single_agent()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: ControlConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_interval > 0.0) || !self.tick_interval.is_finite() {
            return Err(invalid("tick_interval", format!("{} is not a positive time", self.tick_interval)));
        }
        if !(-90.0..=90.0).contains(&self.center.lat) || !(-180.0..=180.0).contains(&self.center.lon) {
            return Err(invalid("center", format!("{:?} is not a geographic position", self.center)));
        }
        check_clip("decoder.action_clip", self.decoder.action_clip)?;
        if !self.decoder.d_heading_deg.is_finite() || !self.decoder.d_velocity.is_finite() {
            return Err(invalid("decoder", "non-finite action scale"));
        }
        if !(self.decoder.speed_command_factor > 0.0) {
            return Err(invalid("decoder.speed_command_factor", "must be positive"));
        }

        match &self.variant {
            VariantConfig::FixedSlot(c) => {
                if c.slot_budget == 0 {
                    return Err(invalid("variant.slot_budget", "must be at least 1"));
                }
                check_clip("variant.obs_clip", c.obs_clip)?;
                c.norm.airspeed.check("variant.norm.airspeed")?;
                c.norm.rel_x.check("variant.norm.rel_x")?;
                c.norm.rel_y.check("variant.norm.rel_y")?;
                c.norm.rel_vx.check("variant.norm.rel_vx")?;
                c.norm.rel_vy.check("variant.norm.rel_vy")?;
                c.norm.distance.check("variant.norm.distance")?;
            }
            VariantConfig::Airspace(c) => {
                check_clip("variant.obs_clip", c.obs_clip)?;
                c.norm.airspeed.check("variant.norm.airspeed")?;
                c.norm.x.check("variant.norm.x")?;
                c.norm.y.check("variant.norm.y")?;
                c.norm.vx.check("variant.norm.vx")?;
                c.norm.vy.check("variant.norm.vy")?;
            }
            VariantConfig::PathPlanning(c) => {
                if !(c.max_distance_km > 0.0) {
                    return Err(invalid("variant.max_distance_km", "must be positive"));
                }
            }
        }
        Ok(())
    }
}

fn check_clip(field: &'static str, clip: Option<f32>) -> Result<(), ConfigError> {
    match clip {
        Some(c) if !(c > 0.0) => Err(invalid(field, format!("{c} is not a positive bound"))),
        _ => Ok(()),
    }
}
