// Unit conversion
pub const NM_TO_KM: f64 = 1.852;
pub const NM_TO_M: f64 = 1852.0;
pub const MPS_TO_KT: f64 = 1.94384;
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// Policy interface
pub const ACTION_SIZE: usize = 2;
pub const OWN_FEATURES: usize = 3; // cos(drift), sin(drift), airspeed
pub const NEIGHBOR_FEATURES: usize = 7; // x, y, vx, vy, cos(track), sin(track), distance
pub const AIRSPACE_FEATURES: usize = 7; // cos(drift), sin(drift), airspeed, x, y, vx, vy
pub const PATH_FEATURES: usize = 2; // x, y

// Action decoding
pub const D_HEADING_DEG: f64 = 22.5;
pub const D_VELOCITY: f64 = 20.0 / 3.0;

// Control loop timing (simulation seconds)
pub const CR_TICK_INTERVAL: f64 = 5.0;
pub const PATH_TICK_INTERVAL: f64 = 15.0;

// Slot budgets and clip ranges of the deployed conflict resolution policies.
// The multi-agent actor takes 24 inputs = 3 own + 3 slots x 7.
pub const SINGLE_AGENT_SLOTS: usize = 4;
pub const MULTI_AGENT_SLOTS: usize = 3;
pub const SINGLE_AGENT_OBS_CLIP: f32 = 1.2;
pub const MULTI_AGENT_OBS_CLIP: f32 = 12.0;
pub const ATTENTION_ACTION_CLIP: f32 = 1.0;

// Loss of separation radius
pub const INTRUSION_DISTANCE_NM: f64 = 5.0;

// Reference points (lat, lon)
pub const TU_DELFT_CENTER: (f64, f64) = (51.990426702297746, 4.376124857109851);
pub const SCHIPHOL: (f64, f64) = (52.3068953, 4.760783);
pub const PATH_MAX_DISTANCE_KM: f64 = 300.0;

// ONNX validation
pub const MAX_MODEL_SIZE_BYTES: usize = 50 * 1024 * 1024; // 50 MB
pub const CALIBRATION_WARMUP: usize = 10;
pub const CALIBRATION_RUNS: usize = 100;
