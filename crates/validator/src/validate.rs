use std::path::Path;
use std::time::{Duration, Instant};

use airspace_shared::{
    ControlConfig, Observation, VariantConfig, ACTION_SIZE, CALIBRATION_RUNS, CALIBRATION_WARMUP,
    MAX_MODEL_SIZE_BYTES, OWN_FEATURES,
};
use airspace_sim::observation::observer_for;
use airspace_sim::{Policy, PolicyError};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Tensor, ValueType};
use thiserror::Error;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Model file too large: {0} bytes (max {1})")]
    FileTooLarge(usize, usize),
    #[error("Invalid input shape: expected {expected}, got {got:?}")]
    InvalidInputShape { expected: String, got: Vec<i64> },
    #[error("Invalid output shape: expected [.., 2] float32, got {0:?}")]
    InvalidOutputShape(Vec<i64>),
    #[error("Inference too slow: {0}ms (budget {1}ms)")]
    InferenceTooSlow(u128, u128),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ONNX runtime error: {0}")]
    OrtError(String),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl From<ort::Error> for ValidationError {
    fn from(e: ort::Error) -> Self {
        ValidationError::OrtError(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Model contract
// ---------------------------------------------------------------------------

/// How a batch of observations is laid out as one input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// `[N, D]`, one row per agent.
    Rows,
    /// `[1, N, D]`, the whole airspace as one sequence.
    Joint,
}

impl InputLayout {
    pub fn for_config(config: &ControlConfig) -> Self {
        match config.variant {
            VariantConfig::Airspace(_) => InputLayout::Joint,
            VariantConfig::FixedSlot(_) | VariantConfig::PathPlanning(_) => InputLayout::Rows,
        }
    }

    fn rank(&self) -> usize {
        match self {
            InputLayout::Rows => 2,
            InputLayout::Joint => 3,
        }
    }
}

/// Shapes a model must accept and produce to drive a given configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelContract {
    pub layout: InputLayout,
    /// Observation width, `None` when it varies with the traffic.
    pub feature_dim: Option<usize>,
}

impl ModelContract {
    pub fn for_config(config: &ControlConfig) -> Self {
        Self {
            layout: InputLayout::for_config(config),
            feature_dim: observer_for(&config.variant).width(),
        }
    }

    fn describe(&self) -> String {
        let d = self.feature_dim.map_or("D".to_string(), |d| d.to_string());
        match self.layout {
            InputLayout::Rows => format!("[N, {d}] float32"),
            InputLayout::Joint => format!("[1, N, {d}] float32"),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

/// Summary of a validated ONNX model.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub file_size_bytes: usize,
    pub input_shape: Vec<i64>,
    pub output_shape: Vec<i64>,
}

// ---------------------------------------------------------------------------
// validate_model_file
// ---------------------------------------------------------------------------

/// Validate an ONNX model file against a contract.
///
/// Checks performed:
/// 1. File size <= MAX_MODEL_SIZE_BYTES
/// 2. Model can be loaded by ONNX Runtime
/// 3. First input is float32 with the layout's rank; the feature dim matches
///    the contract when both are fixed
/// 4. First output is float32 with ACTION_SIZE as its last dim
pub fn validate_model_file(path: &Path, contract: &ModelContract) -> Result<ValidationReport, ValidationError> {
    let file_size_bytes = std::fs::metadata(path)?.len() as usize;
    if file_size_bytes > MAX_MODEL_SIZE_BYTES {
        return Err(ValidationError::FileTooLarge(file_size_bytes, MAX_MODEL_SIZE_BYTES));
    }

    let session = Session::builder()?.commit_from_file(path)?;

    let input_shape = match session.inputs().first() {
        Some(input) => float_tensor_dims(input.dtype()),
        None => None,
    };
    let input_shape = input_shape
        .filter(|dims| input_matches(dims, contract))
        .ok_or_else(|| ValidationError::InvalidInputShape {
            expected: contract.describe(),
            got: session
                .inputs()
                .first()
                .and_then(|i| float_tensor_dims(i.dtype()))
                .unwrap_or_default(),
        })?;

    let output_dims = session.outputs().first().and_then(|o| float_tensor_dims(o.dtype()));
    let output_shape = match output_dims {
        Some(dims) if dims.len() >= 2 && dims.last() == Some(&(ACTION_SIZE as i64)) => dims,
        other => return Err(ValidationError::InvalidOutputShape(other.unwrap_or_default())),
    };

    info!(
        path = %path.display(),
        size = file_size_bytes,
        input = ?input_shape,
        output = ?output_shape,
        "model validated"
    );
    Ok(ValidationReport {
        file_size_bytes,
        input_shape,
        output_shape,
    })
}

/// Dims of a float32 tensor type, `None` for anything else.
fn float_tensor_dims(dtype: &ValueType) -> Option<Vec<i64>> {
    match dtype {
        ValueType::Tensor { ty, shape, .. } if *ty == TensorElementType::Float32 => Some(shape.iter().copied().collect()),
        _ => None,
    }
}

fn input_matches(dims: &[i64], contract: &ModelContract) -> bool {
    if dims.len() != contract.layout.rank() {
        return false;
    }
    // a sequence model takes one airspace per call
    if contract.layout == InputLayout::Joint && dims[0] != 1 && dims[0] != -1 {
        return false;
    }
    match (contract.feature_dim, dims.last()) {
        (Some(d), Some(&last)) => last == -1 || last == d as i64,
        _ => true,
    }
}

// ---------------------------------------------------------------------------
// OnnxPolicy
// ---------------------------------------------------------------------------

/// An ort `Session` behind the `Policy` trait.
pub struct OnnxPolicy {
    session: Session,
    name: String,
    layout: InputLayout,
    feature_dim: Option<usize>,
}

impl OnnxPolicy {
    /// Load an ONNX model from disk and wrap it as a `Policy`.
    ///
    /// This does **not** run `validate_model_file`; call that separately if
    /// you need the report.
    pub fn load(path: &Path, contract: ModelContract) -> Result<Self, ValidationError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx_policy")
            .to_string();

        let session = Session::builder()?.commit_from_file(path)?;

        Ok(Self {
            session,
            name,
            layout: contract.layout,
            feature_dim: contract.feature_dim,
        })
    }
}

impl Policy for OnnxPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&mut self, batch: &[Observation]) -> Result<Vec<Vec<f32>>, PolicyError> {
        let Some(first) = batch.first() else {
            return Ok(Vec::new());
        };
        let n = batch.len();
        let d = self.feature_dim.unwrap_or(first.len());
        let mut data = Vec::with_capacity(n * d);
        for obs in batch {
            if obs.len() != d {
                return Err(PolicyError::InputWidth {
                    expected: d,
                    got: obs.len(),
                });
            }
            data.extend_from_slice(&obs.data);
        }

        let data = data.into_boxed_slice();
        let input = match self.layout {
            InputLayout::Rows => Tensor::from_array(([n, d], data)),
            InputLayout::Joint => Tensor::from_array(([1usize, n, d], data)),
        }
        .map_err(|e| PolicyError::Inference(format!("failed to create input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| PolicyError::Inference(e.to_string()))?;
        let (shape, values) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PolicyError::Inference(format!("failed to extract output tensor: {e}")))?;

        // rows are as wide as the last output dim; the caller checks the width
        let width = match shape.last() {
            Some(&w) if w > 0 => w as usize,
            _ => return Err(PolicyError::Inference(format!("unusable output shape {:?}", &shape[..]))),
        };
        debug!(agents = n, width, "onnx inference");
        Ok(values.chunks(width).map(<[f32]>::to_vec).collect())
    }
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Mean latency of one policy call over `agents` zero observations.
pub fn calibrate_inference(
    policy: &mut dyn Policy,
    contract: &ModelContract,
    agents: usize,
) -> Result<Duration, PolicyError> {
    let width = contract.feature_dim.unwrap_or(OWN_FEATURES);
    let batch = vec![Observation::new(vec![0.0; width]); agents.max(1)];

    for _ in 0..CALIBRATION_WARMUP {
        policy.infer(&batch)?;
    }

    let start = Instant::now();
    for _ in 0..CALIBRATION_RUNS {
        policy.infer(&batch)?;
    }
    let mean = start.elapsed() / CALIBRATION_RUNS as u32;
    debug!(policy = policy.name(), agents, mean_us = mean.as_micros() as u64, "calibrated");
    Ok(mean)
}

/// Per-agent variants call the policy once per agent, so a tick costs
/// `agents` calls; the joint layout costs one.
pub fn check_latency(
    mean: Duration,
    contract: &ModelContract,
    agents: usize,
    budget: Duration,
) -> Result<Duration, ValidationError> {
    let per_tick = match contract.layout {
        InputLayout::Rows => mean * agents.max(1) as u32,
        InputLayout::Joint => mean,
    };
    if per_tick > budget {
        return Err(ValidationError::InferenceTooSlow(per_tick.as_millis(), budget.as_millis()));
    }
    Ok(per_tick)
}
