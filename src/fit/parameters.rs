use crate::Pose;
use core::fmt;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// One of the extrinsic quantities the calibration can estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum PoseParameter {
    Height,
    Tilt,
    Roll,
    Heading,
    PosX,
    PosY,
}

impl PoseParameter {
    /// Every parameter, in the order the free parameter vector is assembled.
    pub const ALL: [PoseParameter; 6] = [
        PoseParameter::Height,
        PoseParameter::Tilt,
        PoseParameter::Roll,
        PoseParameter::Heading,
        PoseParameter::PosX,
        PoseParameter::PosY,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PoseParameter::Height => "height",
            PoseParameter::Tilt => "tilt",
            PoseParameter::Roll => "roll",
            PoseParameter::Heading => "heading",
            PoseParameter::PosX => "pos_x",
            PoseParameter::PosY => "pos_y",
        }
    }

    /// Edge length of the initial simplex along this parameter.
    pub(crate) fn simplex_step(self, seed: f64) -> f64 {
        match self {
            PoseParameter::Height => f64::max(seed.abs() * 0.1, 1.0),
            PoseParameter::Tilt | PoseParameter::Roll | PoseParameter::Heading => 5.0,
            PoseParameter::PosX | PoseParameter::PosY => 1.0,
        }
    }

    pub fn get(self, pose: &Pose) -> f64 {
        match self {
            PoseParameter::Height => pose.height,
            PoseParameter::Tilt => pose.tilt,
            PoseParameter::Roll => pose.roll,
            PoseParameter::Heading => pose.heading,
            PoseParameter::PosX => pose.pos_x,
            PoseParameter::PosY => pose.pos_y,
        }
    }

    pub fn set(self, pose: &mut Pose, value: f64) {
        match self {
            PoseParameter::Height => pose.height = value,
            PoseParameter::Tilt => pose.tilt = value,
            PoseParameter::Roll => pose.roll = value,
            PoseParameter::Heading => pose.heading = value,
            PoseParameter::PosX => pose.pos_x = value,
            PoseParameter::PosY => pose.pos_y = value,
        }
    }
}

impl fmt::Display for PoseParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a pose parameter is held at a known value or estimated by the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum Parameter {
    Fixed(f64),
    Free,
}

impl Parameter {
    pub fn is_free(self) -> bool {
        matches!(self, Parameter::Free)
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Parameter::Fixed(value) => Some(value),
            Parameter::Free => None,
        }
    }
}

/// Fixed/free state of every pose parameter.
///
/// A new camera estimates height, tilt and roll while heading and the
/// horizontal position stay at the origin. Calibrations that can observe the
/// heading or the position release those parameters themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PoseConstraints {
    pub height: Parameter,
    pub tilt: Parameter,
    pub roll: Parameter,
    pub heading: Parameter,
    pub pos_x: Parameter,
    pub pos_y: Parameter,
}

impl Default for PoseConstraints {
    fn default() -> Self {
        Self {
            height: Parameter::Free,
            tilt: Parameter::Free,
            roll: Parameter::Free,
            heading: Parameter::Fixed(0.0),
            pos_x: Parameter::Fixed(0.0),
            pos_y: Parameter::Fixed(0.0),
        }
    }
}

impl PoseConstraints {
    /// Every parameter fixed at the value it has in `pose`.
    pub fn fixed(pose: &Pose) -> Self {
        let mut constraints = Self::default();
        for parameter in PoseParameter::ALL {
            constraints.set(parameter, Parameter::Fixed(parameter.get(pose)));
        }
        constraints
    }

    pub fn get(&self, parameter: PoseParameter) -> Parameter {
        match parameter {
            PoseParameter::Height => self.height,
            PoseParameter::Tilt => self.tilt,
            PoseParameter::Roll => self.roll,
            PoseParameter::Heading => self.heading,
            PoseParameter::PosX => self.pos_x,
            PoseParameter::PosY => self.pos_y,
        }
    }

    pub fn set(&mut self, parameter: PoseParameter, state: Parameter) {
        match parameter {
            PoseParameter::Height => self.height = state,
            PoseParameter::Tilt => self.tilt = state,
            PoseParameter::Roll => self.roll = state,
            PoseParameter::Heading => self.heading = state,
            PoseParameter::PosX => self.pos_x = state,
            PoseParameter::PosY => self.pos_y = state,
        }
    }

    /// The parameters a fit has to estimate, in vector order.
    pub fn free(&self) -> Vec<PoseParameter> {
        PoseParameter::ALL
            .iter()
            .copied()
            .filter(|&parameter| self.get(parameter).is_free())
            .collect()
    }

    /// Writes every fixed value into `pose`.
    pub fn apply_fixed(&self, pose: &mut Pose) {
        for parameter in PoseParameter::ALL {
            if let Parameter::Fixed(value) = self.get(parameter) {
                parameter.set(pose, value);
            }
        }
    }
}

/// Starting values for the free parameters of a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct FitEstimates {
    pub height: f64,
    pub tilt: f64,
    pub roll: f64,
    pub heading: f64,
    pub pos_x: f64,
    pub pos_y: f64,
}

impl Default for FitEstimates {
    fn default() -> Self {
        Self {
            height: 30.0,
            tilt: 85.0,
            roll: 0.0,
            heading: 0.0,
            pos_x: 0.0,
            pos_y: 0.0,
        }
    }
}

impl FitEstimates {
    pub fn get(&self, parameter: PoseParameter) -> f64 {
        match parameter {
            PoseParameter::Height => self.height,
            PoseParameter::Tilt => self.tilt,
            PoseParameter::Roll => self.roll,
            PoseParameter::Heading => self.heading,
            PoseParameter::PosX => self.pos_x,
            PoseParameter::PosY => self.pos_y,
        }
    }
}

const HEIGHT_START_FACTORS: [f64; 4] = [1.0, 0.25, 0.5, 2.0];
const TILT_START_OFFSETS: [f64; 4] = [0.0, -10.0, -25.0, -40.0];

/// Maps between a pose and the vector of its free parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeParameters {
    parameters: Vec<PoseParameter>,
}

impl FreeParameters {
    pub fn new(constraints: &PoseConstraints) -> Self {
        Self {
            parameters: constraints.free(),
        }
    }

    pub fn parameters(&self) -> &[PoseParameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// The seed vector taken from the estimates.
    pub fn seed(&self, estimates: &FitEstimates) -> Vec<f64> {
        self.parameters.iter().map(|&p| estimates.get(p)).collect()
    }

    /// Reads the current free values out of `pose`.
    pub fn extract(&self, pose: &Pose) -> Vec<f64> {
        self.parameters.iter().map(|&p| p.get(pose)).collect()
    }

    /// Writes a free parameter vector into `pose`.
    pub fn apply(&self, pose: &mut Pose, values: &[f64]) {
        for (&parameter, &value) in self.parameters.iter().zip(values) {
            parameter.set(pose, value);
        }
    }

    /// Starting vectors for a multi-start fit: `seed` first, then every
    /// combination of the alternative heights and tilts for the free ones.
    pub fn starts(&self, seed: &[f64]) -> Vec<Vec<f64>> {
        let mut starts = vec![seed.to_vec()];
        for (i, &parameter) in self.parameters.iter().enumerate() {
            let alternatives: &[f64] = match parameter {
                PoseParameter::Height => &HEIGHT_START_FACTORS,
                PoseParameter::Tilt => &TILT_START_OFFSETS,
                _ => continue,
            };
            starts = starts
                .into_iter()
                .flat_map(|start| {
                    alternatives.iter().map(move |&alternative| {
                        let mut start = start.clone();
                        start[i] = match parameter {
                            PoseParameter::Height => start[i] * alternative,
                            _ => start[i] + alternative,
                        };
                        start
                    })
                })
                .collect();
        }
        starts
    }

    /// Builds the `n + 1` vertices of the initial Nelder-Mead simplex around `center`.
    pub fn simplex(&self, center: &[f64]) -> Vec<Vec<f64>> {
        let mut vertices = vec![center.to_vec(); self.len() + 1];
        for (i, &parameter) in self.parameters.iter().enumerate() {
            vertices[i + 1][i] += parameter.simplex_step(center[i]);
        }
        vertices
    }
}
