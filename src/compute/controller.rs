//! Recurrent controller shared by every morphology.
//!
//! The controller is a single layer of fully recurrent hidden neurons that
//! drives the motor neurons. Hidden neurons see three kinds of input, laid out
//! as columns of [`RecurrentController::h_synapses`]:
//!
//! ```text
//! | hidden 0..H | auditory | sensor 0..S |
//! ```
//!
//! The auditory column is only used during prenatal development, where the
//! command's word vectors are played into the network one component at a
//! time. It is never sent to the simulator.

use serde::{Deserialize, Serialize};

/// Activation gain used for hidden neurons (simulator default).
pub const DEFAULT_ALPHA: f32 = 1.0;

/// Self-feedback of hidden neurons (simulator default).
pub const DEFAULT_TAU: f32 = 1.0;

/// Dense row-major weight matrix. Rows are destination neurons, columns are sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseMatrix {
    rows: usize,
    cols: usize,
    weights: Vec<f32>,
}

impl SynapseMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            weights: vec![0.0; rows * cols],
        }
    }

    /// Build from row-major weights.
    pub fn from_vec(rows: usize, cols: usize, weights: Vec<f32>) -> Result<Self, ShapeError> {
        if weights.len() != rows * cols {
            return Err(ShapeError::Data {
                rows,
                cols,
                len: weights.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            weights,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.weights[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.weights[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * self.cols;
        &self.weights[start..start + self.cols]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.weights
    }

    /// Dot product of `row` restricted to its first `input.len()` columns.
    #[inline]
    fn dot_prefix(&self, row: usize, input: &[f32]) -> f32 {
        self.row(row)[..input.len()]
            .iter()
            .zip(input)
            .map(|(w, x)| w * x)
            .sum()
    }

    fn is_consistent(&self) -> bool {
        self.weights.len() == self.rows * self.cols
    }
}

/// Shape errors for controller matrices.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("{rows}x{cols} matrix cannot hold {len} weights")]
    Data { rows: usize, cols: usize, len: usize },
    #[error("{matrix} synapses are {found:?}, expected {expected:?}")]
    Mismatch {
        matrix: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Controller needs at least one hidden neuron")]
    NoHiddenNeurons,
}

/// Hidden-neuron state a robot is born with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenState {
    /// Activations one update before birth.
    pub last: Vec<f32>,
    /// Activations at birth.
    pub current: Vec<f32>,
}

impl HiddenState {
    pub fn zeros(hidden_neurons: usize) -> Self {
        Self {
            last: vec![0.0; hidden_neurons],
            current: vec![0.0; hidden_neurons],
        }
    }
}

/// The evolvable brain of a robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentController {
    hidden_neurons: usize,
    sensor_neurons: usize,
    motor_neurons: usize,
    /// Synapses into hidden neurons: `H x (H + 1 + S)`.
    h_synapses: SynapseMatrix,
    /// Synapses into motor neurons: `M x H`.
    m_synapses: SynapseMatrix,
    /// Hidden-neuron self-feedback used during prenatal development.
    #[serde(default = "default_tau")]
    tau: f32,
}

fn default_tau() -> f32 {
    DEFAULT_TAU
}

impl RecurrentController {
    /// Assemble a controller, checking matrix shapes against the neuron counts.
    pub fn new(
        hidden_neurons: usize,
        sensor_neurons: usize,
        motor_neurons: usize,
        h_synapses: SynapseMatrix,
        m_synapses: SynapseMatrix,
    ) -> Result<Self, ShapeError> {
        let controller = Self {
            hidden_neurons,
            sensor_neurons,
            motor_neurons,
            h_synapses,
            m_synapses,
            tau: DEFAULT_TAU,
        };
        controller.validate()?;
        Ok(controller)
    }

    /// Shape of the hidden synapse matrix for the given neuron counts.
    pub fn hidden_shape(hidden_neurons: usize, sensor_neurons: usize) -> (usize, usize) {
        (hidden_neurons, hidden_neurons + 1 + sensor_neurons)
    }

    /// Shape of the motor synapse matrix for the given neuron counts.
    pub fn motor_shape(hidden_neurons: usize, motor_neurons: usize) -> (usize, usize) {
        (motor_neurons, hidden_neurons)
    }

    /// Check that both matrices match the declared neuron counts.
    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.hidden_neurons == 0 {
            return Err(ShapeError::NoHiddenNeurons);
        }
        for m in [&self.h_synapses, &self.m_synapses] {
            if !m.is_consistent() {
                return Err(ShapeError::Data {
                    rows: m.rows,
                    cols: m.cols,
                    len: m.weights.len(),
                });
            }
        }

        let expected = Self::hidden_shape(self.hidden_neurons, self.sensor_neurons);
        if self.h_synapses.shape() != expected {
            return Err(ShapeError::Mismatch {
                matrix: "hidden",
                expected,
                found: self.h_synapses.shape(),
            });
        }
        let expected = Self::motor_shape(self.hidden_neurons, self.motor_neurons);
        if self.m_synapses.shape() != expected {
            return Err(ShapeError::Mismatch {
                matrix: "motor",
                expected,
                found: self.m_synapses.shape(),
            });
        }
        Ok(())
    }

    pub fn with_tau(mut self, tau: f32) -> Self {
        self.tau = tau;
        self
    }

    #[inline]
    pub fn hidden_neurons(&self) -> usize {
        self.hidden_neurons
    }

    #[inline]
    pub fn sensor_neurons(&self) -> usize {
        self.sensor_neurons
    }

    #[inline]
    pub fn motor_neurons(&self) -> usize {
        self.motor_neurons
    }

    #[inline]
    pub fn tau(&self) -> f32 {
        self.tau
    }

    pub fn h_synapses(&self) -> &SynapseMatrix {
        &self.h_synapses
    }

    pub fn m_synapses(&self) -> &SynapseMatrix {
        &self.m_synapses
    }

    pub(crate) fn h_synapses_mut(&mut self) -> &mut SynapseMatrix {
        &mut self.h_synapses
    }

    pub(crate) fn m_synapses_mut(&mut self) -> &mut SynapseMatrix {
        &mut self.m_synapses
    }

    /// Column of the auditory input in `h_synapses`.
    #[inline]
    pub fn auditory_column(&self) -> usize {
        self.hidden_neurons
    }

    /// Columns of the sensor inputs in `h_synapses`.
    pub fn sensor_columns(&self) -> std::ops::Range<usize> {
        self.hidden_neurons + 1..self.h_synapses.cols
    }

    /// Hidden-to-hidden plus auditory weights (`H x (H + 1)`), as used before birth.
    pub fn hidden_synapses(&self) -> SynapseMatrix {
        let width = self.hidden_neurons + 1;
        let mut out = SynapseMatrix::zeros(self.hidden_neurons, width);
        for r in 0..self.hidden_neurons {
            let row = self.h_synapses.row(r);
            out.weights[r * width..(r + 1) * width].copy_from_slice(&row[..width]);
        }
        out
    }

    /// Play a command into the network and return the state the robot is born with.
    ///
    /// Each component of each word vector is one update:
    /// `h' = tanh(alpha * W . [h, v] + tau * h)`. Sensors are silent before
    /// birth so their columns do not take part.
    pub fn prenatal_development<W: AsRef<[f32]>>(&self, encoding: &[W]) -> HiddenState {
        let h = self.hidden_neurons;
        let mut state = HiddenState::zeros(h);
        let mut input = vec![0.0f32; h + 1];

        for word in encoding {
            for &value in word.as_ref() {
                state.last.copy_from_slice(&state.current);
                input[..h].copy_from_slice(&state.current);
                input[h] = value;

                for (n, current) in state.current.iter_mut().enumerate() {
                    let activation = self.h_synapses.dot_prefix(n, &input);
                    *current = (DEFAULT_ALPHA * activation + self.tau * state.last[n]).tanh();
                }
            }
        }

        state
    }

    /// Total number of evolvable weights.
    pub fn parameter_count(&self) -> usize {
        self.h_synapses.weights.len() + self.m_synapses.weights.len()
    }
}
