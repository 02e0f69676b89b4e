//! Time-stepped replay of a blueprint's neurons and synapses.
//!
//! The simulator updates the controller once per physics step. This module
//! runs the same update without any physics, which is what the replay backend
//! and the tests use.

use super::blueprint::{Blueprint, BlueprintError, JointId, Neuron};

#[derive(Debug, Clone, Copy)]
enum Unit {
    Sensor { sensor: usize },
    Recurrent { tau: f32, alpha: f32 },
}

/// Compiled controller network.
#[derive(Debug, Clone)]
pub struct NeuralNetwork {
    units: Vec<Unit>,
    values: Vec<f32>,
    previous: Vec<f32>,
    /// Incoming `(source, weight)` pairs per neuron.
    incoming: Vec<Vec<(usize, f32)>>,
    motors: Vec<(usize, JointId)>,
}

impl NeuralNetwork {
    /// Compile `bp`, rejecting dangling references.
    pub fn from_blueprint(bp: &Blueprint) -> Result<Self, BlueprintError> {
        bp.validate()?;

        let n = bp.neurons.len();
        let mut units = Vec::with_capacity(n);
        let mut values = vec![0.0; n];
        let mut previous = vec![0.0; n];
        let mut motors = Vec::new();

        for (i, neuron) in bp.neurons.iter().enumerate() {
            let unit = match *neuron {
                Neuron::Sensor { sensor } => Unit::Sensor { sensor: sensor.0 },
                Neuron::Hidden {
                    tau,
                    alpha,
                    last_value,
                    value,
                } => {
                    values[i] = value;
                    previous[i] = last_value;
                    Unit::Recurrent { tau, alpha }
                }
                Neuron::Motor { joint, tau, alpha } => {
                    motors.push((i, joint));
                    Unit::Recurrent { tau, alpha }
                }
            };
            units.push(unit);
        }

        let mut incoming = vec![Vec::new(); n];
        for syn in &bp.synapses {
            incoming[syn.target.0].push((syn.source.0, syn.weight));
        }

        Ok(Self {
            units,
            values,
            previous,
            incoming,
            motors,
        })
    }

    /// Advance one step. `sensors[i]` is the first channel of sensor `i`; missing
    /// readings count as 0.
    pub fn step(&mut self, sensors: &[f32]) {
        self.previous.copy_from_slice(&self.values);

        for (i, unit) in self.units.iter().enumerate() {
            self.values[i] = match *unit {
                Unit::Sensor { sensor } => sensors.get(sensor).copied().unwrap_or(0.0),
                Unit::Recurrent { tau, alpha } => {
                    let sum: f32 = self.incoming[i]
                        .iter()
                        .map(|&(src, w)| w * self.previous[src])
                        .sum();
                    (alpha * sum + tau * self.previous[i]).tanh()
                }
            };
        }
    }

    /// Current value of every neuron, indexed like the blueprint.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Motor outputs in motor-neuron order.
    pub fn motor_values(&self) -> Vec<f32> {
        self.motors.iter().map(|&(i, _)| self.values[i]).collect()
    }

    pub fn motor_joints(&self) -> impl Iterator<Item = JointId> + '_ {
        self.motors.iter().map(|&(_, joint)| joint)
    }
}
