//! Robot bodies and how a controller is wired into them.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use serde::{Deserialize, Serialize};

use super::blueprint::{
    Blueprint, Body, Color, HingeJoint, JointId, Neuron, NeuronId, Sensor, SensorId,
};
use super::controller::{RecurrentController, ShapeError};
use crate::compute::evolution::GenomeRng;

/// The three robot bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Morphology {
    /// Box torso with four two-segment legs.
    Quadruped {
        #[serde(default = "default_true")]
        sensors: bool,
    },
    /// Two perpendicular sticks joined by one hinge.
    Twig {
        #[serde(default = "default_true")]
        sensors: bool,
    },
    /// Sphere rolled by an internal two-axis pendulum.
    SphereBot {
        #[serde(default)]
        sensors: bool,
        /// When false the second hinge is locked.
        #[serde(default = "default_true")]
        second_joint: bool,
    },
}

fn default_true() -> bool {
    true
}

impl Default for Morphology {
    fn default() -> Self {
        Morphology::Quadruped { sensors: true }
    }
}

/// Joints and sensors produced when a body is built.
#[derive(Debug, Clone, Default)]
pub struct BodyLayout {
    /// Actuated joints and their motor-neuron tau.
    pub motors: Vec<(JointId, f32)>,
    /// Sensors read by sensor neurons, in `h_synapses` column order.
    pub sensor_inputs: Vec<SensorId>,
}

impl Morphology {
    pub fn name(&self) -> &'static str {
        match self {
            Morphology::Quadruped { .. } => "Quadruped",
            Morphology::Twig { .. } => "Twig",
            Morphology::SphereBot { .. } => "SphereBot",
        }
    }

    pub fn has_sensors(&self) -> bool {
        match *self {
            Morphology::Quadruped { sensors }
            | Morphology::Twig { sensors }
            | Morphology::SphereBot { sensors, .. } => sensors,
        }
    }

    /// Sensor neurons feeding the hidden layer.
    pub fn sensor_neurons(&self) -> usize {
        if !self.has_sensors() {
            return 0;
        }
        match self {
            Morphology::Quadruped { .. } => 4,
            Morphology::Twig { .. } => 3,
            Morphology::SphereBot { .. } => 1,
        }
    }

    pub fn motor_neurons(&self) -> usize {
        match self {
            Morphology::Quadruped { .. } => 8,
            Morphology::Twig { .. } => 1,
            Morphology::SphereBot { .. } => 2,
        }
    }

    /// Add bodies, joints and sensors (but no neurons) to `bp`.
    pub fn build_body(&self, bp: &mut Blueprint) -> BodyLayout {
        let layout = match *self {
            Morphology::Quadruped { .. } => build_quadruped(bp),
            Morphology::Twig { .. } => build_twig(bp),
            Morphology::SphereBot { second_joint, .. } => build_spherebot(bp, second_joint),
        };
        debug_assert_eq!(layout.motors.len(), self.motor_neurons());
        if self.has_sensors() {
            layout
        } else {
            BodyLayout {
                sensor_inputs: Vec::new(),
                ..layout
            }
        }
    }
}

fn build_quadruped(bp: &mut Blueprint) -> BodyLayout {
    let length = 0.1;
    let radius = length / 5.0;
    let leg_color = Color::new(0.5, 0.5, 1.0);
    let shin_color = Color::new(0.0, 1.0, 1.0);

    let torso = bp.add_body(
        Body::cuboid([0.0, 0.0, length + radius], length, length, radius * 2.0)
            .color(Color::new(0.8, 0.0, 0.8)),
    );

    let mut hips = Vec::with_capacity(4);
    let mut knees = Vec::with_capacity(4);
    let mut feet = Vec::with_capacity(4);

    for i in 0..4 {
        let theta = FRAC_PI_2 * i as f32;
        let (x, y) = (theta.cos() * length, theta.sin() * length);
        let axis = [-y, x, 0.0];

        let thigh = bp.add_body(
            Body::cylinder([x, y, length + radius], [x, y, 0.0], length, radius).color(leg_color),
        );
        hips.push(
            bp.add_joint(
                HingeJoint::new(torso, thigh, [x / 2.0, y / 2.0, length + radius], axis)
                    .limits(-FRAC_PI_4, FRAC_PI_4),
            ),
        );

        let (x2, y2) = (x * 1.5, y * 1.5);
        let shin = bp.add_body(
            Body::cylinder([x2, y2, length / 2.0 + radius], [0.0, 0.0, 1.0], length, radius)
                .color(shin_color),
        );
        knees.push(
            bp.add_joint(
                HingeJoint::new(thigh, shin, [x2, y2, length + radius], axis)
                    .limits(-FRAC_PI_4, FRAC_PI_4),
            ),
        );
        feet.push(bp.add_sensor(Sensor::Touch { body: shin }));
    }

    bp.add_sensor(Sensor::Position { body: torso });

    let motors = hips
        .into_iter()
        .map(|j| (j, 0.3))
        .chain(knees.into_iter().map(|j| (j, 1.0)))
        .collect();

    BodyLayout {
        motors,
        sensor_inputs: feet,
    }
}

fn build_twig(bp: &mut Blueprint) -> BodyLayout {
    let length = 1.0;
    let radius = length / 10.0;
    let color = Color::new(0.5, 0.5, 1.0);

    // Horizontal stick along +x with one end at the origin, and a vertical one below it.
    let top = bp.add_body(
        Body::cylinder([length / 2.0, 0.0, length + radius], [1.0, 0.0, 0.0], length, radius)
            .color(color),
    );
    let post = bp.add_body(
        Body::cylinder([0.0, 0.0, length / 2.0 + radius], [0.0, 0.0, 1.0], length, radius)
            .color(color),
    );
    let hip = bp.add_joint(
        HingeJoint::new(top, post, [0.0, 0.0, length + radius], [0.0, 1.0, 0.0])
            .limits(-FRAC_PI_4, FRAC_PI_4),
    );

    let angle = bp.add_sensor(Sensor::Proprioceptive { joint: hip });
    let feet = [
        bp.add_sensor(Sensor::Touch { body: top }),
        bp.add_sensor(Sensor::Touch { body: post }),
    ];
    bp.add_sensor(Sensor::Position { body: top });

    BodyLayout {
        motors: vec![(hip, 1.0)],
        sensor_inputs: vec![feet[0], feet[1], angle],
    }
}

fn build_spherebot(bp: &mut Blueprint, second_joint: bool) -> BodyLayout {
    let length = 0.1;
    let radius = length / 5.0;
    let color = Color::new(0.0, 1.0, 1.0);

    let head = bp.add_body(
        Body::sphere([0.0, 0.0, length], length)
            .mass(0.5)
            .color(color),
    );
    let pendulum = bp.add_body(
        Body::cylinder([0.0, 0.0, length], [1.0, 0.0, 0.0], length, radius / 2.0).color(color),
    );
    let connector =
        bp.add_body(Body::sphere([(length - radius) / 2.0, 0.0, length], radius).color(color));

    let pitch = bp.add_joint(HingeJoint::new(
        head,
        pendulum,
        [0.0, 0.0, length],
        [0.0, 1.0, 0.0],
    ));
    let roll = HingeJoint::new(pendulum, connector, [0.0, 0.0, length], [-1.0, 0.0, 0.0]);
    let roll = bp.add_joint(if second_joint {
        roll
    } else {
        roll.limits(0.0, 0.0)
    });

    let angle = bp.add_sensor(Sensor::Proprioceptive { joint: pitch });
    bp.add_sensor(Sensor::Position { body: head });

    BodyLayout {
        motors: vec![(pitch, 0.3), (roll, 0.3)],
        sensor_inputs: vec![angle],
    }
}

/// A body together with the controller that drives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    pub morphology: Morphology,
    pub controller: RecurrentController,
}

impl Robot {
    /// New robot with N(0, 1) weights.
    pub fn random(morphology: Morphology, hidden_neurons: usize, rng: &mut GenomeRng) -> Self {
        let controller = rng.random_controller(
            hidden_neurons,
            morphology.sensor_neurons(),
            morphology.motor_neurons(),
        );
        Self {
            morphology,
            controller,
        }
    }

    /// Check that the controller fits the body.
    pub fn validate(&self) -> Result<(), ShapeError> {
        self.controller.validate()?;
        let expected = RecurrentController::hidden_shape(
            self.controller.hidden_neurons(),
            self.morphology.sensor_neurons(),
        );
        if self.controller.h_synapses().shape() != expected {
            return Err(ShapeError::Mismatch {
                matrix: "hidden",
                expected,
                found: self.controller.h_synapses().shape(),
            });
        }
        let expected = RecurrentController::motor_shape(
            self.controller.hidden_neurons(),
            self.morphology.motor_neurons(),
        );
        if self.controller.m_synapses().shape() != expected {
            return Err(ShapeError::Mismatch {
                matrix: "motor",
                expected,
                found: self.controller.m_synapses().shape(),
            });
        }
        Ok(())
    }

    /// Develop the controller on `encoding` and describe the newborn robot.
    pub fn build<W: AsRef<[f32]>>(&self, encoding: &[W]) -> Blueprint {
        let state = self.controller.prenatal_development(encoding);
        let mut bp = Blueprint::new();
        let layout = self.morphology.build_body(&mut bp);

        let motors: Vec<NeuronId> = layout
            .motors
            .iter()
            .map(|&(joint, tau)| bp.add_neuron(Neuron::motor(joint, tau)))
            .collect();
        let sensors: Vec<NeuronId> = layout
            .sensor_inputs
            .iter()
            .map(|&sensor| bp.add_neuron(Neuron::Sensor { sensor }))
            .collect();
        let hidden: Vec<NeuronId> = state
            .last
            .iter()
            .zip(&state.current)
            .map(|(&last, &value)| bp.add_neuron(Neuron::hidden(last, value)))
            .collect();

        let h = self.controller.h_synapses();
        for (r, &target) in hidden.iter().enumerate() {
            for (c, &source) in hidden.iter().enumerate() {
                bp.add_synapse(source, target, h.get(r, c));
            }
            // The auditory column is skipped; it only exists before birth.
            for (&source, c) in sensors.iter().zip(self.controller.sensor_columns()) {
                bp.add_synapse(source, target, h.get(r, c));
            }
        }

        let m = self.controller.m_synapses();
        for (r, &target) in motors.iter().enumerate() {
            for (c, &source) in hidden.iter().enumerate() {
                bp.add_synapse(source, target, m.get(r, c));
            }
        }

        bp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(bp: &Blueprint, pred: impl Fn(&Neuron) -> bool) -> usize {
        bp.neurons.iter().filter(|n| pred(n)).count()
    }

    #[test]
    fn test_neuron_counts() {
        let cases = [
            (Morphology::Quadruped { sensors: true }, 4, 8, 9, 8, 5),
            (Morphology::Quadruped { sensors: false }, 0, 8, 9, 8, 5),
            (Morphology::Twig { sensors: true }, 3, 1, 2, 1, 4),
            (
                Morphology::SphereBot {
                    sensors: true,
                    second_joint: true,
                },
                1,
                2,
                3,
                2,
                2,
            ),
        ];

        let mut rng = GenomeRng::new(1);
        for (morph, sensors, motors, bodies, joints, sensor_count) in cases {
            let robot = Robot::random(morph, 5, &mut rng);
            assert!(robot.validate().is_ok());
            let bp = robot.build(&[[0.1f32, 0.2]]);
            assert!(bp.validate().is_ok(), "{}", morph.name());

            assert_eq!(bp.bodies.len(), bodies, "{}", morph.name());
            assert_eq!(bp.joints.len(), joints, "{}", morph.name());
            assert_eq!(bp.sensors.len(), sensor_count, "{}", morph.name());
            assert_eq!(count(&bp, |n| matches!(n, Neuron::Sensor { .. })), sensors);
            assert_eq!(count(&bp, |n| matches!(n, Neuron::Motor { .. })), motors);
            assert_eq!(count(&bp, |n| matches!(n, Neuron::Hidden { .. })), 5);

            // H*H recurrent + H*S sensor + M*H motor; no auditory synapses.
            assert_eq!(bp.synapses.len(), 25 + 5 * sensors + motors * 5);
            assert!(bp.position_sensor().is_some());
        }
    }

    #[test]
    fn test_hidden_neurons_carry_birth_state() {
        let mut rng = GenomeRng::new(2);
        let robot = Robot::random(Morphology::Twig { sensors: false }, 3, &mut rng);
        let word = [0.5f32, -0.25, 1.0];
        let state = robot.controller.prenatal_development(&[word]);
        let bp = robot.build(&[word]);

        let births: Vec<(f32, f32)> = bp
            .neurons
            .iter()
            .filter_map(|n| match *n {
                Neuron::Hidden {
                    last_value, value, ..
                } => Some((last_value, value)),
                _ => None,
            })
            .collect();
        let expected: Vec<(f32, f32)> = state
            .last
            .iter()
            .copied()
            .zip(state.current.iter().copied())
            .collect();
        assert_eq!(births, expected);
    }

    #[test]
    fn test_synapse_weights_follow_matrices() {
        let mut rng = GenomeRng::new(3);
        let robot = Robot::random(Morphology::Quadruped { sensors: true }, 2, &mut rng);
        let bp = robot.build(&[[1.0f32]]);

        let motors = bp.neurons_where(|n| matches!(n, Neuron::Motor { .. }));
        let sensors = bp.neurons_where(|n| matches!(n, Neuron::Sensor { .. }));
        let hidden = bp.neurons_where(|n| matches!(n, Neuron::Hidden { .. }));

        let weight = |s: NeuronId, t: NeuronId| {
            bp.synapses
                .iter()
                .find(|syn| syn.source == s && syn.target == t)
                .map(|syn| syn.weight)
        };

        let h = robot.controller.h_synapses();
        let m = robot.controller.m_synapses();
        assert_eq!(weight(hidden[1], hidden[0]), Some(h.get(0, 1)));
        // First sensor column sits after the auditory column.
        assert_eq!(weight(sensors[0], hidden[1]), Some(h.get(1, 3)));
        assert_eq!(weight(sensors[3], hidden[0]), Some(h.get(0, 6)));
        assert_eq!(weight(hidden[1], motors[7]), Some(m.get(7, 1)));
    }

    #[test]
    fn test_locked_spherebot_joint() {
        let mut bp = Blueprint::new();
        Morphology::SphereBot {
            sensors: false,
            second_joint: false,
        }
        .build_body(&mut bp);
        assert_eq!((bp.joints[1].lo, bp.joints[1].hi), (0.0, 0.0));
        assert_eq!(bp.joints[0].hi, FRAC_PI_2);
    }

    #[test]
    fn test_quadruped_motor_taus() {
        let mut bp = Blueprint::new();
        let layout = Morphology::default().build_body(&mut bp);
        let taus: Vec<f32> = layout.motors.iter().map(|m| m.1).collect();
        assert_eq!(taus, vec![0.3, 0.3, 0.3, 0.3, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(layout.sensor_inputs.len(), 4);
        assert!(bp.joints.iter().all(|j| j.speed == 1.0));
    }

    #[test]
    fn test_mismatched_controller_rejected() {
        let mut rng = GenomeRng::new(4);
        let mut robot = Robot::random(Morphology::Twig { sensors: true }, 3, &mut rng);
        robot.morphology = Morphology::Twig { sensors: false };
        assert!(robot.validate().is_err());
    }
}
