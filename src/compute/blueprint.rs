//! Description of a robot as the physics simulator receives it.
//!
//! A [`Blueprint`] is a flat list of bodies, joints, sensors, neurons and
//! synapses. Every element gets an id from its own counter, in insertion
//! order, which is the numbering the simulator uses as well.

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub usize);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

id_type!(
    /// Index of a rigid body.
    BodyId
);
id_type!(
    /// Index of a joint.
    JointId
);
id_type!(
    /// Index of a sensor.
    SensorId
);
id_type!(
    /// Index of a neuron.
    NeuronId
);

pub type Vec3 = [f32; 3];

/// RGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

/// Geometry of a rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Box {
        length: f32,
        width: f32,
        height: f32,
    },
    Cylinder {
        /// Direction of the long axis.
        axis: Vec3,
        length: f32,
        radius: f32,
        capped: bool,
    },
    Sphere {
        radius: f32,
    },
}

/// A rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    #[serde(flatten)]
    pub shape: Shape,
    pub position: Vec3,
    pub mass: f32,
    pub color: Color,
}

impl Body {
    pub fn new(shape: Shape, position: Vec3) -> Self {
        Self {
            shape,
            position,
            mass: 1.0,
            color: Color::default(),
        }
    }

    pub fn cuboid(position: Vec3, length: f32, width: f32, height: f32) -> Self {
        Self::new(
            Shape::Box {
                length,
                width,
                height,
            },
            position,
        )
    }

    pub fn cylinder(position: Vec3, axis: Vec3, length: f32, radius: f32) -> Self {
        Self::new(
            Shape::Cylinder {
                axis,
                length,
                radius,
                capped: true,
            },
            position,
        )
    }

    pub fn sphere(position: Vec3, radius: f32) -> Self {
        Self::new(Shape::Sphere { radius }, position)
    }

    pub fn mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

/// Hinge between two bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HingeJoint {
    pub first: BodyId,
    pub second: BodyId,
    /// Anchor point.
    pub position: Vec3,
    /// Rotation axis.
    pub normal: Vec3,
    /// Lower angle limit (radians).
    pub lo: f32,
    /// Upper angle limit (radians).
    pub hi: f32,
    /// Motor speed.
    pub speed: f32,
}

impl HingeJoint {
    pub fn new(first: BodyId, second: BodyId, position: Vec3, normal: Vec3) -> Self {
        Self {
            first,
            second,
            position,
            normal,
            lo: -FRAC_PI_2,
            hi: FRAC_PI_2,
            speed: 1.0,
        }
    }

    pub fn limits(mut self, lo: f32, hi: f32) -> Self {
        self.lo = lo;
        self.hi = hi;
        self
    }
}

/// A sensor attached to a body or joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sensor {
    /// 1 while the body touches something.
    Touch { body: BodyId },
    /// World position of the body (x, y, z).
    Position { body: BodyId },
    /// Current joint angle.
    Proprioceptive { joint: JointId },
}

impl Sensor {
    /// Number of values the sensor reports per time step.
    pub fn channels(&self) -> usize {
        match self {
            Sensor::Position { .. } => 3,
            Sensor::Touch { .. } | Sensor::Proprioceptive { .. } => 1,
        }
    }
}

/// A neuron in the controller network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Neuron {
    /// Mirrors the first channel of a sensor.
    Sensor { sensor: SensorId },
    /// Recurrent neuron with an explicit birth state.
    Hidden {
        tau: f32,
        alpha: f32,
        last_value: f32,
        value: f32,
    },
    /// Drives a joint towards an angle.
    Motor { joint: JointId, tau: f32, alpha: f32 },
}

impl Neuron {
    pub fn hidden(last_value: f32, value: f32) -> Self {
        Neuron::Hidden {
            tau: 1.0,
            alpha: 1.0,
            last_value,
            value,
        }
    }

    pub fn motor(joint: JointId, tau: f32) -> Self {
        Neuron::Motor {
            joint,
            tau,
            alpha: 1.0,
        }
    }
}

/// Weighted connection between two neurons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    pub source: NeuronId,
    pub target: NeuronId,
    pub weight: f32,
}

/// Reference errors in a blueprint.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlueprintError {
    #[error("Joint {joint} references missing body {body}")]
    MissingBody { joint: usize, body: usize },
    #[error("Sensor {sensor} references missing {target} {index}")]
    MissingTarget {
        sensor: usize,
        target: &'static str,
        index: usize,
    },
    #[error("Neuron {neuron} references missing {target} {index}")]
    DanglingNeuron {
        neuron: usize,
        target: &'static str,
        index: usize,
    },
    #[error("Synapse {synapse} references missing neuron {neuron}")]
    DanglingSynapse { synapse: usize, neuron: usize },
    #[error("Synapse {synapse} targets sensor neuron {neuron}")]
    SynapseIntoSensor { synapse: usize, neuron: usize },
}

/// A complete robot ready to be simulated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub bodies: Vec<Body>,
    pub joints: Vec<HingeJoint>,
    pub sensors: Vec<Sensor>,
    pub neurons: Vec<Neuron>,
    pub synapses: Vec<Synapse>,
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body(&mut self, body: Body) -> BodyId {
        self.bodies.push(body);
        BodyId(self.bodies.len() - 1)
    }

    pub fn add_joint(&mut self, joint: HingeJoint) -> JointId {
        self.joints.push(joint);
        JointId(self.joints.len() - 1)
    }

    pub fn add_sensor(&mut self, sensor: Sensor) -> SensorId {
        self.sensors.push(sensor);
        SensorId(self.sensors.len() - 1)
    }

    pub fn add_neuron(&mut self, neuron: Neuron) -> NeuronId {
        self.neurons.push(neuron);
        NeuronId(self.neurons.len() - 1)
    }

    pub fn add_synapse(&mut self, source: NeuronId, target: NeuronId, weight: f32) {
        self.synapses.push(Synapse {
            source,
            target,
            weight,
        });
    }

    /// The last position sensor added; fitness is measured from it.
    pub fn position_sensor(&self) -> Option<SensorId> {
        self.sensors
            .iter()
            .rposition(|s| matches!(s, Sensor::Position { .. }))
            .map(SensorId)
    }

    /// Ids of all neurons of one kind, in insertion order.
    pub fn neurons_where<F>(&self, pred: F) -> Vec<NeuronId>
    where
        F: Fn(&Neuron) -> bool,
    {
        self.neurons
            .iter()
            .enumerate()
            .filter(|(_, n)| pred(n))
            .map(|(i, _)| NeuronId(i))
            .collect()
    }

    /// Check that every id points at an existing element.
    pub fn validate(&self) -> Result<(), BlueprintError> {
        for (i, joint) in self.joints.iter().enumerate() {
            for body in [joint.first, joint.second] {
                if body.0 >= self.bodies.len() {
                    return Err(BlueprintError::MissingBody {
                        joint: i,
                        body: body.0,
                    });
                }
            }
        }

        for (i, sensor) in self.sensors.iter().enumerate() {
            let (target, index, len) = match *sensor {
                Sensor::Touch { body } | Sensor::Position { body } => {
                    ("body", body.0, self.bodies.len())
                }
                Sensor::Proprioceptive { joint } => ("joint", joint.0, self.joints.len()),
            };
            if index >= len {
                return Err(BlueprintError::MissingTarget {
                    sensor: i,
                    target,
                    index,
                });
            }
        }

        for (i, neuron) in self.neurons.iter().enumerate() {
            let reference = match *neuron {
                Neuron::Sensor { sensor } => Some(("sensor", sensor.0, self.sensors.len())),
                Neuron::Motor { joint, .. } => Some(("joint", joint.0, self.joints.len())),
                Neuron::Hidden { .. } => None,
            };
            if let Some((target, index, len)) = reference
                && index >= len
            {
                return Err(BlueprintError::DanglingNeuron {
                    neuron: i,
                    target,
                    index,
                });
            }
        }

        for (i, synapse) in self.synapses.iter().enumerate() {
            for neuron in [synapse.source, synapse.target] {
                if neuron.0 >= self.neurons.len() {
                    return Err(BlueprintError::DanglingSynapse {
                        synapse: i,
                        neuron: neuron.0,
                    });
                }
            }
            if matches!(self.neurons[synapse.target.0], Neuron::Sensor { .. }) {
                return Err(BlueprintError::SynapseIntoSensor {
                    synapse: i,
                    neuron: synapse.target.0,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_link() -> Blueprint {
        let mut bp = Blueprint::new();
        let a = bp.add_body(Body::sphere([0.0, 0.0, 0.1], 0.1).mass(0.5));
        let b = bp.add_body(Body::cylinder([0.0, 0.0, 0.1], [1.0, 0.0, 0.0], 0.1, 0.01));
        let j = bp.add_joint(HingeJoint::new(a, b, [0.0, 0.0, 0.1], [0.0, 1.0, 0.0]));
        let s = bp.add_sensor(Sensor::Proprioceptive { joint: j });
        bp.add_sensor(Sensor::Position { body: a });
        let sn = bp.add_neuron(Neuron::Sensor { sensor: s });
        let hn = bp.add_neuron(Neuron::hidden(0.0, 0.5));
        let mn = bp.add_neuron(Neuron::motor(j, 0.3));
        bp.add_synapse(sn, hn, 1.0);
        bp.add_synapse(hn, mn, -1.0);
        bp
    }

    #[test]
    fn test_ids_count_per_kind() {
        let bp = two_link();
        assert_eq!(bp.bodies.len(), 2);
        assert_eq!(bp.joints.len(), 1);
        assert_eq!(bp.position_sensor(), Some(SensorId(1)));
        assert_eq!(
            bp.neurons_where(|n| matches!(n, Neuron::Hidden { .. })),
            vec![NeuronId(1)]
        );
        assert!(bp.validate().is_ok());
    }

    #[test]
    fn test_dangling_references_rejected() {
        let mut bp = two_link();
        bp.add_synapse(NeuronId(0), NeuronId(9), 1.0);
        assert_eq!(
            bp.validate(),
            Err(BlueprintError::DanglingSynapse {
                synapse: 2,
                neuron: 9
            })
        );

        let mut bp = two_link();
        bp.add_synapse(NeuronId(1), NeuronId(0), 1.0);
        assert!(matches!(
            bp.validate(),
            Err(BlueprintError::SynapseIntoSensor { .. })
        ));

        let mut bp = two_link();
        bp.add_sensor(Sensor::Touch { body: BodyId(5) });
        assert!(matches!(
            bp.validate(),
            Err(BlueprintError::MissingTarget { target: "body", .. })
        ));
    }

    #[test]
    fn test_json_shape() {
        let bp = two_link();
        let json = serde_json::to_value(&bp).unwrap();
        assert_eq!(json["bodies"][0]["shape"], "sphere");
        assert_eq!(json["sensors"][0]["kind"], "proprioceptive");
        assert_eq!(json["neurons"][2]["joint"], 0);

        let parsed: Blueprint = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, bp);
    }
}
