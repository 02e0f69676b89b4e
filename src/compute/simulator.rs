//! Boundary to the physics simulator.
//!
//! Physics runs out of process. A backend receives a [`SimulationRequest`]
//! and returns a [`Trajectory`]: every sensor's readings over time.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};

use super::blueprint::{Blueprint, BlueprintError, Sensor, SensorId};
use super::network::NeuralNetwork;

/// Viewer and stepping options forwarded to the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorOptions {
    /// Run without a window.
    #[serde(default = "default_true")]
    pub play_blind: bool,
    /// Start the viewer paused.
    #[serde(default)]
    pub play_paused: bool,
    /// Physics sub-steps per controller update.
    #[serde(default = "default_quasi_static_ratio")]
    pub quasi_static_ratio: f32,
    #[serde(default)]
    pub debug: bool,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            play_blind: true,
            play_paused: false,
            quasi_static_ratio: default_quasi_static_ratio(),
            debug: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_quasi_static_ratio() -> f32 {
    1.0
}

/// One simulation to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub blueprint: Blueprint,
    /// Number of time steps.
    pub eval_time: usize,
    #[serde(default)]
    pub options: SimulatorOptions,
}

/// Sensor readings over time, indexed `[sensor][channel][step]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub sensors: Vec<Vec<Vec<f32>>>,
}

impl Trajectory {
    /// Empty traces sized for `bp`'s sensors.
    pub fn for_blueprint(bp: &Blueprint, steps: usize) -> Self {
        let sensors = bp
            .sensors
            .iter()
            .map(|s| vec![Vec::with_capacity(steps); s.channels()])
            .collect();
        Self { sensors }
    }

    /// Number of recorded steps (taken from the first channel).
    pub fn steps(&self) -> usize {
        self.sensors
            .first()
            .and_then(|s| s.first())
            .map_or(0, Vec::len)
    }

    pub fn channel(&self, sensor: SensorId, channel: usize) -> Option<&[f32]> {
        self.sensors
            .get(sensor.0)
            .and_then(|s| s.get(channel))
            .map(Vec::as_slice)
    }

    /// x and y traces of a position sensor.
    pub fn planar_path(&self, sensor: SensorId) -> Option<(&[f32], &[f32])> {
        Some((self.channel(sensor, 0)?, self.channel(sensor, 1)?))
    }

    /// Check that the traces match the blueprint's sensors.
    pub fn check(&self, bp: &Blueprint) -> Result<(), SimulationError> {
        if self.sensors.len() != bp.sensors.len() {
            return Err(SimulationError::Malformed(format!(
                "{} sensor traces for {} sensors",
                self.sensors.len(),
                bp.sensors.len()
            )));
        }
        for (i, (trace, sensor)) in self.sensors.iter().zip(&bp.sensors).enumerate() {
            if trace.len() != sensor.channels() {
                return Err(SimulationError::Malformed(format!(
                    "sensor {} has {} channels, expected {}",
                    i,
                    trace.len(),
                    sensor.channels()
                )));
            }
        }
        Ok(())
    }
}

/// Simulation failures.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Failed to run simulator: {0}")]
    Io(#[from] std::io::Error),
    #[error("Simulator exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("Could not decode simulator output: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Malformed trajectory: {0}")]
    Malformed(String),
    #[error("Blueprint has no position sensor")]
    NoPositionSensor,
    #[error("Invalid blueprint: {0}")]
    Blueprint(#[from] BlueprintError),
}

/// Something that can turn a blueprint into sensor traces.
pub trait SimulatorBackend: Send + Sync {
    fn simulate(&self, request: &SimulationRequest) -> Result<Trajectory, SimulationError>;
}

/// Which backend to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimulatorConfig {
    /// External simulator executable speaking JSON over stdin/stdout.
    Process {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Physics-free replay of the controller.
    Replay {
        #[serde(default = "default_stride")]
        stride: f32,
    },
}

fn default_stride() -> f32 {
    0.001
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::Replay {
            stride: default_stride(),
        }
    }
}

impl SimulatorConfig {
    pub fn backend(&self) -> Box<dyn SimulatorBackend> {
        match self {
            SimulatorConfig::Process { program, args } => Box::new(ProcessBackend {
                program: program.clone(),
                args: args.clone(),
            }),
            SimulatorConfig::Replay { stride } => Box::new(ReplayBackend { stride: *stride }),
        }
    }
}

/// Runs an external simulator once per request.
///
/// The request is written to the child's stdin as JSON; the child must print
/// a JSON [`Trajectory`] on stdout and exit with status 0. Stdin is fed from a
/// separate thread while stdout and stderr are drained, and the child is
/// always reaped.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl SimulatorBackend for ProcessBackend {
    fn simulate(&self, request: &SimulationRequest) -> Result<Trajectory, SimulationError> {
        let mut payload = serde_json::to_vec(request)?;
        payload.push(b'\n');

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let Some(mut stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SimulationError::Malformed("child stdin unavailable".into()));
        };
        let writer = thread::spawn(move || stdin.write_all(&payload));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));

        if !output.status.success() {
            return Err(SimulationError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        // A simulator may legitimately exit before consuming all of its input.
        if let Err(e) = written
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            return Err(e.into());
        }

        let trajectory: Trajectory = serde_json::from_slice(&output.stdout)?;
        trajectory.check(&request.blueprint)?;
        Ok(trajectory)
    }
}

/// Dry-run backend: steps the controller open loop and moves the position
/// sensor's body along x by `stride * mean(motor outputs)` per step.
///
/// Touch sensors read 0 and proprioceptive sensors read the motor-commanded
/// angle. Useful for exercising the evolutionary loop without a simulator.
#[derive(Debug, Clone)]
pub struct ReplayBackend {
    pub stride: f32,
}

impl SimulatorBackend for ReplayBackend {
    fn simulate(&self, request: &SimulationRequest) -> Result<Trajectory, SimulationError> {
        let bp = &request.blueprint;
        let mut net = NeuralNetwork::from_blueprint(bp)?;
        let tracked = bp
            .position_sensor()
            .ok_or(SimulationError::NoPositionSensor)?;

        let joints: Vec<_> = net.motor_joints().collect();
        let mut angles = vec![0.0f32; bp.joints.len()];
        let mut positions: Vec<[f32; 3]> = bp
            .sensors
            .iter()
            .map(|s| match *s {
                Sensor::Position { body } => bp.bodies[body.0].position,
                _ => [0.0; 3],
            })
            .collect();

        let mut trajectory = Trajectory::for_blueprint(bp, request.eval_time);
        let mut readings = vec![0.0f32; bp.sensors.len()];

        for _ in 0..request.eval_time {
            for (i, sensor) in bp.sensors.iter().enumerate() {
                readings[i] = match *sensor {
                    Sensor::Touch { .. } => 0.0,
                    Sensor::Proprioceptive { joint } => angles[joint.0],
                    Sensor::Position { .. } => positions[i][0],
                };
            }

            net.step(&readings);
            let motors = net.motor_values();
            for (&joint, &value) in joints.iter().zip(&motors) {
                let hinge = &bp.joints[joint.0];
                let span = hinge.hi.abs().max(hinge.lo.abs());
                angles[joint.0] = (value * span).clamp(hinge.lo, hinge.hi);
            }

            let drive = if motors.is_empty() {
                0.0
            } else {
                motors.iter().sum::<f32>() / motors.len() as f32
            };
            positions[tracked.0][0] += self.stride * drive;

            for (i, sensor) in bp.sensors.iter().enumerate() {
                match sensor {
                    Sensor::Position { .. } => {
                        for (c, trace) in trajectory.sensors[i].iter_mut().enumerate() {
                            trace.push(positions[i][c]);
                        }
                    }
                    _ => trajectory.sensors[i][0].push(readings[i]),
                }
            }
        }

        Ok(trajectory)
    }
}
