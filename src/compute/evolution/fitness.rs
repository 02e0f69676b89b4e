//! Scoring trajectories against the commanded task.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compute::{
    Robot, SensorId, SimulationError, SimulationRequest, SimulatorBackend, Trajectory,
};
use crate::schema::{Command, CommandSet, EvaluationConfig, Task};

/// Per-step planar displacement above which a run counts as a physics blow-up.
pub const MAX_STEP_DISPLACEMENT: f32 = 0.1;

/// Aggregate fitness above this is treated as a simulator artifact.
pub const FITNESS_CEILING: f32 = 30.0;

/// Score one simulation of `task`.
///
/// * forward: final x
/// * backward: negated final x
/// * stop: negated path length in the ground plane
///
/// Any single step longer than [`MAX_STEP_DISPLACEMENT`] scores 0.
pub fn task_fitness(
    task: Task,
    trajectory: &Trajectory,
    position_sensor: SensorId,
) -> Result<f32, SimulationError> {
    let (xs, ys) = trajectory
        .planar_path(position_sensor)
        .ok_or(SimulationError::NoPositionSensor)?;
    let Some(&final_x) = xs.last() else {
        return Ok(0.0);
    };

    let steps: Vec<f32> = xs
        .windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| ((x[1] - x[0]).powi(2) + (y[1] - y[0]).powi(2)).sqrt())
        .collect();

    if steps.iter().any(|&d| d > MAX_STEP_DISPLACEMENT) {
        return Ok(0.0);
    }

    Ok(match task {
        Task::Forward => final_x,
        Task::Backward => -final_x,
        Task::Stop => -steps.iter().sum::<f32>(),
    })
}

/// Scores per task, one entry per command, in command order.
pub type TaskScores = BTreeMap<Task, Vec<f32>>;

/// Train and test scores of one individual.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessTable {
    pub train: TaskScores,
    pub test: TaskScores,
}

impl FitnessTable {
    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.test.is_empty()
    }

    /// Sum of train scores, plus test scores when `include_test`.
    ///
    /// Non-finite sums and sums above [`FITNESS_CEILING`] collapse to 0.
    pub fn aggregate(&self, include_test: bool) -> f32 {
        let mut total: f32 = self.train.values().flatten().sum();
        if include_test {
            total += self.test.values().flatten().sum::<f32>();
        }
        if !total.is_finite() || total > FITNESS_CEILING {
            0.0
        } else {
            total
        }
    }
}

/// Runs every command through the simulator and scores the results.
pub struct FitnessEvaluator {
    commands: CommandSet,
    evaluation: EvaluationConfig,
    backend: Box<dyn SimulatorBackend>,
}

impl FitnessEvaluator {
    pub fn new(
        commands: CommandSet,
        evaluation: EvaluationConfig,
        backend: Box<dyn SimulatorBackend>,
    ) -> Self {
        Self {
            commands,
            evaluation,
            backend,
        }
    }

    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    /// Simulate one command. Failed simulations are logged and score 0.
    pub fn evaluate_command(&self, robot: &Robot, task: Task, command: &Command) -> f32 {
        let blueprint = robot.build(&command.encoding);
        let Some(position_sensor) = blueprint.position_sensor() else {
            log::warn!("{} has no position sensor", robot.morphology.name());
            return 0.0;
        };

        let request = SimulationRequest {
            blueprint,
            eval_time: self.evaluation.eval_time,
            options: self.evaluation.simulator.clone(),
        };

        let result = self
            .backend
            .simulate(&request)
            .and_then(|trajectory| task_fitness(task, &trajectory, position_sensor));

        match result {
            Ok(score) => score,
            Err(e) => {
                log::warn!("Simulation of '{}' ({}) failed: {}", command.label(), task, e);
                0.0
            }
        }
    }

    /// Score `robot` on every train command, and on the test commands when asked.
    pub fn evaluate(&self, robot: &Robot, include_test: bool) -> FitnessTable {
        let score_all = |set: &BTreeMap<Task, Vec<Command>>| -> TaskScores {
            set.iter()
                .map(|(&task, commands)| {
                    let scores = commands
                        .iter()
                        .map(|c| self.evaluate_command(robot, task, c))
                        .collect();
                    (task, scores)
                })
                .collect()
        };

        FitnessTable {
            train: score_all(&self.commands.train),
            test: if include_test {
                score_all(&self.commands.test)
            } else {
                TaskScores::new()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::GenomeRng;
    use crate::compute::Morphology;

    /// Moves the tracked body forward by a fixed amount every step.
    struct Conveyor(f32);

    impl SimulatorBackend for Conveyor {
        fn simulate(&self, request: &SimulationRequest) -> Result<Trajectory, SimulationError> {
            let mut t = Trajectory::for_blueprint(&request.blueprint, request.eval_time);
            for (i, trace) in t.sensors.iter_mut().enumerate() {
                for (c, channel) in trace.iter_mut().enumerate() {
                    for step in 0..request.eval_time {
                        let moving = Some(SensorId(i))
                            == request.blueprint.position_sensor()
                            && c == 0;
                        channel.push(if moving { self.0 * step as f32 } else { 0.0 });
                    }
                }
            }
            Ok(t)
        }
    }

    struct Broken;

    impl SimulatorBackend for Broken {
        fn simulate(&self, _: &SimulationRequest) -> Result<Trajectory, SimulationError> {
            Err(SimulationError::Malformed("nothing".into()))
        }
    }

    fn commands() -> CommandSet {
        let cmd = |w: &str| Command {
            words: vec![w.to_string()],
            encoding: vec![vec![0.1, 0.2]],
        };
        let mut set = CommandSet::default();
        set.train.insert(Task::Forward, vec![cmd("forward")]);
        set.train.insert(Task::Backward, vec![cmd("backward")]);
        set.train.insert(Task::Stop, vec![cmd("stop"), cmd("cease")]);
        set.test.insert(Task::Stop, vec![cmd("halt")]);
        set
    }

    #[test]
    fn test_evaluator_scores_every_command() {
        let eval = EvaluationConfig {
            eval_time: 11,
            ..Default::default()
        };
        let evaluator = FitnessEvaluator::new(commands(), eval, Box::new(Conveyor(0.01)));
        let robot = Robot::random(Morphology::default(), 3, &mut GenomeRng::new(1));

        let table = evaluator.evaluate(&robot, true);
        assert!((table.train[&Task::Forward][0] - 0.1).abs() < 1e-5);
        assert!((table.train[&Task::Backward][0] + 0.1).abs() < 1e-5);
        assert_eq!(table.train[&Task::Stop].len(), 2);
        assert!((table.test[&Task::Stop][0] + 0.1).abs() < 1e-5);

        let train_only = evaluator.evaluate(&robot, false);
        assert!(train_only.test.is_empty());
    }

    #[test]
    fn test_failed_simulation_scores_zero() {
        let evaluator =
            FitnessEvaluator::new(commands(), EvaluationConfig::default(), Box::new(Broken));
        let robot = Robot::random(Morphology::default(), 3, &mut GenomeRng::new(1));
        let table = evaluator.evaluate(&robot, true);
        assert!(table.train.values().flatten().all(|&s| s == 0.0));
        assert_eq!(table.aggregate(true), 0.0);
    }

    fn path(xs: &[f32], ys: &[f32]) -> Trajectory {
        Trajectory {
            sensors: vec![vec![xs.to_vec(), ys.to_vec(), vec![0.0; xs.len()]]],
        }
    }

    const POS: SensorId = SensorId(0);

    #[test]
    fn test_forward_and_backward_use_final_x() {
        let t = path(&[0.0, 0.05, 0.12], &[0.0, 0.0, 0.0]);
        assert!((task_fitness(Task::Forward, &t, POS).unwrap() - 0.12).abs() < 1e-6);
        assert!((task_fitness(Task::Backward, &t, POS).unwrap() + 0.12).abs() < 1e-6);
    }

    #[test]
    fn test_stop_penalizes_path_length() {
        let t = path(&[0.0, 0.03, 0.03], &[0.0, 0.04, 0.0]);
        let f = task_fitness(Task::Stop, &t, POS).unwrap();
        assert!((f + 0.09).abs() < 1e-6);

        let still = path(&[0.2; 5], &[0.1; 5]);
        assert_eq!(task_fitness(Task::Stop, &still, POS).unwrap(), 0.0);
    }

    #[test]
    fn test_large_jump_scores_zero() {
        let t = path(&[0.0, 0.5, 0.6], &[0.0, 0.0, 0.0]);
        for task in [Task::Forward, Task::Backward, Task::Stop] {
            assert_eq!(task_fitness(task, &t, POS).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_empty_trace_scores_zero() {
        let t = path(&[], &[]);
        assert_eq!(task_fitness(Task::Forward, &t, POS).unwrap(), 0.0);
        assert!(task_fitness(Task::Forward, &t, SensorId(3)).is_err());
    }

    #[test]
    fn test_aggregate() {
        let mut table = FitnessTable::default();
        table.train.insert(Task::Forward, vec![1.0]);
        table.train.insert(Task::Stop, vec![-0.5, -0.25]);
        table.test.insert(Task::Stop, vec![-0.25]);

        assert!((table.aggregate(false) - 0.25).abs() < 1e-6);
        assert!(table.aggregate(true).abs() < 1e-6);

        table.train.insert(Task::Backward, vec![40.0]);
        assert_eq!(table.aggregate(false), 0.0);

        table.train.insert(Task::Backward, vec![f32::NAN]);
        assert_eq!(table.aggregate(false), 0.0);
    }
}
