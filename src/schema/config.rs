//! Experiment configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::command::{CommandConfig, Vocabulary};
use crate::compute::{Morphology, SimulatorConfig, SimulatorOptions};

/// Top-level configuration for one evolutionary run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment name; also the run directory prefix.
    pub name: String,
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Robot body.
    #[serde(default)]
    pub morphology: Morphology,
    /// Hidden neurons in the controller.
    #[serde(default = "default_hidden_neurons")]
    pub hidden_neurons: usize,
    /// Words spoken to the robot.
    #[serde(default)]
    pub commands: CommandConfig,
    /// JSON file of word vectors.
    pub vectors: PathBuf,
    /// Physics backend.
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Per-simulation settings.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Population and stopping settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Worker threads for evaluation (defaults to all cores).
    #[serde(default)]
    pub threads: Option<usize>,
    /// Output directory (defaults to `<name>_<seed>`).
    #[serde(default)]
    pub run_dir: Option<PathBuf>,
}

fn default_hidden_neurons() -> usize {
    5
}

/// Settings for a single simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Simulated time steps per command.
    #[serde(default = "default_eval_time")]
    pub eval_time: usize,
    #[serde(default)]
    pub simulator: SimulatorOptions,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            eval_time: default_eval_time(),
            simulator: SimulatorOptions::default(),
        }
    }
}

fn default_eval_time() -> usize {
    500
}

/// Population size and stopping criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Individuals kept after each selection round.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Maximum number of generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Wall-clock budget in hours.
    #[serde(default = "default_max_runtime_hours")]
    pub max_runtime_hours: f64,
    /// Stop once the best train fitness reaches this.
    #[serde(default)]
    pub target_fitness: Option<f32>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
            max_runtime_hours: default_max_runtime_hours(),
            target_fitness: None,
        }
    }
}

fn default_population_size() -> usize {
    50
}
fn default_max_generations() -> usize {
    6000
}
fn default_max_runtime_hours() -> f64 {
    12.0
}

impl ExperimentConfig {
    /// Derive a configuration from a job name.
    ///
    /// Recognised markers:
    /// `Quad` / `Twig` / `Ball` pick the body, `No_Sensors` removes sensor
    /// neurons, `1DOF` locks the SphereBot's second hinge, `HDN_nn` sets the
    /// hidden-neuron count, `Control` shuffles word vectors and `Balance`
    /// selects the balanced vocabulary.
    pub fn from_name(name: &str, seed: u64) -> Result<Self, ConfigError> {
        let sensors = !name.contains("No_Sensors");
        let morphology = if name.contains("Quad") {
            Morphology::Quadruped { sensors }
        } else if name.contains("Twig") {
            Morphology::Twig { sensors }
        } else if name.contains("Ball") {
            Morphology::SphereBot {
                sensors,
                second_joint: !name.contains("1DOF"),
            }
        } else {
            return Err(ConfigError::UnknownMorphology(name.to_string()));
        };

        let hidden_neurons = match name.find("HDN_") {
            Some(idx) => {
                let digits: String = name[idx + 4..]
                    .chars()
                    .take(2)
                    .take_while(char::is_ascii_digit)
                    .collect();
                digits
                    .parse()
                    .map_err(|_| ConfigError::InvalidHiddenNeurons(name.to_string()))?
            }
            None => default_hidden_neurons(),
        };

        let commands = CommandConfig {
            vocabulary: if name.contains("Balance") {
                Vocabulary::Balanced
            } else {
                Vocabulary::Standard
            },
            shuffle_vectors: name.contains("Control"),
            ..Default::default()
        };

        Ok(Self {
            name: name.to_string(),
            seed,
            morphology,
            hidden_neurons,
            commands,
            vectors: PathBuf::from("vectors.json"),
            simulator: SimulatorConfig::default(),
            evaluation: EvaluationConfig::default(),
            population: PopulationConfig::default(),
            threads: None,
            run_dir: None,
        })
    }

    /// Output directory for this run.
    pub fn run_dir(&self) -> PathBuf {
        self.run_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_{}", self.name, self.seed)))
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hidden_neurons == 0 {
            return Err(ConfigError::NoHiddenNeurons);
        }
        if self.evaluation.eval_time == 0 {
            return Err(ConfigError::InvalidEvalTime);
        }
        if self.population.size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if !(self.population.max_runtime_hours > 0.0) {
            return Err(ConfigError::InvalidRuntime(self.population.max_runtime_hours));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidThreads);
        }

        let words = self.commands.vocabulary.words();
        if words.values().all(Vec::is_empty) {
            return Err(ConfigError::EmptyVocabulary);
        }
        if words.values().flatten().any(Vec::is_empty) {
            return Err(ConfigError::EmptyCommand);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot tell robot type from experiment name '{0}' (expected Quad, Twig or Ball)")]
    UnknownMorphology(String),
    #[error("Bad HDN_ hidden-neuron count in '{0}'")]
    InvalidHiddenNeurons(String),
    #[error("Controller needs at least one hidden neuron")]
    NoHiddenNeurons,
    #[error("Evaluation time must be positive")]
    InvalidEvalTime,
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Runtime budget must be positive, got {0} hours")]
    InvalidRuntime(f64),
    #[error("Thread count must be positive")]
    InvalidThreads,
    #[error("Vocabulary has no commands")]
    EmptyVocabulary,
    #[error("Vocabulary contains a command with no words")]
    EmptyCommand,
}
