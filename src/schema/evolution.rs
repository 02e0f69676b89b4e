//! Progress and result types reported by the evolutionary search.

use serde::{Deserialize, Serialize};

use crate::compute::Robot;
use crate::compute::evolution::FitnessTable;

/// Progress update sent after every generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Current generation number.
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Individuals evaluated this generation (newly born ones only).
    pub evaluations_completed: usize,
    /// Best train fitness in the population.
    pub best_fitness: f32,
    /// Mean train fitness of the population.
    pub avg_fitness: f32,
    /// Mean age of the population.
    pub mean_age: f32,
    /// Individuals not dominated on (age, fitness).
    pub pareto_front_size: usize,
    /// Wall-clock time since the run started.
    pub elapsed_seconds: f64,
    /// Current best individual.
    pub best: Option<IndividualSnapshot>,
    pub phase: EvolutionPhase,
}

/// Serializable view of one individual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualSnapshot {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub age: usize,
    /// Aggregate train fitness.
    pub fitness: f32,
    /// Aggregate train plus test fitness, if test commands were evaluated.
    pub test_fitness: Option<f32>,
    /// Per-command scores.
    pub scores: FitnessTable,
}

/// Per-generation statistics for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionHistory {
    /// Best train fitness per generation.
    pub best_fitness: Vec<f32>,
    /// Mean train fitness per generation.
    pub avg_fitness: Vec<f32>,
    /// Mean age per generation.
    pub mean_age: Vec<f32>,
    /// Mean pairwise weight distance per generation.
    pub diversity: Vec<f32>,
}

/// Current phase of the search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    #[default]
    Initializing,
    Evaluating,
    Stopped,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Individual with the highest train fitness.
    pub best: IndividualSnapshot,
    /// Its robot, ready to be rebuilt for any command.
    pub best_robot: Robot,
    /// Final population.
    pub population: Vec<IndividualSnapshot>,
    pub stats: EvolutionStats,
    pub history: EvolutionHistory,
}

/// Statistics from a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations run.
    pub generations: usize,
    /// Individuals evaluated, counting re-evaluations.
    pub total_evaluations: u64,
    /// Simulations performed.
    pub total_simulations: u64,
    pub best_fitness: f32,
    pub best_test_fitness: Option<f32>,
    pub final_avg_fitness: f32,
    pub elapsed_seconds: f64,
    pub evaluations_per_second: f64,
    pub stop_reason: StopReason,
}

/// Why the search stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the generation limit.
    MaxGenerations,
    /// Ran out of wall-clock time.
    MaxRuntime,
    /// Reached the target fitness.
    TargetReached,
    /// Cancelled through the engine's cancel handle.
    Cancelled,
}

/// Column names of the summary log, written once per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryHeader {
    pub columns: Vec<String>,
}

/// One individual in one generation of the summary log.
///
/// `scores` follows the order of [`SummaryHeader::columns`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRow {
    pub generation: usize,
    pub id: u64,
    pub parent_id: Option<u64>,
    pub age: usize,
    pub fitness: f32,
    pub test_fitness: Option<f32>,
    pub scores: Vec<f32>,
}
