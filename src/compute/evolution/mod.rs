//! Evolutionary search over controller weights.
//!
//! # Overview
//!
//! - **Fitness** (`fitness`): scoring trajectories per task and aggregating
//!   train/test scores
//! - **Genome Operations** (`genome`): random weights and point mutation
//! - **Individuals** (`individual`): lineage, age and Pareto dominance
//! - **Search** (`search`): age-fitness Pareto optimisation
//! - **Run Archive** (`archive`): config, summary log and best robot on disk
//!
//! # Example
//!
//! ```rust,no_run
//! use w2v_robots::compute::evolution::{EvolutionEngine, FitnessEvaluator};
//! use w2v_robots::schema::ExperimentConfig;
//! use w2v_robots::vectors::JsonVectorSpace;
//! use w2v_robots::compute::evolution::GenomeRng;
//!
//! let config = ExperimentConfig::from_name("Quad_HDN_05", 1).unwrap();
//! let space = JsonVectorSpace::load(&config.vectors).unwrap();
//! let commands = config
//!     .commands
//!     .resolve(&space, GenomeRng::new(config.seed).inner())
//!     .unwrap();
//! let evaluator =
//!     FitnessEvaluator::new(commands, config.evaluation.clone(), config.simulator.backend());
//!
//! let mut engine = EvolutionEngine::new(&config, evaluator);
//! let result = engine.run_with_callback(|progress, _| {
//!     println!("Generation {}: best fitness = {:.3}",
//!         progress.generation, progress.best_fitness);
//! });
//! println!("Best robot fitness: {:.3}", result.best.fitness);
//! ```

mod archive;
mod fitness;
mod genome;
mod individual;
mod search;

pub use archive::{
    ArchiveError, BEST_FILE, BestExport, CONFIG_FILE, RunArchive, SUMMARY_FILE, load_best,
    read_summary,
};
pub use fitness::{
    FITNESS_CEILING, FitnessEvaluator, FitnessTable, MAX_STEP_DISPLACEMENT, TaskScores,
    task_fitness,
};
pub use genome::{GenomeRng, Mutation, SynapseLayer, genome_distance};
pub use individual::Individual;
pub use search::EvolutionEngine;
