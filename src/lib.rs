//! w2v Robots - Evolving robot controllers that follow spoken commands.
//!
//! Each robot carries a recurrent neural controller. Before it is "born" into
//! the physics simulator, the word vectors of a command (such as "forward" or
//! "stop") are played into its hidden neurons. The state they leave behind is
//! the only thing that tells the robot what to do. Evolution then searches
//! for weights under which each command produces its behaviour.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: Experiment configuration, commands and progress/result types
//! - `compute`: Controllers, bodies, the simulator boundary and evolution
//! - `vectors`: Word-vector lookup
//!
//! # Example
//!
//! ```rust,no_run
//! use w2v_robots::{
//!     compute::{Morphology, Robot, evolution::GenomeRng},
//!     vectors::{JsonVectorSpace, VectorSpace},
//! };
//!
//! let space = JsonVectorSpace::load("vectors.json").unwrap();
//! let forward = space.vector("forward").unwrap();
//!
//! // Random quadruped with five hidden neurons
//! let mut rng = GenomeRng::new(42);
//! let robot = Robot::random(Morphology::default(), 5, &mut rng);
//!
//! // Develop the controller on the command and describe the newborn robot
//! let blueprint = robot.build(&[forward]);
//! println!("{} neurons, {} synapses", blueprint.neurons.len(), blueprint.synapses.len());
//! ```

pub mod compute;
pub mod schema;
pub mod vectors;

// Re-export commonly used types
pub use compute::{Morphology, RecurrentController, Robot};
pub use schema::{ExperimentConfig, Task};
