//! Compute module - Controllers, robot bodies and the simulator boundary.

mod blueprint;
mod controller;
mod morphology;
mod network;
mod simulator;

pub mod evolution;

pub use blueprint::*;
pub use controller::*;
pub use morphology::*;
pub use network::*;
pub use simulator::*;
