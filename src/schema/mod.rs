//! Schema module - Configuration, command and reporting types.

mod command;
mod config;
mod evolution;

pub use command::*;
pub use config::*;
pub use evolution::*;
