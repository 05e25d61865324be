pub mod commands;
pub mod policy;
pub mod serve;

pub use commands::{Cli, Commands};
