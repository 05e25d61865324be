pub mod api;
pub mod attack;
pub mod cli;
pub mod config;
pub mod controller;
pub mod engine;
pub mod errors;
pub mod policy;
pub mod topology;
pub mod utils;
