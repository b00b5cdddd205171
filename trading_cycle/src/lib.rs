pub mod config;
pub mod cycle;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod risk;
pub mod runner;
pub mod schedule;
pub mod sizing;
