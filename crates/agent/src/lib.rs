//! Host process for the collection engine
//!
//! Loads configuration, serves health, metrics and the latest plan, and runs
//! the startup planning pass over the configured sources.

pub mod api;
pub mod config;
pub mod planning;
