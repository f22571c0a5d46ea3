//! Carbonshift Simulation Engine
//!
//! Discrete-event simulator for comparing carbon-aware scheduling policies
//! by total emissions and deadline compliance.

pub mod carbon;
pub mod catalog;
pub mod config;
pub mod grid_data;
pub mod heap;
pub mod intensity;
pub mod policies;
pub mod simulator;
pub mod workload;
