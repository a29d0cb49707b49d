//! Network simulator: connectivity graph and shortest-path route distribution.

pub mod graph;
pub mod sim;

pub use graph::{ConnectivityGraph, Position};
pub use sim::{parse_position_sample, Simulator, SimulatorService};
