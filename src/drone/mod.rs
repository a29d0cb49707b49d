//! Drone agent: one mobile point exploring the grid.

pub mod agent;
pub mod state;

pub use agent::DroneAgent;
pub use state::{DronePhase, DroneState};
