//! Ground station: exploration coordinator and its runtime loops.

pub mod connectivity;
pub mod coordinator;
pub mod grid;
pub mod station;

pub use connectivity::ConnectivityMatrix;
pub use coordinator::{Coordinator, Outbound, SUCCESS_SIGNAL};
pub use grid::{CellState, Grid};
pub use station::GroundStation;
