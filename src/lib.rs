pub mod core;
pub mod drone;
pub mod ground_station;
pub mod net;
pub mod protocol;
pub mod scenario;
pub mod simulator;
pub mod supervisor;
