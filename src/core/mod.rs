//! Configuration and error types shared by every process.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{SwarmError, SwarmResult};
